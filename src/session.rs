//! Session framework types consumed and produced by the wallet plugin.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::keys::Signature;
use crate::ui::LoginUi;

/// Chain identifier (a 256-bit checksum in hex). Passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A chain the application can log in to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDefinition {
    pub id: ChainId,
    pub url: String,
}

impl ChainDefinition {
    pub fn new(id: impl Into<ChainId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// An `actor@permission` authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: String,
    pub permission: String,
}

impl PermissionLevel {
    pub fn new(actor: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            permission: permission.into(),
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.actor, self.permission)
    }
}

impl FromStr for PermissionLevel {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().split_once('@') {
            Some((actor, permission)) if !actor.is_empty() && !permission.is_empty() => {
                Ok(Self::new(actor, permission))
            }
            _ => Err(Error::Config(crate::error::ConfigError::InvalidValue {
                key: "permission_level".to_string(),
                message: format!("expected 'actor@permission', got '{raw}'"),
            })),
        }
    }
}

/// Context handed to `login` by the session kit.
#[derive(Clone, Default)]
pub struct LoginContext {
    pub chains: Vec<ChainDefinition>,
    pub chain: Option<ChainDefinition>,
    pub app_name: Option<String>,
    pub permission_level: Option<PermissionLevel>,
    pub ui: Option<Arc<dyn LoginUi>>,
}

impl LoginContext {
    pub fn new(chains: Vec<ChainDefinition>) -> Self {
        Self {
            chains,
            ..Self::default()
        }
    }

    pub fn with_chain(mut self, chain: ChainDefinition) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_permission_level(mut self, permission_level: PermissionLevel) -> Self {
        self.permission_level = Some(permission_level);
        self
    }

    pub fn with_ui(mut self, ui: Arc<dyn LoginUi>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// The explicitly selected chain, else the first one offered.
    pub fn target_chain(&self) -> Option<&ChainDefinition> {
        self.chain.as_ref().or_else(|| self.chains.first())
    }
}

impl fmt::Debug for LoginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginContext")
            .field("chains", &self.chains)
            .field("chain", &self.chain)
            .field("app_name", &self.app_name)
            .field("permission_level", &self.permission_level)
            .field("ui", &self.ui.is_some())
            .finish()
    }
}

/// A fully prepared transaction ready for signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSigningRequest {
    pub chain_id: ChainId,
    pub transaction: serde_json::Value,
}

impl ResolvedSigningRequest {
    pub fn new(chain_id: impl Into<ChainId>, transaction: serde_json::Value) -> Self {
        Self {
            chain_id: chain_id.into(),
            transaction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub chain: ChainId,
    pub permission_level: PermissionLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    pub signatures: Vec<Signature>,
}

/// UI requirements the session kit checks before calling `login`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PluginRequirements {
    pub requires_chain_select: bool,
    pub requires_permission_select: bool,
}

/// Display information for wallet pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    pub name: String,
    pub description: String,
    pub logo: String,
    pub homepage: String,
    pub download: String,
}
