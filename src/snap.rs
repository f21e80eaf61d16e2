//! Snap registry client and the initialization state machine.
//!
//! [`SnapConnection`] owns the cached provider handle and installed-snap
//! descriptor. Only [`SnapConnection::initialize`] mutates them. Snap
//! methods are always routed through the generic `wallet_invokeSnap` host
//! method as `{snapId, request: {method, params}}`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::{MissingSnapPolicy, SnapWalletConfig};
use crate::error::{Error, Result};
use crate::keys::PublicKey;
use crate::provider::{
    self, ProviderLocator, SnapProvider, WALLET_GET_SNAPS, WALLET_INVOKE_SNAP,
    WALLET_REQUEST_SNAPS,
};
use crate::session::ChainId;
use crate::ui::{LoginUi, OPEN_SETUP_OPTION, PromptOption, PromptRequest};

/// An installed snap as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapDescriptor {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_permissions: Option<Value>,
    /// Host fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type SnapMap = BTreeMap<String, SnapDescriptor>;

/// Methods the Antelope snap understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapMethod {
    GetPublicKey,
    SignTransaction,
}

impl SnapMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetPublicKey => "antelope_getPublicKey",
            Self::SignTransaction => "antelope_signTransaction",
        }
    }
}

impl fmt::Display for SnapMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where initialization currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    NoProvider,
    HasProvider,
    Checked { is_flask: bool },
    SnapAbsent,
    SnapInstallRequested,
    Ready,
}

/// Provider handle, installed snap and the logic that reaches `Ready`.
pub struct SnapConnection {
    locator: Arc<dyn ProviderLocator>,
    snap_id: String,
    snap_version: Option<String>,
    setup_url: String,
    policy: MissingSnapPolicy,
    provider: Option<Arc<dyn SnapProvider>>,
    installed: Option<SnapDescriptor>,
    is_flask: bool,
    state: InitState,
}

impl SnapConnection {
    pub fn new(locator: Arc<dyn ProviderLocator>, config: &SnapWalletConfig) -> Self {
        Self {
            locator,
            snap_id: config.snap_id.clone(),
            snap_version: config.snap_version.clone(),
            setup_url: config.setup_url.clone(),
            policy: config.missing_snap_policy,
            provider: None,
            installed: None,
            is_flask: false,
            state: InitState::NoProvider,
        }
    }

    pub fn state(&self) -> InitState {
        self.state
    }

    pub fn snap_id(&self) -> &str {
        &self.snap_id
    }

    pub fn installed_snap(&self) -> Option<&SnapDescriptor> {
        self.installed.as_ref()
    }

    pub fn is_flask(&self) -> bool {
        self.is_flask
    }

    pub fn is_ready(&self) -> bool {
        self.state == InitState::Ready
    }

    fn provider(&self) -> Result<&Arc<dyn SnapProvider>> {
        self.provider.as_ref().ok_or(Error::ProviderNotFound)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let provider = self.provider()?;
        tracing::debug!("Host request {}", method);
        provider.request(method, params).await
    }

    /// All snaps the host reports as installed.
    pub async fn list_installed(&self) -> Result<SnapMap> {
        let value = self.request(WALLET_GET_SNAPS, json!({})).await?;
        parse_snap_map(WALLET_GET_SNAPS, value)
    }

    /// Ask the host to install `snap_id` (default: the configured snap).
    ///
    /// This may block on the host's own consent UI.
    pub async fn request_install(
        &self,
        snap_id: Option<&str>,
        version: Option<&str>,
    ) -> Result<SnapMap> {
        let snap_id = snap_id.unwrap_or(&self.snap_id);
        let value = self
            .request(WALLET_REQUEST_SNAPS, install_params(snap_id, version))
            .await?;
        parse_snap_map(WALLET_REQUEST_SNAPS, value)
    }

    /// Call `method` on a snap (default: the configured snap).
    pub async fn invoke(
        &self,
        method: SnapMethod,
        params: Value,
        snap_id: Option<&str>,
    ) -> Result<Value> {
        let snap_id = snap_id.unwrap_or(&self.snap_id);
        tracing::debug!("Invoking {} on {}", method, snap_id);
        self.request(WALLET_INVOKE_SNAP, invoke_params(snap_id, method, params))
            .await
    }

    /// Derive the public key at `address_index` for `chain_id`.
    pub async fn public_key(&self, chain_id: &ChainId, address_index: u32) -> Result<PublicKey> {
        let method = SnapMethod::GetPublicKey;
        let result = self
            .invoke(
                method,
                json!({ "chainId": chain_id.as_str(), "addressIndex": address_index }),
                None,
            )
            .await?;
        match result.as_str() {
            Some(key) if !key.is_empty() => key.parse(),
            _ => Err(Error::snap_failed(method.as_str(), "no public key returned")),
        }
    }

    /// Drive the state machine to `Ready`.
    ///
    /// A no-op once ready. A missing snap is handled per the configured
    /// [`MissingSnapPolicy`]; an install request is confirmed at most once.
    pub async fn initialize(&mut self, ui: Option<&dyn LoginUi>) -> Result<()> {
        if self.state == InitState::Ready {
            return Ok(());
        }

        if self.provider.is_none() {
            match self.locator.locate().await? {
                Some(provider) => {
                    self.provider = Some(provider);
                    self.state = InitState::HasProvider;
                }
                None => {
                    self.state = InitState::NoProvider;
                    return Err(Error::ProviderNotFound);
                }
            }
        }

        if self.installed.is_none() {
            self.is_flask = provider::is_flask(self.provider()?.as_ref()).await;
            self.state = InitState::Checked {
                is_flask: self.is_flask,
            };
            self.installed = self.list_installed().await?.remove(&self.snap_id);
        }

        if self.installed.is_none() {
            self.state = InitState::SnapAbsent;
            tracing::info!("Snap {} not installed", self.snap_id);
            match self.policy {
                MissingSnapPolicy::AutoInstall => self.install_and_confirm().await?,
                MissingSnapPolicy::SetupPrompt => return Err(self.prompt_setup(ui).await),
            }
        }

        self.state = InitState::Ready;
        tracing::info!("Snap {} ready", self.snap_id);
        Ok(())
    }

    async fn install_and_confirm(&mut self) -> Result<()> {
        let version = self.snap_version.clone();
        let mut installed = self
            .request_install(None, version.as_deref())
            .await?
            .remove(&self.snap_id);
        self.state = InitState::SnapInstallRequested;

        if installed.is_none() {
            tracing::warn!(
                "Install response for {} did not include it, listing once more",
                self.snap_id
            );
            installed = self.list_installed().await?.remove(&self.snap_id);
        }

        match installed {
            Some(descriptor) => {
                tracing::info!("Installed snap {} v{}", descriptor.id, descriptor.version);
                self.installed = Some(descriptor);
                Ok(())
            }
            None => Err(Error::snap_failed(
                WALLET_REQUEST_SNAPS,
                format!(
                    "snap {} not confirmed after install request",
                    self.snap_id
                ),
            )),
        }
    }

    /// Point the user at the setup page. Always ends initialization with an
    /// error: the snap is still missing.
    async fn prompt_setup(&self, ui: Option<&dyn LoginUi>) -> Error {
        let Some(ui) = ui else {
            return Error::ui_unavailable("snap setup");
        };

        let host = if self.is_flask { "MetaMask Flask" } else { "MetaMask" };
        let request = PromptRequest {
            title: "Snap required".to_string(),
            body: format!(
                "Install the Antelope snap in {host} to continue, then try again."
            ),
            options: vec![
                PromptOption::new(OPEN_SETUP_OPTION, "Open setup page")
                    .with_link(self.setup_url.clone()),
            ],
        };

        if let Err(e) = ui.prompt(request).await {
            return e;
        }
        Error::SnapNotInstalled {
            snap_id: self.snap_id.clone(),
            setup_url: self.setup_url.clone(),
        }
    }
}

fn install_params(snap_id: &str, version: Option<&str>) -> Value {
    let options = match version {
        Some(version) => json!({ "version": version }),
        None => json!({}),
    };
    let mut params = Map::new();
    params.insert(snap_id.to_string(), options);
    Value::Object(params)
}

fn invoke_params(snap_id: &str, method: SnapMethod, params: Value) -> Value {
    json!({
        "snapId": snap_id,
        "request": {
            "method": method.as_str(),
            "params": params,
        },
    })
}

fn parse_snap_map(method: &str, value: Value) -> Result<SnapMap> {
    if value.is_null() {
        return Ok(SnapMap::new());
    }
    serde_json::from_value(value)
        .map_err(|e| Error::snap_failed(method, format!("unexpected snap map: {e}")))
}
