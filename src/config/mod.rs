//! Configuration for the snap wallet plugin.
//!
//! Settings are loaded with priority: env var > default. The CLI loads a
//! `.env` file via dotenvy before resolving, library users can build a
//! [`SnapWalletConfig`] directly.

pub(crate) mod helpers;

use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_SNAP_ID: &str = "local:http://localhost:8080";
pub const DEFAULT_SETUP_URL: &str = "https://snaps.metamask.io";
pub const DEFAULT_LOOKUP_URL: &str = "https://eosio.greymass.com";
pub const DEFAULT_CREATION_URL: &str =
    "https://adding-login-through-apple.account-creation-portal.pages.dev/buy";

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_PROVIDER_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_CREATION_TIMEOUT: Duration = Duration::from_secs(600);

/// What to do when the configured snap is not installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingSnapPolicy {
    /// Ask the host to install the snap, then confirm once.
    #[default]
    AutoInstall,
    /// Send the user to the setup page and stop.
    SetupPrompt,
}

impl MissingSnapPolicy {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match helpers::normalize_variant(value).as_str() {
            "auto" | "auto_install" | "install" => Ok(Self::AutoInstall),
            "setup" | "setup_prompt" | "prompt" => Ok(Self::SetupPrompt),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected 'auto_install' or 'setup_prompt', got '{value}'"),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoInstall => "auto_install",
            Self::SetupPrompt => "setup_prompt",
        }
    }
}

/// How `login` picks a permission level when the context has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountPolicy {
    /// Only accept a permission level supplied by the caller.
    #[default]
    CallerSupplied,
    /// Look up accounts for the snap's key and let the user pick or create one.
    LookupAndPrompt,
}

impl AccountPolicy {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match helpers::normalize_variant(value).as_str() {
            "caller" | "caller_supplied" => Ok(Self::CallerSupplied),
            "lookup" | "lookup_and_prompt" => Ok(Self::LookupAndPrompt),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected 'caller_supplied' or 'lookup_and_prompt', got '{value}'"),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallerSupplied => "caller_supplied",
            Self::LookupAndPrompt => "lookup_and_prompt",
        }
    }
}

/// Main configuration for the plugin.
#[derive(Debug, Clone)]
pub struct SnapWalletConfig {
    pub snap_id: String,
    /// Version range passed along with install requests.
    pub snap_version: Option<String>,
    pub setup_url: String,
    pub lookup_service_url: String,
    pub creation_service_url: String,
    pub missing_snap_policy: MissingSnapPolicy,
    pub account_policy: AccountPolicy,
    /// Derivation index of the key used to find and sign for accounts.
    pub active_key_index: u32,
    /// Derivation index of the owner key handed to account creation.
    pub owner_key_index: u32,
    /// How long to wait for the host to inject its provider.
    pub provider_timeout: Duration,
    pub provider_poll_interval: Duration,
    pub lookup_timeout: Duration,
    pub creation_timeout: Duration,
}

impl Default for SnapWalletConfig {
    fn default() -> Self {
        Self {
            snap_id: DEFAULT_SNAP_ID.to_string(),
            snap_version: None,
            setup_url: DEFAULT_SETUP_URL.to_string(),
            lookup_service_url: DEFAULT_LOOKUP_URL.to_string(),
            creation_service_url: DEFAULT_CREATION_URL.to_string(),
            missing_snap_policy: MissingSnapPolicy::default(),
            account_policy: AccountPolicy::default(),
            active_key_index: 1,
            owner_key_index: 0,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            provider_poll_interval: DEFAULT_PROVIDER_POLL_INTERVAL,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            creation_timeout: DEFAULT_CREATION_TIMEOUT,
        }
    }
}

impl SnapWalletConfig {
    /// Resolve configuration from `SNAP_WALLET_*` env vars over defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let snap_id = helpers::optional_env("SNAP_WALLET_SNAP_ID")?.unwrap_or(defaults.snap_id);

        let setup_url =
            helpers::optional_env("SNAP_WALLET_SETUP_URL")?.unwrap_or(defaults.setup_url);
        helpers::validate_url("SNAP_WALLET_SETUP_URL", &setup_url)?;

        let lookup_service_url = helpers::optional_env("SNAP_WALLET_LOOKUP_URL")?
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.lookup_service_url);
        helpers::validate_url("SNAP_WALLET_LOOKUP_URL", &lookup_service_url)?;

        let creation_service_url = helpers::optional_env("SNAP_WALLET_CREATION_URL")?
            .unwrap_or(defaults.creation_service_url);
        helpers::validate_url("SNAP_WALLET_CREATION_URL", &creation_service_url)?;

        let missing_snap_policy = helpers::optional_env("SNAP_WALLET_MISSING_SNAP_POLICY")?
            .map(|v| MissingSnapPolicy::parse(&v, "SNAP_WALLET_MISSING_SNAP_POLICY"))
            .transpose()?
            .unwrap_or(defaults.missing_snap_policy);

        let account_policy = helpers::optional_env("SNAP_WALLET_ACCOUNT_POLICY")?
            .map(|v| AccountPolicy::parse(&v, "SNAP_WALLET_ACCOUNT_POLICY"))
            .transpose()?
            .unwrap_or(defaults.account_policy);

        let active_key_index = helpers::parse_optional_env("SNAP_WALLET_ACTIVE_KEY_INDEX")?
            .unwrap_or(defaults.active_key_index);
        let owner_key_index = helpers::parse_optional_env("SNAP_WALLET_OWNER_KEY_INDEX")?
            .unwrap_or(defaults.owner_key_index);

        Ok(Self {
            snap_id,
            snap_version: helpers::optional_env("SNAP_WALLET_SNAP_VERSION")?,
            setup_url,
            lookup_service_url,
            creation_service_url,
            missing_snap_policy,
            account_policy,
            active_key_index,
            owner_key_index,
            provider_timeout: helpers::timeout_env(
                "SNAP_WALLET_PROVIDER_TIMEOUT_MS",
                defaults.provider_timeout,
            )?,
            provider_poll_interval: defaults.provider_poll_interval,
            lookup_timeout: helpers::timeout_env(
                "SNAP_WALLET_LOOKUP_TIMEOUT_MS",
                defaults.lookup_timeout,
            )?,
            creation_timeout: helpers::timeout_env(
                "SNAP_WALLET_CREATION_TIMEOUT_MS",
                defaults.creation_timeout,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes env-mutating tests to prevent parallel races.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const KEYS: &[&str] = &[
        "SNAP_WALLET_SNAP_ID",
        "SNAP_WALLET_SNAP_VERSION",
        "SNAP_WALLET_SETUP_URL",
        "SNAP_WALLET_LOOKUP_URL",
        "SNAP_WALLET_CREATION_URL",
        "SNAP_WALLET_MISSING_SNAP_POLICY",
        "SNAP_WALLET_ACCOUNT_POLICY",
        "SNAP_WALLET_ACTIVE_KEY_INDEX",
        "SNAP_WALLET_OWNER_KEY_INDEX",
        "SNAP_WALLET_PROVIDER_TIMEOUT_MS",
        "SNAP_WALLET_LOOKUP_TIMEOUT_MS",
        "SNAP_WALLET_CREATION_TIMEOUT_MS",
    ];

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        // SAFETY: guarded by ENV_MUTEX, no other test thread touches these keys.
        unsafe {
            for key in KEYS {
                std::env::remove_var(key);
            }
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
        }
        let out = f();
        unsafe {
            for key in KEYS {
                std::env::remove_var(key);
            }
        }
        out
    }

    #[test]
    fn defaults_when_env_is_empty() {
        let config = with_env(&[], SnapWalletConfig::from_env).unwrap();
        assert_eq!(config.snap_id, DEFAULT_SNAP_ID);
        assert_eq!(config.lookup_service_url, DEFAULT_LOOKUP_URL);
        assert_eq!(config.missing_snap_policy, MissingSnapPolicy::AutoInstall);
        assert_eq!(config.account_policy, AccountPolicy::CallerSupplied);
        assert_eq!(config.active_key_index, 1);
        assert_eq!(config.owner_key_index, 0);
    }

    #[test]
    fn env_overrides_policies_and_trims_lookup_url() {
        let config = with_env(
            &[
                ("SNAP_WALLET_MISSING_SNAP_POLICY", "setup-prompt"),
                ("SNAP_WALLET_ACCOUNT_POLICY", "Lookup And Prompt"),
                ("SNAP_WALLET_LOOKUP_URL", "https://lookup.example/"),
                ("SNAP_WALLET_SNAP_ID", "npm:@example/antelope-snap"),
                ("SNAP_WALLET_PROVIDER_TIMEOUT_MS", "250"),
            ],
            SnapWalletConfig::from_env,
        )
        .unwrap();
        assert_eq!(config.missing_snap_policy, MissingSnapPolicy::SetupPrompt);
        assert_eq!(config.account_policy, AccountPolicy::LookupAndPrompt);
        assert_eq!(config.lookup_service_url, "https://lookup.example");
        assert_eq!(config.snap_id, "npm:@example/antelope-snap");
        assert_eq!(config.provider_timeout, Duration::from_millis(250));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = with_env(
            &[("SNAP_WALLET_ACCOUNT_POLICY", "sometimes")],
            SnapWalletConfig::from_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SNAP_WALLET_ACCOUNT_POLICY"));
    }

    #[test]
    fn rejects_zero_timeout_and_bad_url() {
        let err = with_env(
            &[("SNAP_WALLET_LOOKUP_TIMEOUT_MS", "0")],
            SnapWalletConfig::from_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be > 0"));

        let err = with_env(
            &[("SNAP_WALLET_CREATION_URL", "ftp://create.example")],
            SnapWalletConfig::from_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }
}
