//! Discovery of the host's injected request provider.
//!
//! The host extension injects its provider asynchronously, possibly after
//! the plugin is constructed. [`InjectedProviderLocator`] polls the
//! injection point until a provider shows up or the timeout expires.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::Result;

pub const WALLET_GET_SNAPS: &str = "wallet_getSnaps";
pub const WALLET_REQUEST_SNAPS: &str = "wallet_requestSnaps";
pub const WALLET_INVOKE_SNAP: &str = "wallet_invokeSnap";
pub const WEB3_CLIENT_VERSION: &str = "web3_clientVersion";

/// The host's request-dispatch object.
///
/// Rejections surface as `Err`, the host's `undefined`/`null` as
/// `Value::Null`.
#[async_trait]
pub trait SnapProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// Where the host injects its provider.
#[async_trait]
pub trait ProviderSource: Send + Sync {
    async fn current(&self) -> Option<Arc<dyn SnapProvider>>;
}

/// Finds a usable provider, or reports there is none.
#[async_trait]
pub trait ProviderLocator: Send + Sync {
    async fn locate(&self) -> Result<Option<Arc<dyn SnapProvider>>>;
}

/// Injection slot the host environment fills once its provider is ready.
#[derive(Clone, Default)]
pub struct ProviderSlot {
    inner: Arc<RwLock<Option<Arc<dyn SnapProvider>>>>,
}

impl ProviderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(provider: Arc<dyn SnapProvider>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(provider))),
        }
    }

    pub async fn inject(&self, provider: Arc<dyn SnapProvider>) {
        *self.inner.write().await = Some(provider);
    }
}

#[async_trait]
impl ProviderSource for ProviderSlot {
    async fn current(&self) -> Option<Arc<dyn SnapProvider>> {
        self.inner.read().await.clone()
    }
}

/// Polls a [`ProviderSource`] with a bounded wait and keeps only providers
/// that answer snap requests.
pub struct InjectedProviderLocator {
    source: Arc<dyn ProviderSource>,
    timeout: Duration,
    poll_interval: Duration,
}

impl InjectedProviderLocator {
    pub fn new(source: Arc<dyn ProviderSource>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            source,
            timeout,
            poll_interval,
        }
    }

    async fn wait_for_injection(&self) -> Option<Arc<dyn SnapProvider>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(provider) = self.source.current().await {
                return Some(provider);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl ProviderLocator for InjectedProviderLocator {
    async fn locate(&self) -> Result<Option<Arc<dyn SnapProvider>>> {
        let Some(provider) = self.wait_for_injection().await else {
            tracing::debug!(
                "No provider injected within {}ms",
                self.timeout.as_millis()
            );
            return Ok(None);
        };

        if supports_snaps(provider.as_ref()).await {
            Ok(Some(provider))
        } else {
            tracing::info!("Injected provider does not support snaps");
            Ok(None)
        }
    }
}

/// A provider supports snaps if it answers `wallet_getSnaps` without
/// rejecting.
pub async fn supports_snaps(provider: &dyn SnapProvider) -> bool {
    match provider.request(WALLET_GET_SNAPS, json!({})).await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!("Snap support probe rejected: {}", e);
            false
        }
    }
}

/// Whether the host is the Flask developer build.
pub async fn is_flask(provider: &dyn SnapProvider) -> bool {
    match provider.request(WEB3_CLIENT_VERSION, Value::Null).await {
        Ok(version) => client_version_is_flask(&version),
        Err(e) => {
            tracing::debug!("Client version query rejected: {}", e);
            false
        }
    }
}

fn client_version_is_flask(version: &Value) -> bool {
    let mentions_flask = |s: &str| s.to_ascii_lowercase().contains("flask");
    match version {
        Value::String(s) => mentions_flask(s),
        Value::Array(items) => items.iter().filter_map(Value::as_str).any(mentions_flask),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct VersionProvider(Value);

    #[async_trait]
    impl SnapProvider for VersionProvider {
        async fn request(&self, method: &str, _params: Value) -> Result<Value> {
            match method {
                WEB3_CLIENT_VERSION => Ok(self.0.clone()),
                WALLET_GET_SNAPS => Ok(json!({})),
                _ => Ok(Value::Null),
            }
        }
    }

    struct RejectingProvider;

    #[async_trait]
    impl SnapProvider for RejectingProvider {
        async fn request(&self, method: &str, _params: Value) -> Result<Value> {
            Err(Error::snap_failed(method, "method not found"))
        }
    }

    #[test]
    fn classifies_client_versions() {
        assert!(!client_version_is_flask(&json!(["MetaMask/v10.8.1"])));
        assert!(client_version_is_flask(&json!(["MetaMask/v11.0.0-flask.1"])));
        assert!(client_version_is_flask(&json!("MetaMask/v11.0.0-Flask.1")));
        assert!(!client_version_is_flask(&Value::Null));
    }

    #[tokio::test]
    async fn flask_query_rejection_is_not_flask() {
        assert!(!is_flask(&RejectingProvider).await);
        assert!(is_flask(&VersionProvider(json!("flask"))).await);
    }

    #[tokio::test]
    async fn locate_times_out_without_injection() {
        let locator = InjectedProviderLocator::new(
            Arc::new(ProviderSlot::new()),
            Duration::from_millis(30),
            Duration::from_millis(5),
        );
        assert!(locator.locate().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn locate_picks_up_late_injection() {
        let slot = ProviderSlot::new();
        let locator = InjectedProviderLocator::new(
            Arc::new(slot.clone()),
            Duration::from_secs(2),
            Duration::from_millis(5),
        );

        let injector = slot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            injector
                .inject(Arc::new(VersionProvider(json!(["MetaMask/v10.8.1"]))))
                .await;
        });

        assert!(locator.locate().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn locate_rejects_provider_without_snaps() {
        let locator = InjectedProviderLocator::new(
            Arc::new(ProviderSlot::with_provider(Arc::new(RejectingProvider))),
            Duration::from_millis(30),
            Duration::from_millis(5),
        );
        assert!(locator.locate().await.unwrap().is_none());
    }
}
