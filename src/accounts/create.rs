//! Hosted account creation.
//!
//! The creation service is a web page. [`WebAccountCreator`] opens it in the
//! system browser with a loopback `callback` URL and waits for the page to
//! redirect back with either `sa`/`sp` (the new account) or `error`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use tokio::sync::{Mutex, oneshot};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::keys::PublicKey;
use crate::session::{ChainId, PermissionLevel};

pub const DEFAULT_SCOPE: &str = "Antelope App";
const CALLBACK_PATH: &str = "/account/callback";
const GENERIC_FAILURE: &str = "Account creation failed";

/// Everything the creation service needs to create an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCreationRequest {
    pub supported_chains: Vec<ChainId>,
    pub owner_key: PublicKey,
    pub active_key: PublicKey,
    pub scope: String,
    /// Fully qualified creation URL.
    pub url: String,
}

impl AccountCreationRequest {
    pub fn new(
        service_url: &str,
        chain_id: &ChainId,
        owner_key: PublicKey,
        active_key: PublicKey,
        app_name: Option<&str>,
    ) -> Result<Self> {
        let mut url = url::Url::parse(service_url).map_err(|e| {
            Error::AccountCreationFailed(format!("invalid creation URL '{service_url}': {e}"))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("supported_chains", chain_id.as_str());
            if let Some(app_name) = app_name {
                query.append_pair("scope", app_name);
            }
            query.append_pair("owner_key", &owner_key.to_string());
            query.append_pair("active_key", &active_key.to_string());
        }

        Ok(Self {
            supported_chains: vec![chain_id.clone()],
            owner_key,
            active_key,
            scope: app_name.unwrap_or(DEFAULT_SCOPE).to_string(),
            url: url.into(),
        })
    }
}

/// Reply from the creation service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AccountCreationResponse {
    Created { sa: String, sp: String },
    Failed {
        #[serde(default)]
        error: Option<String>,
    },
}

impl AccountCreationResponse {
    pub fn into_permission_level(self) -> Result<PermissionLevel> {
        match self {
            Self::Created { sa, sp } => Ok(PermissionLevel::new(sa, sp)),
            Self::Failed { error } => Err(Error::AccountCreationFailed(
                error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            )),
        }
    }

    /// Decode an arbitrary JSON reply; unrecognized shapes are a failure.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|_| Error::AccountCreationFailed(GENERIC_FAILURE.to_string()))
    }
}

/// Launches account creation and waits for its outcome.
#[async_trait]
pub trait AccountCreator: Send + Sync {
    async fn create_account(
        &self,
        request: &AccountCreationRequest,
    ) -> Result<AccountCreationResponse>;
}

/// Opens a URL in a browser.
pub type UrlOpener = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Browser-based creator with a loopback callback listener.
pub struct WebAccountCreator {
    timeout: Duration,
    opener: UrlOpener,
}

impl WebAccountCreator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            opener: Arc::new(|url: &str| open::that(url)),
        }
    }

    pub fn with_opener(mut self, opener: UrlOpener) -> Self {
        self.opener = opener;
        self
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    state: Option<String>,
    sa: Option<String>,
    sp: Option<String>,
    error: Option<String>,
}

impl From<CallbackParams> for AccountCreationResponse {
    fn from(params: CallbackParams) -> Self {
        match (params.sa, params.sp) {
            (Some(sa), Some(sp)) if !sa.is_empty() && !sp.is_empty() => Self::Created { sa, sp },
            _ => Self::Failed {
                error: params.error,
            },
        }
    }
}

/// Callback listener state for one creation attempt.
#[derive(Clone)]
struct CallbackState {
    /// Nonce the callback must echo back as `state`.
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<oneshot::Sender<AccountCreationResponse>>>>,
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    if params.state.as_deref() != Some(&*state.expected_state) {
        tracing::warn!("Ignoring account creation callback with a mismatched state");
        return (
            StatusCode::FORBIDDEN,
            Html("<html><body>Unknown account creation request.</body></html>"),
        );
    }
    if let Some(tx) = state.sender.lock().await.take() {
        let _ = tx.send(params.into());
    }
    (
        StatusCode::OK,
        Html("<html><body>Account creation finished. You can close this window.</body></html>"),
    )
}

/// Loopback callback URL carrying the attempt's `state` nonce.
fn callback_url(addr: std::net::SocketAddr, state: &str) -> String {
    format!("http://{addr}{CALLBACK_PATH}?state={}", urlencoding::encode(state))
}

#[async_trait]
impl AccountCreator for WebAccountCreator {
    async fn create_account(
        &self,
        request: &AccountCreationRequest,
    ) -> Result<AccountCreationResponse> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::AccountCreationFailed(format!("callback listener: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| Error::AccountCreationFailed(format!("callback listener: {e}")))?;

        let nonce = Uuid::new_v4().simple().to_string();
        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = Router::new()
            .route(CALLBACK_PATH, get(handle_callback))
            .with_state(CallbackState {
                expected_state: Arc::from(nonce.as_str()),
                sender: Arc::new(Mutex::new(Some(result_tx))),
            });
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let mut url = url::Url::parse(&request.url)
            .map_err(|e| Error::AccountCreationFailed(format!("invalid creation URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("callback", &callback_url(addr, &nonce));

        tracing::info!("Opening account creation for {}", request.scope);
        if let Err(e) = (self.opener)(url.as_str()) {
            tracing::warn!("Could not open browser automatically: {}", e);
        }

        let outcome = tokio::time::timeout(self.timeout, result_rx).await;
        let _ = shutdown_tx.send(());
        if let Err(e) = server.await {
            tracing::debug!("Callback server task ended abnormally: {}", e);
        }

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::AccountCreationFailed(GENERIC_FAILURE.to_string())),
            Err(_) => Err(Error::AccountCreationFailed(format!(
                "account creation timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OWNER: &str = "PUB_K1_6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5BoDq63";

    fn request(app_name: Option<&str>) -> AccountCreationRequest {
        let key: PublicKey = OWNER.parse().unwrap();
        AccountCreationRequest::new(
            "https://create.example/buy",
            &ChainId::new("aca376f2"),
            key.clone(),
            key,
            app_name,
        )
        .unwrap()
    }

    #[test]
    fn creation_url_carries_keys_chain_and_scope() {
        let req = request(Some("My Dapp"));
        let url = url::Url::parse(&req.url).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/buy");
        assert!(pairs.contains(&("supported_chains".into(), "aca376f2".into())));
        assert!(pairs.contains(&("scope".into(), "My Dapp".into())));
        assert!(pairs.contains(&("owner_key".into(), OWNER.into())));
        assert!(pairs.contains(&("active_key".into(), OWNER.into())));
        assert_eq!(req.scope, "My Dapp");
    }

    #[test]
    fn scope_defaults_without_app_name() {
        let req = request(None);
        assert_eq!(req.scope, DEFAULT_SCOPE);
        assert!(!req.url.contains("scope="));
    }

    #[test]
    fn interprets_service_replies() {
        let created =
            AccountCreationResponse::from_value(json!({ "sa": "newacct", "sp": "active" })).unwrap();
        assert_eq!(
            created.into_permission_level().unwrap(),
            PermissionLevel::new("newacct", "active")
        );

        let failed = AccountCreationResponse::from_value(json!({ "error": "payment declined" }))
            .unwrap()
            .into_permission_level()
            .unwrap_err();
        assert_eq!(failed.to_string(), "payment declined");

        let garbage = AccountCreationResponse::from_value(json!("???")).unwrap_err();
        assert_eq!(garbage.to_string(), GENERIC_FAILURE);

        let empty = AccountCreationResponse::from_value(json!({}))
            .unwrap()
            .into_permission_level()
            .unwrap_err();
        assert_eq!(empty.to_string(), GENERIC_FAILURE);
    }

    fn callback_param(url: &str) -> url::Url {
        let url = url::Url::parse(url).expect("valid url");
        let callback = url
            .query_pairs()
            .find(|(k, _)| k == "callback")
            .map(|(_, v)| v.into_owned())
            .expect("callback param");
        url::Url::parse(&callback).expect("valid callback url")
    }

    #[test]
    fn callback_url_carries_state() {
        let addr: std::net::SocketAddr = "127.0.0.1:4100".parse().unwrap();
        assert_eq!(
            callback_url(addr, "abc123"),
            "http://127.0.0.1:4100/account/callback?state=abc123"
        );
    }

    #[tokio::test]
    async fn web_creator_resolves_from_callback() {
        let forged_status = Arc::new(std::sync::Mutex::new(None));
        let seen = forged_status.clone();
        let opener: UrlOpener = Arc::new(move |url: &str| {
            let callback = callback_param(url);
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut forged = callback.clone();
                forged.set_query(Some("state=guessed&sa=attacker&sp=active"));
                if let Ok(response) = reqwest::get(forged).await {
                    *seen.lock().unwrap() = Some(response.status().as_u16());
                }

                let mut genuine = callback;
                genuine
                    .query_pairs_mut()
                    .append_pair("sa", "newacct")
                    .append_pair("sp", "active");
                let _ = reqwest::get(genuine).await;
            });
            Ok(())
        });

        let creator = WebAccountCreator::new(Duration::from_secs(5)).with_opener(opener);
        let response = match creator.create_account(&request(Some("My Dapp"))).await {
            Ok(response) => response,
            // Sandboxed test environments may forbid binding a socket.
            Err(e) if e.to_string().contains("callback listener") => return,
            Err(e) => panic!("account creation failed: {e}"),
        };
        assert_eq!(
            response,
            AccountCreationResponse::Created {
                sa: "newacct".to_string(),
                sp: "active".to_string(),
            }
        );
        assert_eq!(*forged_status.lock().unwrap(), Some(403));
    }

    #[tokio::test]
    async fn web_creator_times_out() {
        let opener: UrlOpener = Arc::new(|_: &str| Ok(()));
        let creator = WebAccountCreator::new(Duration::from_millis(50)).with_opener(opener);
        match creator.create_account(&request(None)).await {
            Err(e) if e.to_string().contains("callback listener") => {}
            Err(e) => assert!(e.to_string().contains("timed out"), "{e}"),
            Ok(response) => panic!("unexpected response: {response:?}"),
        }
    }
}
