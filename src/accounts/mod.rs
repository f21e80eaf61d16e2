//! Account resolution for `login`.
//!
//! A permission level already present in the login context always wins.
//! Otherwise the configured [`AccountPolicy`] decides: either fail, or look
//! up the accounts controlled by the snap's active key and let the user pick
//! one (or create a new one) through the context UI.

mod create;
mod lookup;

use std::sync::Arc;

use crate::config::{AccountPolicy, SnapWalletConfig};
use crate::error::{Error, Result};
use crate::session::{ChainDefinition, LoginContext, PermissionLevel};
use crate::snap::SnapConnection;
use crate::ui::{CREATE_ACCOUNT_OPTION, LoginUi, PromptOption, PromptRequest, PromptResponse};

pub use self::create::{
    AccountCreationRequest, AccountCreationResponse, AccountCreator, DEFAULT_SCOPE, UrlOpener,
    WebAccountCreator,
};
pub use self::lookup::{
    AccountFound, AccountIndex, AccountIndexClient, AccountLookup, OWNER_PERMISSION,
    accounts_for_chain, selectable_accounts,
};

/// Build the account selection prompt.
pub fn account_prompt(accounts: &[AccountFound]) -> PromptRequest {
    let title = if accounts.is_empty() {
        "No accounts found"
    } else {
        "Select an account"
    };

    let mut options: Vec<PromptOption> = accounts
        .iter()
        .map(|account| {
            let label = account.permission_level().to_string();
            PromptOption::new(label.clone(), label)
        })
        .collect();
    options.push(PromptOption::new(CREATE_ACCOUNT_OPTION, "Create Account"));

    PromptRequest {
        title: title.to_string(),
        body: String::new(),
        options,
    }
}

/// Resolves the permission level `login` returns.
pub struct AccountResolver {
    policy: AccountPolicy,
    index: Arc<dyn AccountIndex>,
    creator: Arc<dyn AccountCreator>,
    creation_service_url: String,
    active_key_index: u32,
    owner_key_index: u32,
}

impl AccountResolver {
    pub fn new(
        config: &SnapWalletConfig,
        index: Arc<dyn AccountIndex>,
        creator: Arc<dyn AccountCreator>,
    ) -> Self {
        Self {
            policy: config.account_policy,
            index,
            creator,
            creation_service_url: config.creation_service_url.clone(),
            active_key_index: config.active_key_index,
            owner_key_index: config.owner_key_index,
        }
    }

    /// Resolver backed by the hosted lookup and creation services.
    pub fn from_config(config: &SnapWalletConfig) -> Result<Self> {
        let index = AccountIndexClient::new(
            config.lookup_service_url.clone(),
            config.lookup_timeout,
        )?;
        Ok(Self::new(
            config,
            Arc::new(index),
            Arc::new(WebAccountCreator::new(config.creation_timeout)),
        ))
    }

    pub fn policy(&self) -> AccountPolicy {
        self.policy
    }

    /// Fail before touching the host when resolution will need a UI the
    /// context does not have.
    pub fn preflight(&self, context: &LoginContext) -> Result<()> {
        if context.permission_level.is_none()
            && self.policy == AccountPolicy::LookupAndPrompt
            && context.ui.is_none()
        {
            return Err(Error::ui_unavailable("account selection"));
        }
        Ok(())
    }

    pub async fn resolve(
        &self,
        snap: &SnapConnection,
        context: &LoginContext,
        chain: &ChainDefinition,
    ) -> Result<PermissionLevel> {
        if let Some(level) = &context.permission_level {
            tracing::debug!("Using caller supplied permission {}", level);
            return Ok(level.clone());
        }

        match self.policy {
            AccountPolicy::CallerSupplied => Err(Error::PermissionRequired),
            AccountPolicy::LookupAndPrompt => {
                let ui = context
                    .ui
                    .as_deref()
                    .ok_or_else(|| Error::ui_unavailable("account selection"))?;
                self.lookup_and_prompt(snap, ui, context, chain).await
            }
        }
    }

    async fn lookup_and_prompt(
        &self,
        snap: &SnapConnection,
        ui: &dyn LoginUi,
        context: &LoginContext,
        chain: &ChainDefinition,
    ) -> Result<PermissionLevel> {
        let active_key = snap.public_key(&chain.id, self.active_key_index).await?;
        let accounts = selectable_accounts(self.index.lookup(&active_key, &chain.id).await?);
        tracing::info!(
            "Found {} selectable accounts on chain {}",
            accounts.len(),
            chain.id
        );

        let request = account_prompt(&accounts);
        // One response per prompt: the login resolves exactly once.
        let choice = match ui.prompt(request).await? {
            PromptResponse::Selected(id) => id,
            PromptResponse::Dismissed => return Err(Error::Canceled),
        };

        if choice == CREATE_ACCOUNT_OPTION {
            let owner_key = snap.public_key(&chain.id, self.owner_key_index).await?;
            let request = AccountCreationRequest::new(
                &self.creation_service_url,
                &chain.id,
                owner_key,
                active_key,
                context.app_name.as_deref(),
            )?;
            return self
                .creator
                .create_account(&request)
                .await?
                .into_permission_level();
        }

        accounts
            .iter()
            .find(|account| account.permission_level().to_string() == choice)
            .map(AccountFound::permission_level)
            .ok_or(Error::InvalidSelection(choice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prompt_lists_accounts_then_create() {
        let prompt = account_prompt(&[AccountFound {
            actor: "alice".to_string(),
            permission: "active".to_string(),
        }]);
        assert_eq!(prompt.title, "Select an account");
        let ids: Vec<&str> = prompt.options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["alice@active", CREATE_ACCOUNT_OPTION]);
        assert_eq!(prompt.options[1].label, "Create Account");
    }

    struct NoopUi;

    #[async_trait::async_trait]
    impl LoginUi for NoopUi {
        async fn prompt(&self, _request: PromptRequest) -> Result<PromptResponse> {
            Ok(PromptResponse::Dismissed)
        }
    }

    #[test]
    fn preflight_requires_ui_only_when_lookup_will_prompt() {
        let config = SnapWalletConfig {
            account_policy: AccountPolicy::LookupAndPrompt,
            ..SnapWalletConfig::default()
        };
        let resolver = AccountResolver::from_config(&config).unwrap();
        let bare = LoginContext::default();

        let err = resolver.preflight(&bare).unwrap_err();
        assert_eq!(err.code(), "ui.unavailable");
        assert!(resolver.preflight(&bare.clone().with_ui(Arc::new(NoopUi))).is_ok());
        assert!(
            resolver
                .preflight(&bare.with_permission_level(PermissionLevel::new("bob", "active")))
                .is_ok()
        );

        let caller_only = AccountResolver::from_config(&SnapWalletConfig::default()).unwrap();
        assert!(caller_only.preflight(&LoginContext::default()).is_ok());
    }

    #[test]
    fn empty_prompt_still_offers_creation() {
        let prompt = account_prompt(&[]);
        assert_eq!(prompt.title, "No accounts found");
        assert_eq!(prompt.options.len(), 1);
        assert!(prompt.option(CREATE_ACCOUNT_OPTION).is_some());
    }
}
