//! `snap-wallet` operator commands.
//!
//! Helpers for checking the services the plugin talks to without a browser
//! host: run an account lookup, build an account creation URL, and probe
//! configuration and reachability.

mod doctor;

use clap::{Parser, Subcommand};

use crate::accounts::{AccountCreationRequest, AccountIndexClient, selectable_accounts};
use crate::config::SnapWalletConfig;
use crate::keys::PublicKey;
use crate::session::ChainId;

#[derive(Parser, Debug)]
#[command(name = "snap-wallet", version, about = "MetaMask snap wallet plugin tools")]
pub struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the accounts a public key can log in with on a chain.
    Lookup {
        /// Public key in `PUB_K1_...` or legacy `EOS...` form.
        public_key: String,
        /// Chain id to select from the lookup response.
        #[arg(long)]
        chain: String,
    },
    /// Print the account creation URL for a pair of keys.
    CreationUrl {
        owner_key: String,
        active_key: String,
        #[arg(long)]
        chain: String,
        /// Application name shown by the creation service.
        #[arg(long)]
        scope: Option<String>,
    },
    /// Validate configuration and probe external services.
    Doctor {
        /// Exit non-zero if any check fails.
        #[arg(long)]
        strict: bool,
    },
}

pub async fn run(command: Command, config: &SnapWalletConfig) -> anyhow::Result<()> {
    match command {
        Command::Lookup { public_key, chain } => run_lookup(config, &public_key, &chain).await,
        Command::CreationUrl {
            owner_key,
            active_key,
            chain,
            scope,
        } => {
            let request = AccountCreationRequest::new(
                &config.creation_service_url,
                &ChainId::new(chain),
                owner_key.parse()?,
                active_key.parse()?,
                scope.as_deref(),
            )?;
            println!("{}", request.url);
            Ok(())
        }
        Command::Doctor { strict } => doctor::run_doctor(config, strict).await,
    }
}

async fn run_lookup(config: &SnapWalletConfig, public_key: &str, chain: &str) -> anyhow::Result<()> {
    let key: PublicKey = public_key.parse()?;
    let client =
        AccountIndexClient::new(config.lookup_service_url.clone(), config.lookup_timeout)?;
    let chain_id = ChainId::new(chain);

    let entries = client.lookup_all(&key).await?;
    let accounts = selectable_accounts(crate::accounts::accounts_for_chain(entries, &chain_id));
    if accounts.is_empty() {
        println!("No accounts found for {} on {}", key.to_legacy_string()?, chain_id);
        return Ok(());
    }
    for account in accounts {
        println!("{}", account.permission_level());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lookup_command() {
        let cli = Cli::try_parse_from([
            "snap-wallet",
            "lookup",
            "EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV",
            "--chain",
            "aca376f2",
        ])
        .unwrap();
        match cli.command {
            Command::Lookup { chain, .. } => assert_eq!(chain, "aca376f2"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn creation_url_command_rejects_bad_keys() {
        let err = run(
            Command::CreationUrl {
                owner_key: "nope".to_string(),
                active_key: "nope".to_string(),
                chain: "aca376f2".to_string(),
                scope: None,
            },
            &SnapWalletConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Invalid public key"));
    }
}
