use clap::Parser;
use tracing_subscriber::EnvFilter;

use snap_wallet::cli::{self, Cli};
use snap_wallet::config::SnapWalletConfig;

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snap_wallet=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = SnapWalletConfig::from_env()?;
    if let Err(e) = cli::run(cli.command, &config).await {
        if let Some(err) = e.downcast_ref::<snap_wallet::Error>() {
            let payload = err.to_payload();
            tracing::error!(code = payload.code, "{}", payload.message);
        }
        return Err(e);
    }
    Ok(())
}
