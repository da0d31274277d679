use std::process::ExitCode;

use anyhow::Context;
use follow_recovery::browser;
use follow_recovery::identity;
use follow_recovery::{Cli, run, select_signer};
use tracing::{error, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::load();
    init_tracing(cli.verbose);

    match recover(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("follow-recovery: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn recover(cli: Cli) -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = cli.recovery_config();
    let browser_options = cli.browser_options();

    let secret_key = cli
        .privkey
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(identity::resolve_secret_key)
        .transpose()
        .context("PRIVKEY")?;

    let author = match (cli.pubkey.as_deref(), secret_key.as_ref()) {
        (Some(pubkey), _) => identity::resolve_author(pubkey).context("PUBKEY")?,
        (None, Some(key)) => identity::public_key_of(key)?,
        (None, None) => {
            info!("PUBKEY not set, asking the browser to log in");
            let pubkey = browser::request_public_key(&browser_options)
                .await
                .context("browser login")?;
            info!("Received public key: {}", pubkey);
            identity::resolve_author(&pubkey).context("public key from browser")?
        }
    };

    if let Some(key) = secret_key.as_ref() {
        identity::check_key_owner(&author, key)?;
    }

    let signer = select_signer(secret_key, browser_options);
    run(&config, &author, signer.as_ref()).await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
