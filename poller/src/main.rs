use std::process::ExitCode;

use msisql_auth::{acquire_token_provider, Config};
use msisql_poller::cancel::CancellationToken;
use msisql_poller::client::{AccessTokenConnector, ClientConfig};
use msisql_poller::poller::PollerConfig;
use msisql_poller::Error;
use msisql_token::TokenSourceProvider;
use tracing_subscriber::EnvFilter;

const CLIENT_ID_ENV: &str = "AZURE_CLIENT_ID";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Starting token tester...");

    let cancel = CancellationToken::new();
    cancel.cancel_on_ctrl_c();

    match start(cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("terminating: {e:?}");
            println!("{}", e.report());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn start(cancel: CancellationToken) -> Result<(), Error> {
    let client_id = std::env::var(CLIENT_ID_ENV).unwrap_or_default();
    let provider = acquire_token_provider(Config::default().with_client_id(&client_id)).await?;

    let connector = AccessTokenConnector::new(ClientConfig::from_env(), provider.token_source());
    msisql_poller::run(&connector, PollerConfig::default(), cancel, &mut std::io::stdout()).await
}
