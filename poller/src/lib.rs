//! Polls an Azure SQL table over a connection authenticated with a managed identity token.
//!
//! ```ignore
//! let provider = msisql_auth::acquire_token_provider(Config::default()).await?;
//! let connector = AccessTokenConnector::new(ClientConfig::from_env(), provider.token_source());
//! msisql_poller::run(&connector, PollerConfig::default(), CancellationToken::new(), &mut std::io::stdout()).await?;
//! ```
use std::io::Write;

pub mod cancel;
pub mod client;
pub mod poller;

use crate::cancel::CancellationToken;
use crate::client::{Connect, ConnectionError, QueryError};
use crate::poller::{Poller, PollerConfig};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] msisql_auth::error::Error),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),
}

impl Error {
    /// Every error terminates the process with status 1.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// The line printed to stdout before exiting.
    pub fn report(&self) -> String {
        match self {
            Error::Query(e) => format!("Error {e}"),
            e => format!("Error: {e}"),
        }
    }
}

/// Opens one session and polls it until cancelled or the first error.
pub async fn run<C, W>(connector: &C, config: PollerConfig, cancel: CancellationToken, out: &mut W) -> Result<(), Error>
where
    C: Connect,
    W: Write,
{
    let mut poller = Poller::connect(connector, config).await?;
    poller.run(&cancel, out).await
}
