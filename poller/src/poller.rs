use std::io::Write;
use std::time::Duration;

use tokio::select;

use crate::cancel::CancellationToken;
use crate::client::{Connect, QueryError, Session};
use crate::Error;

/// Selects the newest message.
pub const QUERY: &str = "select top 1 message_text from messagelist order by id desc;";

#[derive(Clone, Debug)]
pub struct PollerConfig {
    /// Pause between two queries.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            interval: Duration::from_secs(10),
        }
    }
}

pub struct Poller<'a, C: Connect> {
    connector: &'a C,
    session: C::Session,
    config: PollerConfig,
}

impl<'a, C: Connect> Poller<'a, C> {
    /// Opens the first session through `connector`.
    pub async fn connect(connector: &'a C, config: PollerConfig) -> Result<Self, Error> {
        let session = connector.connect().await?;
        Ok(Self {
            connector,
            session,
            config,
        })
    }

    /// Reads the newest message. An empty table or a NULL message is an error.
    ///
    /// A session whose connection broke is reopened once through the connector,
    /// which authenticates with a token from the token source again.
    pub async fn latest_message(&mut self) -> Result<String, Error> {
        let row = match self.session.query_text(QUERY).await {
            Err(e) if e.is_connection_lost() => {
                tracing::warn!("connection lost, reconnecting: {e}");
                self.session = self.connector.connect().await?;
                self.session.query_text(QUERY).await?
            }
            result => result?,
        };
        Ok(row.ok_or(QueryError::NoRows)?.ok_or(QueryError::NullMessage)?)
    }

    /// Prints the newest message every `interval` until cancelled.
    /// The first error ends the loop.
    pub async fn run<W: Write>(&mut self, cancel: &CancellationToken, out: &mut W) -> Result<(), Error> {
        loop {
            if cancel.is_cancelled() {
                tracing::info!("poller cancelled");
                return Ok(());
            }

            let message = self.latest_message().await?;
            tracing::debug!("polled message length={}", message.len());
            writeln!(out, "Message is: {message}").map_err(Error::Output)?;
            out.flush().map_err(Error::Output)?;

            select! {
                _ = cancel.cancelled() => {
                    tracing::info!("poller cancelled");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }
}
