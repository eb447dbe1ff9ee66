use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use msisql_token::TokenSource;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

pub const SERVER_NAME_ENV: &str = "SERVER_NAME";
pub const DATABASE_NAME_ENV: &str = "DATABASE_NAME";

/// Connection descriptor. Values are used as given.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub server: String,
    pub database: String,
}

impl ClientConfig {
    pub fn new(server: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
        }
    }

    /// Reads `SERVER_NAME` and `DATABASE_NAME`. Missing variables are empty.
    pub fn from_env() -> Self {
        Self {
            server: std::env::var(SERVER_NAME_ENV).unwrap_or_default(),
            database: std::env::var(DATABASE_NAME_ENV).unwrap_or_default(),
        }
    }

    pub fn connection_string(&self) -> String {
        format!("Server={};Database={};", self.server, self.database)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error("failed to obtain access token: {0}")]
    Token(Box<dyn StdError + Send + Sync>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Driver(#[from] tiberius::error::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Driver(Box<dyn StdError + Send + Sync>),

    #[error("no rows in result set")]
    NoRows,

    #[error("converting NULL to string is unsupported")]
    NullMessage,
}

impl QueryError {
    /// True when the driver lost the connection rather than rejecting the query.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            QueryError::Driver(e) => {
                matches!(
                    e.downcast_ref::<tiberius::error::Error>(),
                    Some(tiberius::error::Error::Io { .. })
                ) || e.downcast_ref::<std::io::Error>().is_some()
            }
            _ => false,
        }
    }
}

impl From<tiberius::error::Error> for QueryError {
    fn from(e: tiberius::error::Error) -> Self {
        QueryError::Driver(Box::new(e))
    }
}

/// An open database session.
#[async_trait]
pub trait Session: Send {
    /// Runs `sql` and returns the first column of the first row.
    /// `None` when the result set is empty, `Some(None)` when the value is NULL.
    async fn query_text(&mut self, sql: &str) -> Result<Option<Option<String>>, QueryError>;
}

/// Opens authenticated sessions.
#[async_trait]
pub trait Connect: Send + Sync {
    type Session: Session;

    async fn connect(&self) -> Result<Self::Session, ConnectionError>;
}

/// Authenticates each connection with an access token taken from the token source.
#[derive(Debug, Clone)]
pub struct AccessTokenConnector {
    config: ClientConfig,
    token_source: Arc<dyn TokenSource>,
}

impl AccessTokenConnector {
    pub fn new(config: ClientConfig, token_source: Arc<dyn TokenSource>) -> Self {
        Self { config, token_source }
    }

    async fn login(config: Config) -> Result<Client<Compat<TcpStream>>, ConnectionError> {
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Ok(Client::connect(config, tcp.compat_write()).await?)
    }
}

#[async_trait]
impl Connect for AccessTokenConnector {
    type Session = SqlSession;

    async fn connect(&self) -> Result<SqlSession, ConnectionError> {
        let token = self.token_source.token().await.map_err(ConnectionError::Token)?;

        let mut config = Config::from_ado_string(&self.config.connection_string())?;
        config.authentication(AuthMethod::AADToken(token));

        let client = match Self::login(config.clone()).await {
            Ok(client) => client,
            // Azure SQL gateways redirect to the node hosting the database
            Err(ConnectionError::Driver(tiberius::error::Error::Routing { host, port })) => {
                tracing::info!("redirected to {host}:{port}");
                config.host(&host);
                config.port(port);
                Self::login(config).await?
            }
            Err(e) => return Err(e),
        };

        tracing::info!("connected to server={} database={}", self.config.server, self.config.database);
        Ok(SqlSession { client })
    }
}

pub struct SqlSession {
    client: Client<Compat<TcpStream>>,
}

#[async_trait]
impl Session for SqlSession {
    async fn query_text(&mut self, sql: &str) -> Result<Option<Option<String>>, QueryError> {
        let row = self.client.simple_query(sql).await?.into_row().await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let value: Option<&str> = row.try_get(0)?;
                Ok(Some(value.map(str::to_string)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_connection_lost() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        assert!(QueryError::Driver(Box::new(reset)).is_connection_lost());

        let io = tiberius::error::Error::Io {
            kind: std::io::ErrorKind::UnexpectedEof,
            message: "eof".to_string(),
        };
        assert!(QueryError::from(io).is_connection_lost());

        let rejected = QueryError::Driver("Invalid object name 'messagelist'.".into());
        assert!(!rejected.is_connection_lost());
        assert!(!QueryError::NoRows.is_connection_lost());
    }

    #[test]
    fn test_connection_string() {
        let config = ClientConfig::new("dbhost", "appdb");
        assert_eq!("Server=dbhost;Database=appdb;", config.connection_string());
    }

    #[test]
    fn test_connection_string_parses() {
        let config = ClientConfig::new("tcp:myserver.database.windows.net,1433", "appdb");
        let parsed = Config::from_ado_string(&config.connection_string()).unwrap();
        assert_eq!("myserver.database.windows.net:1433", parsed.get_addr());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        temp_env::with_vars(
            [(SERVER_NAME_ENV, Some("dbhost")), (DATABASE_NAME_ENV, Some("appdb"))],
            || assert_eq!(ClientConfig::new("dbhost", "appdb"), ClientConfig::from_env()),
        );
    }

    #[test]
    #[serial]
    fn test_from_env_missing() {
        temp_env::with_vars(
            [(SERVER_NAME_ENV, None::<&str>), (DATABASE_NAME_ENV, None)],
            || assert_eq!("Server=;Database=;", ClientConfig::from_env().connection_string()),
        );
    }
}
