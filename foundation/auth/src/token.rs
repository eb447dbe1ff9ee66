use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;

use msisql_metadata::{msi_endpoint, Endpoint};
use msisql_token::{TokenSource, TokenSourceProvider};

use crate::error::Error;
use crate::token_source::managed_identity_token_source::ManagedIdentityTokenSource;
use crate::token_source::token_cache::TokenCache;
use crate::token_source::TokenSource as InternalTokenSource;
use crate::Config;

/// Tokens are refreshed once they are this close to expiry.
pub const REFRESH_WINDOW: time::Duration = time::Duration::minutes(5);

#[derive(Clone)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub expiry: Option<time::OffsetDateTime>,
    pub resource: Option<String>,
}

// The access token must never reach the logs.
impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl Token {
    pub fn valid(&self) -> bool {
        !self.access_token.is_empty() && !self.expired()
    }

    fn expired(&self) -> bool {
        match self.expiry {
            None => false,
            // an expiry too early to subtract the window from is long past
            Some(s) => match s.checked_sub(REFRESH_WINDOW) {
                Some(refresh_at) => time::OffsetDateTime::now_utc() > refresh_at,
                None => true,
            },
        }
    }
}

/// Provides access tokens issued to the managed identity of the current host.
pub struct ManagedIdentityTokenProvider {
    ts: Arc<DefaultTokenSource>,
    cache: Arc<TokenCache>,
    pub endpoint: Endpoint,
}

impl Debug for ManagedIdentityTokenProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ManagedIdentityTokenProvider({:?})", self.endpoint)
    }
}

impl ManagedIdentityTokenProvider {
    pub async fn new(config: Config<'_>) -> Result<Self, Error> {
        let endpoint = msi_endpoint().await?;
        Self::new_with_endpoint(config, endpoint).await
    }

    /// Creates the provider for an already discovered endpoint.
    /// The first token is fetched eagerly so misconfigured identities fail here.
    pub async fn new_with_endpoint(config: Config<'_>, endpoint: Endpoint) -> Result<Self, Error> {
        let source = ManagedIdentityTokenSource::new(&endpoint, config.resource(), config.client_id())?;
        let token = source.token().await?;
        tracing::debug!("initial token acquired : expiry={:?}", token.expiry);

        let cache = Arc::new(TokenCache::new(Box::new(source), token));
        Ok(Self {
            ts: Arc::new(DefaultTokenSource::new(cache.clone())),
            cache,
            endpoint,
        })
    }

    pub fn token_cache(&self) -> Arc<TokenCache> {
        self.cache.clone()
    }
}

impl TokenSourceProvider for ManagedIdentityTokenProvider {
    fn token_source(&self) -> Arc<dyn TokenSource> {
        self.ts.clone()
    }
}

/// acquire_token_provider discovers the managed identity endpoint and acquires the first token.
pub async fn acquire_token_provider(config: Config<'_>) -> Result<ManagedIdentityTokenProvider, Error> {
    ManagedIdentityTokenProvider::new(config).await
}

/// Hands out the access token of a [`TokenCache`], refreshing it when needed.
#[derive(Debug, Clone)]
pub struct DefaultTokenSource {
    inner: Arc<TokenCache>,
}

impl DefaultTokenSource {
    pub fn new(inner: Arc<TokenCache>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TokenSource for DefaultTokenSource {
    async fn token(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let token = self.inner.get_valid_token().await?;
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expiry: Option<time::OffsetDateTime>) -> Token {
        Token {
            access_token: "tok123".to_string(),
            token_type: "Bearer".to_string(),
            expiry,
            resource: None,
        }
    }

    #[test]
    fn test_token_without_expiry_is_valid() {
        assert!(token(None).valid());
    }

    #[test]
    fn test_empty_token_is_invalid() {
        let mut t = token(None);
        t.access_token = String::new();
        assert!(!t.valid());
    }

    #[test]
    fn test_token_inside_refresh_window_is_invalid() {
        let now = time::OffsetDateTime::now_utc();
        assert!(!token(Some(now + time::Duration::minutes(4))).valid());
        assert!(!token(Some(now - time::Duration::seconds(1))).valid());
        assert!(token(Some(now + time::Duration::minutes(30))).valid());
    }

    #[test]
    fn test_earliest_expiry_is_expired() {
        let earliest = time::OffsetDateTime::from_unix_timestamp(-377705116800).unwrap();
        assert!(!token(Some(earliest)).valid());
    }

    #[test]
    fn test_debug_hides_access_token() {
        let printed = format!("{:?}", token(None));
        assert!(!printed.contains("tok123"));
    }
}
