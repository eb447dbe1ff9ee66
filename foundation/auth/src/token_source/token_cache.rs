use crate::error::Error;
use crate::token::Token;
use crate::token_source::TokenSource;
use async_trait::async_trait;

/// Caches the last token and refreshes it from `target` once it is no longer valid.
#[derive(Debug)]
pub struct TokenCache {
    target: Box<dyn TokenSource>,
    current_token: parking_lot::RwLock<Token>,
    guard: tokio::sync::Mutex<()>,
}

impl TokenCache {
    pub fn new(target: Box<dyn TokenSource>, token: Token) -> TokenCache {
        TokenCache {
            target,
            current_token: parking_lot::RwLock::new(token),
            guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the cached token if it is still valid, otherwise a freshly refreshed one.
    /// A failed refresh is an error; the stale token is never handed out.
    pub async fn get_valid_token(&self) -> Result<Token, Error> {
        if let Some(token) = self.valid_token() {
            return Ok(token);
        }

        // Only single task can refresh token
        let _locking = self.guard.lock().await;

        if let Some(token) = self.valid_token() {
            return Ok(token);
        }

        let token = self
            .target
            .token()
            .await
            .map_err(|e| Error::RefreshFailed(Box::new(e)))?;
        tracing::debug!("token refresh success : expiry={:?}", token.expiry);
        *self.current_token.write() = token.clone();
        Ok(token)
    }

    /// Returns the cached token without checking its freshness.
    pub fn current(&self) -> Token {
        self.current_token.read().clone()
    }

    fn valid_token(&self) -> Option<Token> {
        let token = self.current_token.read();
        if token.valid() {
            Some(token.clone())
        } else {
            None
        }
    }
}

#[async_trait]
impl TokenSource for TokenCache {
    async fn token(&self) -> Result<Token, Error> {
        self.get_valid_token().await
    }
}
