use std::error::Error;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

#[async_trait]
pub trait TokenSource: Send + Sync + Debug {
    /// token returns a valid access token, without any "Bearer" prefix.
    async fn token(&self) -> Result<String, Box<dyn Error + Send + Sync>>;
}

pub trait TokenSourceProvider: Send + Sync + Debug {
    /// token_source returns the token source implementation
    fn token_source(&self) -> Arc<dyn TokenSource>;
}

/// A token source that always hands out the same token.
/// Useful for local servers that accept any token and for tests.
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(self.token.clone())
    }
}
