use crate::error::Error;
use crate::token::Token;
use crate::token_source::InternalToken;
use crate::token_source::{default_http_client, TokenSource};
use async_trait::async_trait;
use msisql_metadata::Endpoint;
use urlencoding::encode;

/// Fetches tokens from a managed identity endpoint.
#[derive(Debug)]
pub struct ManagedIdentityTokenSource {
    token_url: String,
    header: (&'static str, String),
    client: reqwest::Client,
}

impl ManagedIdentityTokenSource {
    pub fn new(endpoint: &Endpoint, resource: &str, client_id: Option<&str>) -> Result<Self, Error> {
        if resource.is_empty() {
            return Err(Error::ResourceRequired);
        }

        let mut token_url = format!(
            "{}?api-version={}&resource={}",
            endpoint.url(),
            endpoint.api_version(),
            encode(resource)
        );
        if let Some(client_id) = client_id {
            token_url = format!("{token_url}&{}={}", endpoint.client_id_param(), encode(client_id));
        }

        let (key, value) = endpoint.identity_header();
        Ok(Self {
            token_url,
            header: (key, value.to_string()),
            client: default_http_client()?,
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl TokenSource for ManagedIdentityTokenSource {
    async fn token(&self) -> Result<Token, Error> {
        let response = self
            .client
            .get(&self.token_url)
            .header(self.header.0, &self.header.1)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::TokenAcquisition {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let it = serde_json::from_slice::<InternalToken>(&body)?;
        if it.access_token.is_empty() {
            return Err(Error::InvalidToken);
        }
        Ok(it.to_token(time::OffsetDateTime::now_utc()))
    }
}
