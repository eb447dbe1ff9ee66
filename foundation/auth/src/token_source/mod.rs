pub mod managed_identity_token_source;
pub mod token_cache;

use crate::error::Error;
use crate::token::Token;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;
use std::time::Duration;

#[async_trait]
pub trait TokenSource: Send + Sync + Debug {
    async fn token(&self) -> Result<Token, Error>;
}

fn default_http_client() -> Result<reqwest::Client, Error> {
    Ok(reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?)
}

/// Identity endpoints disagree on whether expiry fields are numbers or strings.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Seconds::Number(n) => Some(*n),
            Seconds::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Clone, Deserialize)]
struct InternalToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<Seconds>,
    pub expires_on: Option<Seconds>,
    pub resource: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl InternalToken {
    fn to_token(&self, now: time::OffsetDateTime) -> Token {
        let expires_on = self
            .expires_on
            .as_ref()
            .and_then(Seconds::as_i64)
            .and_then(|s| time::OffsetDateTime::from_unix_timestamp(s).ok());
        let expires_in = self
            .expires_in
            .as_ref()
            .and_then(Seconds::as_i64)
            .and_then(|s| now.checked_add(time::Duration::seconds(s)));
        Token {
            access_token: self.access_token.clone(),
            token_type: self.token_type.clone(),
            expiry: expires_on.or(expires_in),
            resource: self.resource.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imds_response_with_string_fields() {
        let json = r#"{
            "access_token": "eyJ0eXAi",
            "refresh_token": "",
            "expires_in": "3599",
            "expires_on": "1506484173",
            "not_before": "1506480273",
            "resource": "https://database.windows.net/",
            "token_type": "Bearer"
        }"#;
        let it: InternalToken = serde_json::from_str(json).unwrap();
        let token = it.to_token(time::OffsetDateTime::now_utc());
        assert_eq!("eyJ0eXAi", token.access_token);
        assert_eq!(1506484173, token.expiry.unwrap().unix_timestamp());
        assert_eq!(Some("https://database.windows.net/".to_string()), token.resource);
    }

    #[test]
    fn test_numeric_expires_in() {
        let json = r#"{"access_token": "abc", "expires_in": 3600}"#;
        let it: InternalToken = serde_json::from_str(json).unwrap();
        let now = time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let token = it.to_token(now);
        assert_eq!("Bearer", token.token_type);
        assert_eq!(1_700_003_600, token.expiry.unwrap().unix_timestamp());
    }

    #[test]
    fn test_unparsable_expires_on_falls_back_to_expires_in() {
        let json = r#"{"access_token": "abc", "expires_on": "09/14/2017 00:00:00 PM +00:00", "expires_in": "60"}"#;
        let it: InternalToken = serde_json::from_str(json).unwrap();
        let now = time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(1_700_000_060, it.to_token(now).expiry.unwrap().unix_timestamp());
    }

    #[test]
    fn test_out_of_range_expiry_is_ignored() {
        let json = r#"{"access_token": "abc", "expires_in": "9223372036854775807"}"#;
        let it: InternalToken = serde_json::from_str(json).unwrap();
        assert!(it.to_token(time::OffsetDateTime::now_utc()).expiry.is_none());

        let json = r#"{"access_token": "abc", "expires_on": "99999999999999", "expires_in": "60"}"#;
        let it: InternalToken = serde_json::from_str(json).unwrap();
        let now = time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(1_700_000_060, it.to_token(now).expiry.unwrap().unix_timestamp());
    }

    #[test]
    fn test_without_expiry() {
        let json = r#"{"access_token": "abc"}"#;
        let it: InternalToken = serde_json::from_str(json).unwrap();
        assert!(it.to_token(time::OffsetDateTime::now_utc()).expiry.is_none());
    }
}
