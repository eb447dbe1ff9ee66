pub mod error;
pub mod token;
pub mod token_source;

pub use token::{acquire_token_provider, ManagedIdentityTokenProvider};

/// Audience of Azure SQL Database access tokens.
pub const DATABASE_RESOURCE: &str = "https://database.windows.net/";

#[derive(Debug, Clone, Default)]
pub struct Config<'a> {
    resource: Option<&'a str>,
    client_id: Option<&'a str>,
}

impl<'a> Config<'a> {
    pub fn with_resource(mut self, value: &'a str) -> Self {
        self.resource = Some(value);
        self
    }

    /// Selects a user-assigned identity. Empty values keep the system-assigned identity.
    pub fn with_client_id(mut self, value: &'a str) -> Self {
        if !value.is_empty() {
            self.client_id = Some(value);
        }
        self
    }

    pub fn resource(&self) -> &'a str {
        self.resource.unwrap_or(DATABASE_RESOURCE)
    }

    pub fn client_id(&self) -> Option<&'a str> {
        self.client_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_to_database_resource() {
        let config = Config::default();
        assert_eq!("https://database.windows.net/", config.resource());
        assert_eq!(None, config.client_id());
    }

    #[test]
    fn test_config_ignores_empty_client_id() {
        let config = Config::default().with_client_id("");
        assert_eq!(None, config.client_id());
        let config = config.with_client_id("7f1a");
        assert_eq!(Some("7f1a"), config.client_id());
    }
}
