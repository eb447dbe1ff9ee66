#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    EndpointDiscovery(#[from] msisql_metadata::Error),

    #[error("token endpoint responded with status {status}: {message}")]
    TokenAcquisition { status: u16, message: String },

    #[error("resource is required")]
    ResourceRequired,

    #[error(transparent)]
    HttpError(#[from] reqwest::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error("token response did not contain an access token")]
    InvalidToken,

    #[error("token refresh failed: {0}")]
    RefreshFailed(#[source] Box<Error>),
}
