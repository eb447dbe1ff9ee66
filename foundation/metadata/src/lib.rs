use std::time::Duration;

use reqwest::header::{HeaderValue, USER_AGENT};

pub const METADATA_IP: &str = "169.254.169.254";
pub const METADATA_HOST_ENV: &str = "AZURE_IMDS_HOST";
pub const METADATA_KEY: &str = "Metadata";
pub const METADATA_TRUE: &str = "true";
pub const IMDS_TOKEN_PATH: &str = "/metadata/identity/oauth2/token";
pub const IMDS_API_VERSION: &str = "2018-02-01";

pub const IDENTITY_ENDPOINT_ENV: &str = "IDENTITY_ENDPOINT";
pub const IDENTITY_HEADER_ENV: &str = "IDENTITY_HEADER";
pub const IDENTITY_HEADER_KEY: &str = "X-IDENTITY-HEADER";
pub const APP_SERVICE_API_VERSION: &str = "2019-08-01";

pub const MSI_ENDPOINT_ENV: &str = "MSI_ENDPOINT";
pub const MSI_SECRET_ENV: &str = "MSI_SECRET";
pub const MSI_SECRET_KEY: &str = "secret";
pub const LEGACY_APP_SERVICE_API_VERSION: &str = "2017-09-01";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("managed identity endpoint {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{0} must be set when the managed identity endpoint is configured")]
    MissingEnv(&'static str),
    #[error("invalid managed identity endpoint: {0:?}")]
    InvalidEndpoint(String),
}

/// The managed identity endpoint available to this process.
#[derive(Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Azure Instance Metadata Service, reachable from VMs, VM scale sets and AKS nodes.
    Imds { url: String },
    /// App Service / Functions identity endpoint (`IDENTITY_ENDPOINT` + `IDENTITY_HEADER`).
    AppService { url: String, header: String },
    /// Pre-2019 App Service endpoint (`MSI_ENDPOINT` + `MSI_SECRET`).
    LegacyAppService { url: String, secret: String },
}

// The header values are secrets.
impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Imds { url } => write!(f, "Endpoint::Imds({url})"),
            Endpoint::AppService { url, .. } => write!(f, "Endpoint::AppService({url})"),
            Endpoint::LegacyAppService { url, .. } => write!(f, "Endpoint::LegacyAppService({url})"),
        }
    }
}

impl Endpoint {
    pub fn url(&self) -> &str {
        match self {
            Endpoint::Imds { url } => url,
            Endpoint::AppService { url, .. } => url,
            Endpoint::LegacyAppService { url, .. } => url,
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            Endpoint::Imds { .. } => IMDS_API_VERSION,
            Endpoint::AppService { .. } => APP_SERVICE_API_VERSION,
            Endpoint::LegacyAppService { .. } => LEGACY_APP_SERVICE_API_VERSION,
        }
    }

    /// Header the endpoint requires on every token request.
    pub fn identity_header(&self) -> (&'static str, &str) {
        match self {
            Endpoint::Imds { .. } => (METADATA_KEY, METADATA_TRUE),
            Endpoint::AppService { header, .. } => (IDENTITY_HEADER_KEY, header),
            Endpoint::LegacyAppService { secret, .. } => (MSI_SECRET_KEY, secret),
        }
    }

    /// Query parameter naming a user-assigned identity.
    pub fn client_id_param(&self) -> &'static str {
        match self {
            Endpoint::LegacyAppService { .. } => "clientid",
            _ => "client_id",
        }
    }
}

/// msi_endpoint discovers the managed identity endpoint.
///
/// Explicit App Service configuration wins over IMDS. IMDS is only returned
/// when something answers HTTP on the metadata host.
pub async fn msi_endpoint() -> Result<Endpoint, Error> {
    if let Some(url) = non_empty_var(IDENTITY_ENDPOINT_ENV) {
        let header = non_empty_var(IDENTITY_HEADER_ENV).ok_or(Error::MissingEnv(IDENTITY_HEADER_ENV))?;
        let url = validate_url(url)?;
        tracing::info!("using App Service identity endpoint {url}");
        return Ok(Endpoint::AppService { url, header });
    }

    if let Some(url) = non_empty_var(MSI_ENDPOINT_ENV) {
        let secret = non_empty_var(MSI_SECRET_ENV).ok_or(Error::MissingEnv(MSI_SECRET_ENV))?;
        let url = validate_url(url)?;
        tracing::info!("using legacy App Service identity endpoint {url}");
        return Ok(Endpoint::LegacyAppService { url, secret });
    }

    let host = non_empty_var(METADATA_HOST_ENV).unwrap_or_else(|| METADATA_IP.to_string());
    probe_imds(&host).await?;
    let url = format!("http://{host}{IMDS_TOKEN_PATH}");
    tracing::info!("using instance metadata identity endpoint {url}");
    Ok(Endpoint::Imds { url })
}

async fn probe_imds(host: &str) -> Result<(), Error> {
    let url = format!("http://{host}/metadata/instance?api-version={IMDS_API_VERSION}");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|source| Error::Unreachable {
            url: url.clone(),
            source,
        })?;

    // Pod identity proxies only answer the token path, so any HTTP answer means reachable.
    let response = client
        .get(&url)
        .header(METADATA_KEY, HeaderValue::from_static(METADATA_TRUE))
        .header(USER_AGENT, HeaderValue::from_static("msisql/0.1"))
        .send()
        .await
        .map_err(|source| Error::Unreachable {
            url: url.clone(),
            source,
        })?;
    tracing::debug!("metadata probe status={}", response.status());
    Ok(())
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn validate_url(url: String) -> Result<String, Error> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url)
    } else {
        Err(Error::InvalidEndpoint(url))
    }
}
