//! Client settings: where the tenant lives and how to authenticate.
//!
//! Static settings (base URL, tenant, API version) come from a YAML file,
//! secrets are always read from the environment so they never land in a
//! config file.

use crate::error::{PrismError, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const DEFAULT_API_VERSION: &str = "v3";

pub const ENV_BASE_URL: &str = "PRISM_BASE_URL";
pub const ENV_TENANT_NAME: &str = "PRISM_TENANT_NAME";
pub const ENV_VERSION: &str = "PRISM_VERSION";
pub const ENV_CLIENT_ID: &str = "PRISM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "PRISM_CLIENT_SECRET";
pub const ENV_REFRESH_TOKEN: &str = "PRISM_REFRESH_TOKEN";

/// OAuth2 material exchanged for a short-lived bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    /// Never printed by `Debug`.
    pub client_secret: String,
    /// Never printed by `Debug`.
    pub refresh_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub tenant_name: String,
    pub version: String,
    pub credentials: Credentials,
}

/// The non-secret part of the config file.
#[derive(Deserialize)]
struct StaticConfig {
    base_url: String,
    tenant_name: String,
    #[serde(default)]
    version: Option<String>,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        tenant_name: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            tenant_name: tenant_name.into(),
            version: DEFAULT_API_VERSION.to_string(),
            credentials,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Build the whole config from `PRISM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let base_url = required_env(ENV_BASE_URL)?;
        let tenant_name = required_env(ENV_TENANT_NAME)?;
        let version =
            std::env::var(ENV_VERSION).unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());
        let credentials = credentials_from_env()?;
        info!(base_url = %base_url, tenant_name = %tenant_name, version = %version, "Config loaded from environment");
        Ok(Self {
            base_url,
            tenant_name,
            version,
            credentials,
        })
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.base_url, &self.tenant_name, &self.version)
    }
}

/// Base URLs of the services a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// OAuth2 token exchange.
    pub token: String,
    /// Prism Analytics REST root, versioned.
    pub prism: String,
    /// WQL root (queries and data sources).
    pub wql: String,
    /// Report-as-a-service root.
    pub raas: String,
    pub tenant_name: String,
}

impl Endpoints {
    pub fn new(base_url: &str, tenant_name: &str, version: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            token: format!("{base}/ccx/oauth2/{tenant_name}/token"),
            prism: format!("{base}/api/prismAnalytics/{version}/{tenant_name}"),
            wql: format!("{base}/api/wql/v1/{tenant_name}"),
            raas: format!("{base}/ccx/service"),
            tenant_name: tenant_name.to_string(),
        }
    }
}

/// Loads a static YAML config file (no secrets) and injects the credentials
/// from the environment. A `.env` file is honoured if present.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");
    dotenvy::dotenv().ok();

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(PrismError::Io(e));
        }
    };

    let static_conf: StaticConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => conf,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(PrismError::Yaml(e));
        }
    };

    if static_conf.base_url.trim().is_empty() || static_conf.tenant_name.trim().is_empty() {
        error!(config_path = ?path_ref, "base_url and tenant_name must not be empty");
        return Err(PrismError::Config(
            "base_url and tenant_name must not be empty".to_string(),
        ));
    }

    let credentials = credentials_from_env()?;
    let version = static_conf
        .version
        .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

    info!(
        base_url = %static_conf.base_url,
        tenant_name = %static_conf.tenant_name,
        version = %version,
        "Config loaded and merged successfully"
    );

    Ok(ClientConfig {
        base_url: static_conf.base_url,
        tenant_name: static_conf.tenant_name,
        version,
        credentials,
    })
}

fn credentials_from_env() -> Result<Credentials> {
    Ok(Credentials {
        client_id: required_env(ENV_CLIENT_ID)?,
        client_secret: required_env(ENV_CLIENT_SECRET)?,
        refresh_token: required_env(ENV_REFRESH_TOKEN)?,
    })
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => {
            error!(var = name, "environment variable is empty");
            Err(PrismError::Config(format!("{name} environment variable is empty")))
        }
        Err(e) => {
            error!(error = ?e, var = name, "environment variable not set");
            Err(PrismError::Config(format!(
                "{name} environment variable not set: {e}"
            )))
        }
    }
}
