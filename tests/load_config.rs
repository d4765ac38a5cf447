use prism_load::config::{
    ENV_BASE_URL, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_REFRESH_TOKEN, ENV_TENANT_NAME,
    ENV_VERSION,
};
use prism_load::{load_config, ClientConfig, Endpoints, PrismError};
use serial_test::serial;
use std::env;
use std::fs::write;
use tempfile::NamedTempFile;

fn set_secrets() {
    env::set_var(ENV_CLIENT_ID, "cid");
    env::set_var(ENV_CLIENT_SECRET, "top-secret");
    env::set_var(ENV_REFRESH_TOKEN, "refresh-me");
}

fn clear_all() {
    for name in [
        ENV_BASE_URL,
        ENV_TENANT_NAME,
        ENV_VERSION,
        ENV_CLIENT_ID,
        ENV_CLIENT_SECRET,
        ENV_REFRESH_TOKEN,
    ] {
        env::remove_var(name);
    }
}

/// Static settings come from YAML, secrets from the environment.
#[test]
#[serial]
fn test_load_config_merges_yaml_and_env() {
    clear_all();
    set_secrets();
    let config_file = NamedTempFile::new().expect("temp file");
    write(
        config_file.path(),
        "base_url: https://wd2-impl-services1.workday.com/\ntenant_name: acme_dpt1\n",
    )
    .expect("write yaml");

    let config = load_config(config_file.path()).expect("config should load");
    assert_eq!(config.tenant_name, "acme_dpt1");
    assert_eq!(config.version, "v3");
    assert_eq!(config.credentials.client_secret, "top-secret");

    let endpoints = config.endpoints();
    assert_eq!(
        endpoints.token,
        "https://wd2-impl-services1.workday.com/ccx/oauth2/acme_dpt1/token"
    );
    assert_eq!(
        endpoints.prism,
        "https://wd2-impl-services1.workday.com/api/prismAnalytics/v3/acme_dpt1"
    );
    clear_all();
}

#[test]
#[serial]
fn test_load_config_errors_on_missing_secret() {
    clear_all();
    env::set_var(ENV_CLIENT_ID, "cid");
    env::set_var(ENV_CLIENT_SECRET, "top-secret");
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "base_url: https://x\ntenant_name: t\n").expect("write yaml");

    let err = load_config(config_file.path()).expect_err("refresh token missing");
    assert!(matches!(err, PrismError::Config(msg) if msg.contains(ENV_REFRESH_TOKEN)));
}

#[test]
#[serial]
fn test_load_config_rejects_bad_yaml_and_missing_file() {
    clear_all();
    set_secrets();
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "base_url: [unterminated\n").expect("write yaml");
    assert!(matches!(
        load_config(config_file.path()),
        Err(PrismError::Yaml(_))
    ));

    assert!(matches!(
        load_config("/definitely/not/here.yaml"),
        Err(PrismError::Io(_))
    ));
    clear_all();
}

#[test]
#[serial]
fn test_config_from_env_with_version() {
    clear_all();
    set_secrets();
    env::set_var(ENV_BASE_URL, "https://wd.example.com");
    env::set_var(ENV_TENANT_NAME, "acme");
    env::set_var(ENV_VERSION, "v2");

    let config = ClientConfig::from_env().expect("config from env");
    assert_eq!(config.version, "v2");
    assert_eq!(
        config.endpoints().wql,
        "https://wd.example.com/api/wql/v1/acme"
    );
    clear_all();
}

#[test]
fn test_credentials_debug_redacts_secrets() {
    let config = ClientConfig::new(
        "https://wd.example.com",
        "acme",
        prism_load::Credentials {
            client_id: "cid".to_string(),
            client_secret: "s3cr3t".to_string(),
            refresh_token: "r3fr3sh".to_string(),
        },
    );
    let rendered = format!("{config:?}");
    assert!(rendered.contains("cid"));
    assert!(!rendered.contains("s3cr3t"));
    assert!(!rendered.contains("r3fr3sh"));
}

#[test]
fn test_endpoints_trim_trailing_slash() {
    let endpoints = Endpoints::new("https://wd.example.com/", "acme", "v3");
    assert_eq!(endpoints.raas, "https://wd.example.com/ccx/service");
}
