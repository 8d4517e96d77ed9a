use std::{path::PathBuf, sync::OnceLock};

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,

    // uploads
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_upload_max_bytes")]
    pub upload_max_bytes: usize,

    // logging
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub tokio_console: bool,

    // ai
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    #[serde(default = "default_ai_timeout_secs")]
    pub ai_timeout_secs: u64,

    // build
    #[serde(default = "default_local")]
    pub source: String,
    #[serde(default = "default_local")]
    pub git_commit: String,
    #[serde(default = "default_local")]
    pub pipeline_id: String,
    #[serde(default = "default_local")]
    pub version: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4000
}

fn default_database_url() -> String {
    "sqlite.db".into()
}

fn default_upload_dir() -> PathBuf {
    "uploads".into()
}

fn default_upload_max_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".into()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

fn default_ai_timeout_secs() -> u64 {
    60
}

fn default_local() -> String {
    "local".into()
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>().unwrap_or_else(|e| panic!("invalid configuration: {e}"))
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_environment() {
        let config = envy::from_iter::<_, Config>(Vec::<(String, String)>::new()).unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.upload_max_bytes, 10 * 1024 * 1024);
        assert!(config.gemini_api_key.is_none());
        assert!(!config.log_json);
    }

    #[test]
    fn reads_overrides() {
        let config = envy::from_iter::<_, Config>(vec![
            ("PORT".to_string(), "8080".to_string()),
            ("UPLOAD_DIR".to_string(), "/tmp/up".to_string()),
            ("GEMINI_API_KEY".to_string(), "secret".to_string()),
            ("LOG_JSON".to_string(), "true".to_string()),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/up"));
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert!(config.log_json);
    }
}
