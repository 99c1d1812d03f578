//! Configuration loading
//!
//! Configuration is read once at startup from a JSON5 file and then
//! overlaid with standard AWS environment variables. The resulting
//! [`Config`] is passed explicitly to whatever needs it.
//!
//! Path resolution, first match wins:
//! 1. an explicit path (the `--config` flag)
//! 2. `$BEDROCK_PREVIEW_CONFIG`
//! 3. `<config dir>/bedrock-preview/config.json5`
//!
//! Only the default path may be absent.

pub mod types;

pub use types::*;

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "BEDROCK_PREVIEW_CONFIG";

/// Flat top-level keys accepted from older secrets files, mapped into `aws`.
const LEGACY_AWS_KEYS: &[(&str, &str)] = &[
    ("AWS_REGION", "region"),
    ("AWS_ACCESS_KEY", "accessKeyId"),
    ("AWS_SECRET_KEY", "secretAccessKey"),
];

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("missing AWS setting: {0}")]
    MissingCredentials(&'static str),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The per-user default location of the config file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bedrock-preview")
        .join("config.json5")
}

/// Resolve which file to load and whether it must exist.
fn resolve_config_path(
    explicit: Option<&Path>,
    env: &impl Fn(&str) -> Option<String>,
) -> (PathBuf, bool) {
    if let Some(path) = explicit {
        return (path.to_path_buf(), true);
    }
    if let Some(path) = env(CONFIG_PATH_ENV).filter(|p| !p.trim().is_empty()) {
        return (PathBuf::from(path), true);
    }
    (default_config_path(), false)
}

/// The path `load_config` would read, for display.
pub fn get_config_path(explicit: Option<&Path>) -> PathBuf {
    resolve_config_path(explicit, &|key: &str| std::env::var(key).ok()).0
}

/// Load configuration from disk and the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with_env(explicit, |key: &str| std::env::var(key).ok())
}

/// Like [`load_config`] with an injectable environment lookup.
pub fn load_config_with_env(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let (path, required) = resolve_config_path(explicit, &env);
    let mut config = match std::fs::read_to_string(&path) {
        Ok(raw) => {
            debug!(path = %path.display(), "loading config file");
            parse_config(&raw)?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            debug!(path = %path.display(), "no config file, using defaults");
            Config::default()
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };
    apply_env_overrides(&mut config, &env);
    config.validate()?;
    Ok(config)
}

/// Parse JSON5 configuration text.
pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let mut value: Value = json5::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    if value.is_null() {
        return Ok(Config::default());
    }
    normalize_legacy_keys(&mut value)?;
    serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Move flat `AWS_*` keys into the `aws` section. Explicit `aws.*` values win.
fn normalize_legacy_keys(value: &mut Value) -> Result<(), ConfigError> {
    let root = value
        .as_object_mut()
        .ok_or_else(|| ConfigError::Parse("config root must be an object".to_string()))?;

    let mut legacy = serde_json::Map::new();
    for (old, new) in LEGACY_AWS_KEYS {
        if let Some(v) = root.remove(*old) {
            legacy.insert((*new).to_string(), v);
        }
    }
    if legacy.is_empty() {
        return Ok(());
    }

    let aws = root
        .entry("aws")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let aws = aws
        .as_object_mut()
        .ok_or_else(|| ConfigError::Parse("aws must be an object".to_string()))?;
    for (key, v) in legacy {
        aws.entry(key).or_insert(v);
    }
    Ok(())
}

/// Overlay environment variables, which take precedence over the file.
fn apply_env_overrides(config: &mut Config, env: &impl Fn(&str) -> Option<String>) {
    let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(region) = get("AWS_REGION").or_else(|| get("AWS_DEFAULT_REGION")) {
        config.aws.region = Some(region);
    }
    if let Some(key) = get("AWS_ACCESS_KEY_ID") {
        config.aws.access_key_id = Some(key);
    }
    if let Some(secret) = get("AWS_SECRET_ACCESS_KEY") {
        config.aws.secret_access_key = Some(secret);
    }
    if let Some(token) = get("AWS_SESSION_TOKEN") {
        config.aws.session_token = Some(token);
    }
    if let Some(model) = get("BEDROCK_MODEL_ID") {
        config.model.id = model;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_full_config() {
        let cfg = parse_config(
            r#"{
                // JSON5 comments are allowed
                aws: { region: "us-west-2", accessKeyId: "AKID", secretAccessKey: "secret" },
                model: { id: "amazon.titan-text-express-v1", maxTokens: 256, temperature: 0.2, topP: 0.8 },
                http: { connectTimeoutSecs: 5, timeoutSecs: 60 },
                logging: { level: "debug", format: "json" },
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.aws.region.as_deref(), Some("us-west-2"));
        assert_eq!(cfg.model.id, "amazon.titan-text-express-v1");
        assert_eq!(cfg.model.max_tokens, 256);
        assert_eq!(cfg.model.generation().top_p, 0.8);
        assert_eq!(cfg.http.timeout_secs, Some(60));
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_parse_empty_object_uses_defaults() {
        let cfg = parse_config("{}").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.model.id, "amazon.titan-text-lite-v1");
        assert_eq!(cfg.model.max_tokens, 512);
        assert_eq!(cfg.model.temperature, 0.5);
        assert_eq!(cfg.model.top_p, 0.9);
        assert_eq!(cfg.http.connect_timeout_secs, 10);
        assert!(cfg.http.timeout_secs.is_none());
    }

    #[test]
    fn test_parse_legacy_flat_keys() {
        let cfg = parse_config(
            r#"{"AWS_ACCESS_KEY": "AKID", "AWS_SECRET_KEY": "secret", "AWS_REGION": "eu-central-1"}"#,
        )
        .unwrap();
        let (region, creds) = cfg.aws.credentials().unwrap();
        assert_eq!(region, "eu-central-1");
        assert_eq!(creds.access_key_id(), "AKID");
    }

    #[test]
    fn test_legacy_keys_do_not_override_aws_section() {
        let cfg = parse_config(r#"{AWS_REGION: "us-east-1", aws: {region: "ap-south-1"}}"#).unwrap();
        assert_eq!(cfg.aws.region.as_deref(), Some("ap-south-1"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_config("{ not json"), Err(ConfigError::Parse(_))));
        assert!(matches!(parse_config("[1, 2]"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            parse_config(r#"{model: {maxTokens: "many"}}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_credentials_report_first_missing_field() {
        let cfg = parse_config(r#"{aws: {region: "us-east-1", accessKeyId: "AKID"}}"#).unwrap();
        let err = cfg.aws.credentials().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials("secretAccessKey")));

        let cfg = Config::default();
        assert!(matches!(
            cfg.aws.credentials(),
            Err(ConfigError::MissingCredentials("region"))
        ));
    }

    #[test]
    fn test_credentials_include_session_token() {
        let cfg = parse_config(
            r#"{aws: {region: "us-east-1", accessKeyId: "AKID", secretAccessKey: "s", sessionToken: "tok"}}"#,
        )
        .unwrap();
        let (_, creds) = cfg.aws.credentials().unwrap();
        assert!(creds.has_session_token());
    }

    #[test]
    fn test_validate_rejects_bad_sampling() {
        let mut cfg = Config::default();
        cfg.model.temperature = 2.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.model.max_tokens = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.http.timeout_secs = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let cfg = parse_config(
            r#"{aws: {region: "us-east-1", accessKeyId: "AKIAVISIBLE", secretAccessKey: "hunter2"}}"#,
        )
        .unwrap();
        let rendered = format!("{cfg:?}");
        assert!(rendered.contains("us-east-1"));
        assert!(!rendered.contains("AKIAVISIBLE"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_load_missing_explicit_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.json5");
        let err = load_config_with_env(Some(missing.as_path()), env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_env_path_with_overrides() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json5");
        std::fs::write(
            &path,
            r#"{aws: {region: "us-east-1", accessKeyId: "FILEKEY", secretAccessKey: "filesecret"}}"#,
        )
        .unwrap();
        let path_str = path.to_string_lossy().to_string();

        let cfg = load_config_with_env(
            None,
            env_from(&[
                (CONFIG_PATH_ENV, path_str.as_str()),
                ("AWS_ACCESS_KEY_ID", "ENVKEY"),
                ("AWS_DEFAULT_REGION", "us-west-1"),
                ("BEDROCK_MODEL_ID", "amazon.titan-text-express-v1"),
                ("AWS_SESSION_TOKEN", ""),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.aws.access_key_id.as_deref(), Some("ENVKEY"));
        assert_eq!(cfg.aws.secret_access_key.as_deref(), Some("filesecret"));
        assert_eq!(cfg.aws.region.as_deref(), Some("us-west-1"));
        assert!(cfg.aws.session_token.is_none());
        assert_eq!(cfg.model.id, "amazon.titan-text-express-v1");
    }

    #[test]
    fn test_aws_region_beats_default_region() {
        let mut cfg = Config::default();
        apply_env_overrides(
            &mut cfg,
            &env_from(&[("AWS_REGION", "us-east-2"), ("AWS_DEFAULT_REGION", "us-west-1")]),
        );
        assert_eq!(cfg.aws.region.as_deref(), Some("us-east-2"));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json5");
        std::fs::write(&path, r#"{model: {topP: 1.5}}"#).unwrap();
        let err = load_config_with_env(Some(path.as_path()), env_from(&[])).unwrap_err();
        assert!(err.to_string().contains("topP"), "{err}");
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let explicit = PathBuf::from("/tmp/explicit.json5");
        let env = env_from(&[(CONFIG_PATH_ENV, "/tmp/from-env.json5")]);
        assert_eq!(resolve_config_path(Some(explicit.as_path()), &env), (explicit, true));
        assert_eq!(
            resolve_config_path(None, &env),
            (PathBuf::from("/tmp/from-env.json5"), true)
        );
        let (path, required) = resolve_config_path(None, &env_from(&[]));
        assert_eq!(path, default_config_path());
        assert!(!required);
    }
}
