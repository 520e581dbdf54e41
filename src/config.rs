use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingKeys(Vec<String>),
}

/// Validated process configuration. Built once at startup; a missing required
/// key aborts with the full list of missing names rather than failing on the
/// first lookup at call time.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: OpenAiSettings,
    pub ebay: EbaySettings,
    pub storage: StorageSettings,
    pub analysis_timeout_secs: u64,
    pub field_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub vision_model: String,
    pub text_model: String,
}

#[derive(Debug, Clone)]
pub struct EbaySettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub sandbox: bool,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut required = |key: &str| match lookup(key) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(key.to_string());
                String::new()
            }
        };

        let openai = OpenAiSettings {
            api_key: required("OPENAI_API_KEY"),
            base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            vision_model: lookup("OPENAI_VISION_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            text_model: lookup("OPENAI_TEXT_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
        };

        let ebay = EbaySettings {
            client_id: required("EBAY_CLIENT_ID"),
            client_secret: required("EBAY_CLIENT_SECRET"),
            redirect_uri: required("EBAY_REDIRECT_URI"),
            sandbox: lookup("EBAY_SANDBOX")
                .map(|value| parse_bool(&value))
                .unwrap_or(true),
        };

        let storage = StorageSettings {
            access_key_id: required("AWS_ACCESS_KEY_ID"),
            secret_access_key: required("AWS_SECRET_ACCESS_KEY"),
            region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            bucket: required("S3_BUCKET_NAME"),
        };

        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        Ok(Self {
            openai,
            ebay,
            storage,
            analysis_timeout_secs: parse_u64(&lookup, "ANALYSIS_TIMEOUT_SECS").unwrap_or(60),
            field_timeout_secs: parse_u64(&lookup, "FIELD_TIMEOUT_SECS").unwrap_or(30),
        })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    lookup(key)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("EBAY_CLIENT_ID", "client"),
            ("EBAY_CLIENT_SECRET", "secret"),
            ("EBAY_REDIRECT_URI", "https://example.com/callback"),
            ("AWS_ACCESS_KEY_ID", "AKIA_TEST"),
            ("AWS_SECRET_ACCESS_KEY", "aws-secret"),
            ("S3_BUCKET_NAME", "snaplist-images"),
        ])
    }

    fn lookup_from(env: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| env.get(key).map(|value| value.to_string())
    }

    #[test]
    fn full_environment_loads_with_defaults() {
        let config = AppConfig::from_lookup(lookup_from(full_env())).expect("config");
        assert!(config.ebay.sandbox);
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.openai.base_url, "https://api.openai.com");
        assert_eq!(config.analysis_timeout_secs, 60);
        assert_eq!(config.field_timeout_secs, 30);
    }

    #[test]
    fn missing_keys_are_enumerated() {
        let mut env = full_env();
        env.remove("OPENAI_API_KEY");
        env.remove("S3_BUCKET_NAME");
        let err = AppConfig::from_lookup(lookup_from(env)).expect_err("should fail");
        let ConfigError::MissingKeys(keys) = err;
        assert_eq!(keys, vec!["OPENAI_API_KEY", "S3_BUCKET_NAME"]);
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut env = full_env();
        env.insert("EBAY_CLIENT_SECRET", "   ");
        let err = AppConfig::from_lookup(lookup_from(env)).expect_err("should fail");
        let ConfigError::MissingKeys(keys) = err;
        assert_eq!(keys, vec!["EBAY_CLIENT_SECRET"]);
    }

    #[test]
    fn sandbox_flag_parses_common_forms() {
        for (raw, expected) in [("true", true), ("1", true), ("false", false), ("no", false)] {
            let mut env = full_env();
            env.insert("EBAY_SANDBOX", raw);
            let config = AppConfig::from_lookup(lookup_from(env)).expect("config");
            assert_eq!(config.ebay.sandbox, expected, "raw {raw}");
        }
    }
}
