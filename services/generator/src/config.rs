use crate::consumer::PersistFailurePolicy;
use secrecy::SecretString;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported text-generation backends. Both are reached through
/// an OpenAI-compatible chat completion endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

impl Provider {
    pub fn default_api_base(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1/",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// Broker session parameters.
#[derive(Debug)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub security_protocol: String,
    pub sasl_mechanism: String,
    pub ssl_verify: bool,
    pub auto_offset_reset: String,
    pub fetch_max_bytes: u32,
}

impl KafkaSettings {
    pub fn uses_sasl(&self) -> bool {
        self.security_protocol.to_uppercase().starts_with("SASL")
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub kafka: KafkaSettings,
    pub provider: Provider,
    pub openai_api_key: Option<SecretString>,
    pub gemini_api_key: Option<SecretString>,
    pub api_base: Option<String>,
    pub chat_model: String,
    pub temperature: f32,
    pub max_attempts: u32,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
    pub prompts_path: Option<PathBuf>,
    pub on_persist_failure: PersistFailurePolicy,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = var_or(name, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{raw}': {e}")))
}

fn secret_var(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let kafka = KafkaSettings {
            brokers: var_or("KAFKA_BROKERS", "localhost:9092"),
            topic: var_or("KAFKA_TOPIC", "course_topics"),
            group_id: var_or("KAFKA_CONSUMER_GROUP", "course_generator_group"),
            username: std::env::var("KAFKA_USERNAME").ok().filter(|v| !v.is_empty()),
            password: secret_var("KAFKA_PASSWORD"),
            security_protocol: var_or("KAFKA_SECURITY_PROTOCOL", "SASL_SSL"),
            sasl_mechanism: var_or("KAFKA_SASL_MECHANISM", "SCRAM-SHA-512"),
            ssl_verify: parse_var("KAFKA_SSL_VERIFY", "true")?,
            auto_offset_reset: var_or("KAFKA_AUTO_OFFSET_RESET", "latest"),
            fetch_max_bytes: parse_var("KAFKA_FETCH_MAX_BYTES", "1048576")?,
        };

        if kafka.uses_sasl() {
            if kafka.username.is_none() {
                return Err(ConfigError::MissingVar(format!(
                    "KAFKA_USERNAME must be set for security protocol '{}'",
                    kafka.security_protocol
                )));
            }
            if kafka.password.is_none() {
                return Err(ConfigError::MissingVar(format!(
                    "KAFKA_PASSWORD must be set for security protocol '{}'",
                    kafka.security_protocol
                )));
            }
        }

        let provider_str = var_or("LLM_PROVIDER", "openai");
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{other}' is not one of 'openai', 'gemini'"),
                ));
            }
        };

        let openai_api_key = secret_var("OPENAI_API_KEY");
        let gemini_api_key = secret_var("GEMINI_API_KEY");

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
        }

        let max_attempts: u32 = parse_var("GENERATION_MAX_ATTEMPTS", "3")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "GENERATION_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let on_persist_failure = match var_or("ON_PERSIST_FAILURE", "commit")
            .to_lowercase()
            .as_str()
        {
            "commit" => PersistFailurePolicy::Commit,
            "halt" => PersistFailurePolicy::Halt,
            other => {
                return Err(ConfigError::InvalidValue(
                    "ON_PERSIST_FAILURE".to_string(),
                    format!("'{other}' is not one of 'commit', 'halt'"),
                ));
            }
        };

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            kafka,
            provider,
            openai_api_key,
            gemini_api_key,
            api_base: std::env::var("LLM_API_BASE").ok().filter(|v| !v.is_empty()),
            chat_model: var_or("CHAT_MODEL", "gpt-4"),
            temperature: parse_var("LLM_TEMPERATURE", "0.7")?,
            max_attempts,
            request_timeout: Duration::from_secs(parse_var("GENERATION_TIMEOUT_SECS", "120")?),
            output_dir: PathBuf::from(var_or("OUTPUT_DIR", "generated_courses")),
            prompts_path: std::env::var("PROMPTS_PATH").ok().map(PathBuf::from),
            on_persist_failure,
            log_level,
        })
    }

    /// The API key for the configured provider.
    pub fn api_key(&self) -> Option<&SecretString> {
        match self.provider {
            Provider::OpenAI => self.openai_api_key.as_ref(),
            Provider::Gemini => self.gemini_api_key.as_ref(),
        }
    }

    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_base())
    }
}
