use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an automotive expert. Analyze the spark plug image and provide a short diagnosis.";
pub const DEFAULT_USER_PROMPT: &str = "Analyze this spark plug image.";

/// Instruction text sent alongside every photo.
#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Default for Prompt {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            user: DEFAULT_USER_PROMPT.to_string(),
        }
    }
}

/// Process-wide relay settings, read once at startup and never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Credential for the vision model. Analyses fail while it is unset.
    pub api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub prompt: Prompt,
    /// Optional request body cap. `None` disables the limit entirely.
    pub max_upload_bytes: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            prompt: Prompt::default(),
            max_upload_bytes: None,
        }
    }
}

impl RelayConfig {
    /// Loads the configuration from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_overrides(|_| None)
    }

    /// Same as [`RelayConfig::from_env`], but values returned by `overrides`
    /// take precedence over the environment.
    pub fn from_env_with_overrides<F>(overrides: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| overrides(key).or_else(|| std::env::var(key).ok()))
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let require_port = var("RELAY_REQUIRE_PORT").is_some_and(|value| is_truthy(&value));
        let port = match var("PORT") {
            Some(value) => parse_number("PORT", &value)?,
            None if require_port => return Err(ConfigError::MissingPort),
            None => defaults.port,
        };

        let max_upload_bytes = var("RELAY_MAX_UPLOAD_BYTES")
            .map(|value| parse_number("RELAY_MAX_UPLOAD_BYTES", &value))
            .transpose()?;

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            prompt: Prompt {
                system: var("SPARKPLUG_SYSTEM_PROMPT").unwrap_or(defaults.prompt.system),
                user: var("SPARKPLUG_USER_PROMPT").unwrap_or(defaults.prompt.user),
            },
            max_upload_bytes,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        })
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
