use std::env;

use thiserror::Error;

/// OpenAI とパイプラインの設定値。環境変数から一度だけ読み込む。
///
/// データベース設定は含まない。サマリーモードは DB に一切触れないので、
/// 接続設定は [`DatabaseConfig`] として接続直前に別途読み込む。
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    openai_api_key: String,
    openai_model: String,
    openai_base_url: String,
    openai_temperature: f64,
    openai_max_tokens: u32,
    max_prompt_tokens: usize,
    codebook_path: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数からワーカーの設定値を読み込み、検証する。
    ///
    /// # Errors
    /// 必須の環境変数が未設定、もしくは数値／真偽値のパースに失敗した場合は
    /// [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key = env_var("OPENAI_API_KEY")?;
        let openai_model =
            env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let openai_base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let openai_temperature = parse_f64("OPENAI_TEMPERATURE", 0.2)?;
        let openai_max_tokens = parse_u32("OPENAI_MAX_TOKENS", 500)?;
        let max_prompt_tokens = parse_usize("MAX_PROMPT_TOKENS", 10_000)?;
        let codebook_path = env::var("CODEBOOK_PATH")
            .unwrap_or_else(|_| "standardized_codebook.json".to_string());

        Ok(Self {
            openai_api_key,
            openai_model,
            openai_base_url,
            openai_temperature,
            openai_max_tokens,
            max_prompt_tokens,
            codebook_path,
        })
    }

    #[must_use]
    pub fn openai_api_key(&self) -> &str {
        &self.openai_api_key
    }

    #[must_use]
    pub fn openai_model(&self) -> &str {
        &self.openai_model
    }

    #[must_use]
    pub fn openai_base_url(&self) -> &str {
        &self.openai_base_url
    }

    #[must_use]
    pub fn openai_temperature(&self) -> f64 {
        self.openai_temperature
    }

    #[must_use]
    pub fn openai_max_tokens(&self) -> u32 {
        self.openai_max_tokens
    }

    #[must_use]
    pub fn max_prompt_tokens(&self) -> usize {
        self.max_prompt_tokens
    }

    #[must_use]
    pub fn codebook_path(&self) -> &str {
        &self.codebook_path
    }
}

/// Postgres 接続設定。オープンコーディング（Mode B）だけが必要とする。
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    host: String,
    port: u16,
    name: String,
    user: String,
    password: String,
    ssl: bool,
}

impl DatabaseConfig {
    /// 環境変数からデータベース接続設定を読み込む。
    ///
    /// # Errors
    /// 必須の環境変数が未設定、もしくはパースに失敗した場合は
    /// [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_var("DB_HOST")?,
            port: parse_u16("DB_PORT", 5432)?,
            name: env_var("DB_NAME")?,
            user: env_var("DB_USER")?,
            password: env_var("DB_PW")?,
            ssl: parse_bool("DB_SSL", false)?,
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn ssl(&self) -> bool {
        self.ssl
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_u16(name: &'static str, default: u16) -> Result<u16, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u16>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));
