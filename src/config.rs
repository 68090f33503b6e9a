use std::env;
use std::fmt;
use std::str::FromStr;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 60;
const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 7;

/// Runtime settings, read once from the environment (and `.env`) at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub s3_bucket: String,
    pub aws_region: Option<String>,
    /// Custom endpoint for S3-compatible stores such as MinIO.
    pub s3_endpoint: Option<String>,
    pub presign_expiry_secs: u64,
    pub max_upload_bytes: usize,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid(key, reason) => write!(f, "{} is invalid: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("JWT_SECRET", "cannot be empty".to_string()));
        }

        let s3_endpoint = optional("S3_ENDPOINT");
        if let Some(endpoint) = &s3_endpoint {
            url::Url::parse(endpoint)
                .map_err(|err| ConfigError::Invalid("S3_ENDPOINT", err.to_string()))?;
        }

        Ok(Self {
            bind_address: optional("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            database_url: required("DATABASE_URL")?,
            jwt_secret,
            s3_bucket: required("AWS_S3_BUCKET")?,
            aws_region: optional("AWS_REGION"),
            s3_endpoint,
            presign_expiry_secs: parsed("PRESIGN_EXPIRY_SECS", DEFAULT_PRESIGN_EXPIRY_SECS)?,
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            access_token_minutes: parsed("ACCESS_TOKEN_MINUTES", DEFAULT_ACCESS_TOKEN_MINUTES)?,
            refresh_token_days: parsed("REFRESH_TOKEN_DAYS", DEFAULT_REFRESH_TOKEN_DAYS)?,
        })
    }

    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err: T::Err| ConfigError::Invalid(key, err.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            database_url: "postgres://localhost/edushare_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            s3_bucket: "edushare-test".to_string(),
            aws_region: None,
            s3_endpoint: None,
            presign_expiry_secs: DEFAULT_PRESIGN_EXPIRY_SECS,
            max_upload_bytes: 1024 * 1024,
            access_token_minutes: DEFAULT_ACCESS_TOKEN_MINUTES,
            refresh_token_days: DEFAULT_REFRESH_TOKEN_DAYS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_to_default_when_unset() {
        let value: u64 = parsed("EDUSHARE_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parsed_rejects_garbage() {
        env::set_var("EDUSHARE_TEST_GARBAGE_KEY", "not-a-number");
        let result: Result<u64, _> = parsed("EDUSHARE_TEST_GARBAGE_KEY", 1);
        assert!(matches!(result, Err(ConfigError::Invalid("EDUSHARE_TEST_GARBAGE_KEY", _))));
    }
}
