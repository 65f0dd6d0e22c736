use std::path::PathBuf;

/// Secrets that ship in sample `.env` files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is unset or still a placeholder")]
    PlaceholderSecret(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    /// Base of signed media URLs handed to clients.
    pub public_url: String,
    pub media_secret: String,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        let secret = |name: &'static str| {
            let value = lookup(name).unwrap_or_default();
            if value.is_empty() || PLACEHOLDER_SECRETS.contains(&value.as_str()) {
                return Err(ConfigError::PlaceholderSecret(name));
            }
            Ok(value)
        };

        let port = var("BLOG_PORT", "12346");
        let port = port.parse::<u16>().map_err(|_| ConfigError::Invalid {
            name: "BLOG_PORT",
            value: port.clone(),
        })?;

        Ok(Self {
            host: var("BLOG_HOST", "0.0.0.0"),
            port,
            db_path: var("BLOG_DB_PATH", "blog.db").into(),
            media_dir: var("BLOG_MEDIA_DIR", "./media").into(),
            public_url: var("BLOG_PUBLIC_URL", "http://localhost:12346"),
            media_secret: secret("BLOG_MEDIA_SECRET")?,
            jwt_secret: secret("BLOG_JWT_SECRET")?,
        })
    }
}
