use anyhow::{Context, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Client configuration loaded from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            rust_log: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_url =
            std::env::var("CHARISMA_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        Ok(Config {
            api_url: normalize_api_url(&api_url)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()),
        })
    }

    /// Replaces the API origin, e.g. from a command-line flag.
    pub fn with_api_url(mut self, api_url: &str) -> Result<Self> {
        self.api_url = normalize_api_url(api_url)?;
        Ok(self)
    }
}

fn normalize_api_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed)
        .with_context(|| format!("CHARISMA_API_URL is not a valid URL: '{raw}'"))?;
    anyhow::ensure!(
        matches!(url.scheme(), "http" | "https"),
        "CHARISMA_API_URL must use http or https, got '{}'",
        url.scheme()
    );
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_dropped() {
        let config = Config::default().with_api_url("http://api.local:9000/").unwrap();
        assert_eq!(config.api_url, "http://api.local:9000");
    }

    #[test]
    fn rejects_non_http_origins() {
        assert!(Config::default().with_api_url("ftp://example.com").is_err());
        assert!(Config::default().with_api_url("not a url").is_err());
    }

    #[test]
    fn default_points_at_local_backend() {
        assert_eq!(Config::default().api_url, DEFAULT_API_URL);
    }
}
