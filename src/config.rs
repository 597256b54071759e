//! Hub configuration - assembled by the binary from flags, env and defaults

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_LAT: f64 = 41.0082;
pub const DEFAULT_LON: f64 = 28.9784;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DB_FILE: &str = "familyhub.sqlite";

/// Hub configuration. The binary (or a test) constructs this.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub app: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub http_timeout_secs: u64,
    pub google: GoogleConfig,
    pub weather: WeatherConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            app: "familyhub".into(),
            port: DEFAULT_PORT,
            data_dir: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            google: GoogleConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl HubConfig {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into(), ..Default::default() }
    }
    pub fn with_port(mut self, port: u16) -> Self { self.port = port; self }
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self { self.data_dir = Some(path.into()); self }
    pub fn with_http_timeout(mut self, secs: u64) -> Self { self.http_timeout_secs = secs; self }
    pub fn with_google(mut self, c: GoogleConfig) -> Self { self.google = c; self }
    pub fn with_weather(mut self, c: WeatherConfig) -> Self { self.weather = c; self }

    /// `<data dir>/familyhub.sqlite`; data dir falls back to `$FAMILYHUB_ROOT/<app>`
    /// then the OS local data dir.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            let root = std::env::var("FAMILYHUB_ROOT").map(PathBuf::from)
                .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")));
            root.join(&self.app)
        }).join(DB_FILE)
    }

    pub fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.http_timeout_secs))
            .build()
            .unwrap_or_default()
    }
}

/// Google Calendar OAuth client settings.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            redirect_uri: format!("http://localhost:{}/api/auth/google/callback", DEFAULT_PORT),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            api_base: "https://www.googleapis.com/calendar/v3".into(),
        }
    }
}

impl GoogleConfig {
    pub fn with_client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self.client_secret = Some(secret.into());
        self
    }
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self { self.refresh_token = Some(token.into()); self }
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self { self.redirect_uri = uri.into(); self }
    /// Point token and API endpoints at another host (local stub servers).
    pub fn with_endpoints(mut self, token_url: impl Into<String>, api_base: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.api_base = api_base.into();
        self
    }

    /// Client credentials, if both are set.
    pub fn client(&self) -> Option<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }
}

/// Open-Meteo forecast settings.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub api_url: String,
    pub default_lat: f64,
    pub default_lon: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { api_url: "https://api.open-meteo.com/v1/forecast".into(), default_lat: DEFAULT_LAT, default_lon: DEFAULT_LON }
    }
}

impl WeatherConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self { self.api_url = url.into(); self }
    pub fn with_location(mut self, lat: f64, lon: f64) -> Self { self.default_lat = lat; self.default_lon = lon; self }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_prefers_explicit_data_dir() {
        let cfg = HubConfig::new("kids").with_data_dir("/tmp/hub");
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/hub").join(DB_FILE));
    }

    #[test]
    fn google_client_requires_both_halves() {
        let cfg = GoogleConfig::default();
        assert!(cfg.client().is_none());
        let cfg = GoogleConfig { client_id: Some("id".into()), ..Default::default() };
        assert!(cfg.client().is_none());
        let cfg = GoogleConfig::default().with_client("id", "secret");
        assert_eq!(cfg.client(), Some(("id", "secret")));
    }
}
