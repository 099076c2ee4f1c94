use std::env;
use std::path::PathBuf;

use api::geocode::GeocoderConfig;
use user::MailerConfig;

/// Runtime configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Database, logs and uploads all live under this directory
    pub data_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_expire_days: i64,
    pub max_file_upload: u64,
    pub cookie_secure: bool,
    pub geocoder: GeocoderConfig,
    pub mailer: MailerConfig,
}

impl ServerConfig {
    /// Load configuration from the environment, reading `.env` first
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        // A missing secret is tolerable in development builds only
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if cfg!(debug_assertions) => "platter-dev-secret".to_string(),
            _ => return Err("JWT_SECRET must be set".into()),
        };

        let geocoder_defaults = GeocoderConfig::default();
        let geocoder = GeocoderConfig {
            base_url: env_or("GEOCODER_URL", &geocoder_defaults.base_url),
            user_agent: env_or("GEOCODER_USER_AGENT", &geocoder_defaults.user_agent),
        };

        let mailer_defaults = MailerConfig::default();
        let mailer = MailerConfig {
            smtp_host: env_or("SMTP_HOST", &mailer_defaults.smtp_host),
            smtp_port: env_parse("SMTP_PORT", mailer_defaults.smtp_port)?,
            smtp_username: env_or("SMTP_USERNAME", ""),
            smtp_password: env_or("SMTP_PASSWORD", ""),
            from_email: env_or("FROM_EMAIL", &mailer_defaults.from_email),
            from_name: env_or("FROM_NAME", &mailer_defaults.from_name),
            reset_base_url: env_or("RESET_BASE_URL", &mailer_defaults.reset_base_url),
        };

        Ok(Self {
            port: env_parse("PORT", 3000)?,
            data_path: PathBuf::from(env_or("DATA_PATH", "./data")),
            jwt_secret,
            jwt_expire_days: env_parse("JWT_EXPIRE_DAYS", 30)?,
            max_file_upload: env_parse("MAX_FILE_UPLOAD", 5_000_000)?,
            cookie_secure: env_parse("COOKIE_SECURE", false)?,
            geocoder,
            mailer,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, failing loudly on a malformed value
fn env_parse<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| format!("Invalid {} value '{}'", key, raw).into()),
        Err(_) => Ok(default),
    }
}
