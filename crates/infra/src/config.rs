//! Process configuration, read from the environment (and `.env` in
//! development).

use std::net::SocketAddr;

use chrono::Duration;

use crate::error::InfraError;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEV_JWT_SECRET: &str = "caretrack-dev-secret-change-me";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub tender_feed_url: Option<String>,
    /// `None` logs outbound mail instead of sending it.
    pub smtp: Option<SmtpConfig>,
    /// Base for links in outbound mail, without a trailing slash.
    pub public_base_url: String,
    /// Lower-cased addresses whose accounts hold the platform `superadmin` role.
    pub superadmin_emails: Vec<String>,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, InfraError> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InfraError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = get("CARETRACK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|e| InfraError::Config(format!("CARETRACK_BIND '{bind}': {e}")))?;

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET is not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let ttl_minutes = match get("TOKEN_TTL_MINUTES") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|m| *m > 0)
                .ok_or_else(|| InfraError::Config(format!("TOKEN_TTL_MINUTES '{raw}' must be a positive integer")))?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let port = match get("SMTP_PORT") {
                    Some(raw) => raw
                        .parse()
                        .map_err(|e| InfraError::Config(format!("SMTP_PORT '{raw}': {e}")))?,
                    None => DEFAULT_SMTP_PORT,
                };
                let from = get("SMTP_FROM")
                    .ok_or_else(|| InfraError::Config("SMTP_FROM is required when SMTP_HOST is set".into()))?;
                Some(SmtpConfig {
                    host,
                    port,
                    username: get("SMTP_USER"),
                    password: get("SMTP_PASSWORD"),
                    from,
                })
            }
            None => None,
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            jwt_secret,
            token_ttl: Duration::minutes(ttl_minutes),
            tender_feed_url: get("TENDER_FEED_URL"),
            smtp,
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            superadmin_emails: get("SUPERADMIN_EMAILS")
                .map(|raw| parse_email_list(&raw))
                .unwrap_or_default(),
        })
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, InfraError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn empty_environment_gives_a_development_config() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert!(cfg.database_url.is_none());
        assert!(cfg.smtp.is_none());
        assert_eq!(cfg.token_ttl, Duration::minutes(60));
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert!(cfg.superadmin_emails.is_empty());
    }

    #[test]
    fn superadmin_emails_are_a_comma_separated_list() {
        let cfg = load(&[("SUPERADMIN_EMAILS", " Ops@Caretrack.example, ,second@caretrack.example ")]).unwrap();
        assert_eq!(cfg.superadmin_emails, vec!["ops@caretrack.example", "second@caretrack.example"]);
    }

    #[test]
    fn values_are_read_and_validated() {
        let cfg = load(&[
            ("CARETRACK_BIND", "127.0.0.1:9000"),
            ("TOKEN_TTL_MINUTES", "15"),
            ("SMTP_HOST", "smtp.example.org"),
            ("SMTP_FROM", "noreply@example.org"),
            ("PUBLIC_BASE_URL", "https://care.example.org/"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.token_ttl, Duration::minutes(15));
        assert_eq!(cfg.smtp.unwrap().port, 587);
        assert_eq!(cfg.public_base_url, "https://care.example.org");

        assert!(load(&[("TOKEN_TTL_MINUTES", "0")]).is_err());
        assert!(load(&[("CARETRACK_BIND", "nope")]).is_err());
        assert!(load(&[("SMTP_HOST", "smtp.example.org")]).is_err());
    }
}
