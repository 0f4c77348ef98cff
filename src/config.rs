//! Runtime settings from `CERTISSUE_*` environment variables.

use log::{info, warn};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CertissueError, Result};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database: PathBuf,
    pub media_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub layouts: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub font_size: u32,
    /// Root of the public site, used in verification links
    pub verify_base: String,
    pub id_prefix: String,
    pub admin_token: Option<String>,
    pub organization: String,
    pub mail_from: String,
    /// `None` spools mails to `outbox_dir`
    pub smtp: Option<SmtpConfig>,
    pub outbox_dir: PathBuf,
    pub upload_dir: Option<PathBuf>,
    pub upload_url: Option<String>,
    pub upload_token: Option<String>,
    pub auto_upload: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let media_dir = PathBuf::from(try_load(&get, "CERTISSUE_MEDIA_DIR", "media".to_string())?);
        let templates_dir = get("CERTISSUE_TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| media_dir.join("templates"));
        let outbox_dir = get("CERTISSUE_OUTBOX_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| media_dir.join("outbox"));

        let smtp = match get("CERTISSUE_SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: try_load(&get, "CERTISSUE_SMTP_PORT", 587)?,
                user: get("CERTISSUE_SMTP_USER"),
                password: get("CERTISSUE_SMTP_PASSWORD"),
            }),
            None => {
                info!("CERTISSUE_SMTP_HOST not set, mails go to {}", outbox_dir.display());
                None
            }
        };

        let admin_token = get("CERTISSUE_ADMIN_TOKEN");
        if admin_token.is_none() {
            warn!("CERTISSUE_ADMIN_TOKEN not set, admin routes are open");
        }

        let config = Self {
            port: try_load(&get, "CERTISSUE_PORT", 8080)?,
            database: PathBuf::from(try_load(&get, "CERTISSUE_DATABASE", "certissue.db".to_string())?),
            templates_dir,
            layouts: get("CERTISSUE_LAYOUTS").map(PathBuf::from),
            font_path: get("CERTISSUE_FONT_PATH").map(PathBuf::from),
            font_size: try_load(&get, "CERTISSUE_FONT_SIZE", 22)?,
            verify_base: try_load(&get, "CERTISSUE_VERIFY_BASE", "http://localhost:8080".to_string())?
                .trim_end_matches('/')
                .to_string(),
            id_prefix: try_load(&get, "CERTISSUE_ID_PREFIX", "CERT-".to_string())?,
            admin_token,
            organization: try_load(
                &get,
                "CERTISSUE_ORGANIZATION",
                "Certificate Management Team".to_string(),
            )?,
            mail_from: try_load(&get, "CERTISSUE_MAIL_FROM", "certificates@localhost".to_string())?,
            smtp,
            outbox_dir,
            upload_dir: get("CERTISSUE_UPLOAD_DIR").map(PathBuf::from),
            upload_url: get("CERTISSUE_UPLOAD_URL"),
            upload_token: get("CERTISSUE_UPLOAD_TOKEN"),
            auto_upload: try_load(&get, "CERTISSUE_AUTO_UPLOAD", false)?,
            media_dir,
        };

        if config.font_size == 0 {
            return Err(CertissueError::Config("CERTISSUE_FONT_SIZE must be positive".to_string()));
        }
        if config.id_prefix.len() + 8 > crate::record::MAX_ID_LEN {
            return Err(CertissueError::Config(format!(
                "CERTISSUE_ID_PREFIX '{}' is too long",
                config.id_prefix
            )));
        }
        Ok(config)
    }
}

fn try_load<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| CertissueError::Config(format!("Invalid {} value '{}': {}", key, raw, e))),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.database, PathBuf::from("certissue.db"));
        assert_eq!(c.templates_dir, PathBuf::from("media/templates"));
        assert_eq!(c.outbox_dir, PathBuf::from("media/outbox"));
        assert_eq!(c.id_prefix, "CERT-");
        assert_eq!(c.verify_base, "http://localhost:8080");
        assert!(c.smtp.is_none());
        assert!(!c.auto_upload);
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("CERTISSUE_MEDIA_DIR", "/srv/media"),
            ("CERTISSUE_VERIFY_BASE", "https://verify.example.org/"),
            ("CERTISSUE_SMTP_HOST", "smtp.example.org"),
            ("CERTISSUE_AUTO_UPLOAD", "true"),
            ("CERTISSUE_ADMIN_TOKEN", " secret "),
        ])
        .unwrap();
        assert_eq!(c.templates_dir, PathBuf::from("/srv/media/templates"));
        assert_eq!(c.verify_base, "https://verify.example.org");
        assert_eq!(c.smtp.unwrap().port, 587);
        assert!(c.auto_upload);
        assert_eq!(c.admin_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(config(&[("CERTISSUE_PORT", "eighty")]).is_err());
        assert!(config(&[("CERTISSUE_FONT_SIZE", "0")]).is_err());
        assert!(config(&[("CERTISSUE_ID_PREFIX", "MUCH-TOO-LONG-")]).is_err());
    }
}
