use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::UserId, errors::Error, Result};

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub admin_id: UserId,

    // Registry
    pub users_file: PathBuf,

    // Broadcast
    pub delivery_timeout: Duration,
}

/// Merge `.env` from the working directory into the process environment.
/// Existing variables win; a missing file is fine.
///
/// Call this before `logging::init` so `RUST_LOG` from `.env` applies.
pub fn load_dotenv() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(Error::Config(format!("failed to read .env: {e}"))),
    }
}

/// Like [`load_dotenv`] for an explicit file. Returns `false` when the file
/// does not exist.
pub fn load_dotenv_from(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(Error::Config(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

impl Config {
    /// Load from the process environment. Run [`load_dotenv`] first.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Required
        let bot_token = get("BOT_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("BOT_TOKEN environment variable is required".to_string())
        })?;

        let admin_raw = get("ADMIN_ID").and_then(non_empty).ok_or_else(|| {
            Error::Config("ADMIN_ID environment variable is required".to_string())
        })?;
        let admin_id = match admin_raw.trim().parse::<i64>() {
            Ok(0) => {
                return Err(Error::Config(
                    "ADMIN_ID must be a non-zero Telegram user id".to_string(),
                ))
            }
            Ok(id) => UserId(id),
            Err(_) => {
                return Err(Error::Config(format!(
                    "ADMIN_ID must be an integer, got {admin_raw:?}"
                )))
            }
        };

        // Optional
        let users_file = get("USERS_FILE")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("users.txt"));
        let delivery_timeout = Duration::from_millis(
            get("DELIVERY_TIMEOUT_MS")
                .as_deref()
                .and_then(parse_u64)
                .unwrap_or(10_000),
        );

        Ok(Self {
            bot_token,
            admin_id,
            users_file,
            delivery_timeout,
        })
    }
}

fn parse_u64(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_required_and_defaults() {
        let cfg = Config::from_lookup(lookup(&[("BOT_TOKEN", "123:abc"), ("ADMIN_ID", "777")]))
            .unwrap();
        assert_eq!(cfg.bot_token, "123:abc");
        assert_eq!(cfg.admin_id, UserId(777));
        assert_eq!(cfg.users_file, PathBuf::from("users.txt"));
        assert_eq!(cfg.delivery_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_optional_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("ADMIN_ID", " 5 "),
            ("USERS_FILE", "/var/lib/qrcast/users.txt"),
            ("DELIVERY_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(cfg.admin_id, UserId(5));
        assert_eq!(
            cfg.users_file,
            PathBuf::from("/var/lib/qrcast/users.txt")
        );
        assert_eq!(cfg.delivery_timeout, Duration::from_millis(250));
    }

    #[test]
    fn missing_token_is_config_error() {
        let err = Config::from_lookup(lookup(&[("ADMIN_ID", "1")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("BOT_TOKEN")));

        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "  "), ("ADMIN_ID", "1")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("BOT_TOKEN")));
    }

    #[test]
    fn dotenv_file_fills_env_without_overriding() {
        let pid = std::process::id();
        let path = PathBuf::from(format!("/tmp/qrcast-dotenv-{pid}.env"));
        let fresh = format!("QRCAST_TEST_FRESH_{pid}");
        let preset = format!("QRCAST_TEST_PRESET_{pid}");
        std::fs::write(&path, format!("{fresh}=qrcast=debug\n{preset}=from-file\n")).unwrap();
        env::set_var(&preset, "from-env");

        assert!(load_dotenv_from(&path).unwrap());

        assert_eq!(env::var(&fresh).unwrap(), "qrcast=debug");
        assert_eq!(env::var(&preset).unwrap(), "from-env");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_dotenv_file_is_not_an_error() {
        let path = PathBuf::from(format!("/tmp/qrcast-no-such-{}.env", std::process::id()));
        assert!(!load_dotenv_from(&path).unwrap());
    }

    #[test]
    fn missing_or_invalid_admin_is_config_error() {
        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("ADMIN_ID")));

        let err =
            Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_ID", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("non-zero")));

        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_ID", "admin")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("integer")));
    }
}
