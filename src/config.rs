use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::controller::Capabilities;
use crate::error::ConfigError;
use crate::models::UserId;

const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NOTICE_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Recruiter,
    Candidate,
}

impl Role {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Role::Recruiter => Capabilities::recruiter(),
            Role::Candidate => Capabilities::candidate(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub user_id: UserId,
    pub role: Role,
    pub session_cookie: Option<String>,
    pub download_dir: PathBuf,
    pub timeout: Duration,
    pub notice_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let raw_url = get("INBOX_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            key: "INBOX_API_URL",
            reason: e.to_string(),
        })?;
        if api_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                key: "INBOX_API_URL",
                reason: "not a base URL".to_string(),
            });
        }

        let user_id = get("INBOX_USER_ID")
            .map(UserId::new)
            .ok_or(ConfigError::Missing("INBOX_USER_ID"))?;

        let role = match get("INBOX_ROLE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("candidate") | Some("interviewee") => Role::Candidate,
            Some("recruiter") => Role::Recruiter,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "INBOX_ROLE",
                    reason: format!("unknown role {}", other),
                })
            }
        };

        let timeout_secs = parse_number(get("INBOX_TIMEOUT_SECS"), "INBOX_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let notice_capacity = parse_number(
            get("INBOX_NOTICE_CAPACITY"),
            "INBOX_NOTICE_CAPACITY",
            DEFAULT_NOTICE_CAPACITY,
        )?;
        if notice_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "INBOX_NOTICE_CAPACITY",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Config {
            api_url,
            user_id,
            role,
            session_cookie: get("INBOX_SESSION_COOKIE"),
            download_dir: PathBuf::from(get("INBOX_DOWNLOAD_DIR").unwrap_or_else(|| DEFAULT_DOWNLOAD_DIR.to_string())),
            timeout: Duration::from_secs(timeout_secs),
            notice_capacity,
        })
    }
}

fn parse_number<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}
