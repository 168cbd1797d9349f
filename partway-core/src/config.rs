//! Process configuration
//!
//! Everything is read from environment variables once at startup. Parsing
//! goes through a lookup function so tests never touch the real environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, UploadError};
use crate::notify::SnsConfig;
use crate::storage::s3::validate_key;
use crate::storage::{Credentials, S3Config};
use crate::upload::coordinator::{CoordinatorConfig, DEFAULT_EXPIRY_HOURS, DEFAULT_PART_SIZE};
use crate::upload::retry::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_RETRIES};

/// Everything needed to run one upload
#[derive(Debug, Clone)]
pub struct UploadJobConfig {
    /// Local file to upload
    pub file: PathBuf,
    /// Object store settings
    pub s3: S3Config,
    /// Notification topic, if any
    pub sns: Option<SnsConfig>,
    /// Key, part size, retry and expiry
    pub upload: CoordinatorConfig,
}

impl UploadJobConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bucket = var("S3_BUCKET").ok_or_else(|| missing("S3_BUCKET"))?;
        let file = PathBuf::from(var("UPLOAD_FILE").ok_or_else(|| missing("UPLOAD_FILE"))?);
        let region = var("S3_REGION")
            .or_else(|| var("AWS_REGION"))
            .unwrap_or_else(|| "us-east-1".into());
        let endpoint = var("S3_ENDPOINT")
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", region));

        let key = match var("UPLOAD_KEY") {
            Some(key) => key,
            None => default_key(&file)?,
        };
        validate_key(&key).map_err(|reason| UploadError::Config {
            message: format!("UPLOAD_KEY={:?} is invalid: {}", key, reason),
        })?;

        let credentials = match (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
                access_key_id,
                secret_access_key,
                session_token: var("AWS_SESSION_TOKEN"),
            }),
            (None, None) => None,
            _ => {
                return Err(UploadError::Config {
                    message: "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
                        .into(),
                })
            }
        };

        let part_size = parse_or(&var, "PART_SIZE", DEFAULT_PART_SIZE)?;
        let retries = parse_or(&var, "UPLOAD_RETRIES", DEFAULT_RETRIES)?;
        let backoff_secs = parse_or(&var, "RETRY_BACKOFF_SECS", DEFAULT_BACKOFF.as_secs())?;
        let expiry_hours = parse_or(&var, "UPLOAD_EXPIRY_HOURS", DEFAULT_EXPIRY_HOURS)?;
        if expiry_hours <= 0 {
            return Err(UploadError::Config {
                message: format!("UPLOAD_EXPIRY_HOURS must be positive, got {}", expiry_hours),
            });
        }
        let expiry = chrono::Duration::try_hours(expiry_hours).ok_or_else(|| UploadError::Config {
            message: format!("UPLOAD_EXPIRY_HOURS={} is out of range", expiry_hours),
        })?;

        let sns = var("SNS_TOPIC_ARN").map(|topic_arn| SnsConfig {
            endpoint: var("SNS_ENDPOINT")
                .unwrap_or_else(|| format!("https://sns.{}.amazonaws.com", region)),
            region: region.clone(),
            topic_arn,
            credentials: credentials.clone(),
            request_timeout_secs: 30,
        });

        Ok(Self {
            file,
            s3: S3Config {
                endpoint,
                bucket,
                region,
                credentials,
                ..Default::default()
            },
            sns,
            upload: CoordinatorConfig {
                key,
                part_size,
                retry: RetryPolicy::new(retries, Duration::from_secs(backoff_secs)),
                expiry,
            },
        })
    }
}

fn missing(name: &str) -> UploadError {
    UploadError::Config {
        message: format!("{} is not set", name),
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|e| UploadError::Config {
            message: format!("{}={:?} is invalid: {}", name, raw, e),
        }),
        None => Ok(default),
    }
}

fn default_key(file: &Path) -> Result<String> {
    file.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| UploadError::Config {
            message: format!("cannot derive an object key from {}", file.display()),
        })
}
