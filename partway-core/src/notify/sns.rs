//! SNS notification client
//!
//! Publishes through the SNS query API with a form-encoded POST.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

use super::NotificationClient;
use crate::error::{Result, UploadError};
use crate::storage::sigv4::{self, Credentials, RequestToSign, Signer};

const SNS_API_VERSION: &str = "2010-03-31";

/// Configuration for the SNS client
#[derive(Debug, Clone)]
pub struct SnsConfig {
    /// SNS endpoint URL
    pub endpoint: String,
    /// AWS region
    pub region: String,
    /// Topic to publish to
    pub topic_arn: String,
    /// Credentials; requests are unsigned when absent
    pub credentials: Option<Credentials>,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// SNS client publishing to a single topic
pub struct SnsClient {
    client: Client,
    endpoint: Url,
    topic_arn: String,
    signer: Option<Signer>,
}

impl SnsClient {
    /// Create a new SNS client
    pub fn new(config: SnsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| UploadError::Notification {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let endpoint = Url::parse(&config.endpoint).map_err(|e| UploadError::Config {
            message: format!("Invalid SNS endpoint {}: {}", config.endpoint, e),
        })?;

        let signer = config
            .credentials
            .map(|creds| Signer::new(creds, config.region.clone(), "sns"));

        Ok(Self {
            client,
            endpoint,
            topic_arn: config.topic_arn,
            signer,
        })
    }

    /// Topic notifications are published to
    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    fn publish_body(&self, subject: &str, message: &str) -> String {
        sigv4::canonical_query(&[
            ("Action", "Publish"),
            ("Message", message),
            ("Subject", subject),
            ("TopicArn", &self.topic_arn),
            ("Version", SNS_API_VERSION),
        ])
    }
}

#[async_trait]
impl NotificationClient for SnsClient {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        let body = Bytes::from(self.publish_body(subject, message));

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", "application/x-www-form-urlencoded; charset=utf-8");

        if let Some(signer) = &self.signer {
            let host = match (self.endpoint.host_str(), self.endpoint.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                (None, _) => {
                    return Err(UploadError::Notification {
                        message: format!("SNS endpoint has no host: {}", self.endpoint),
                    })
                }
            };
            let payload_hash = sigv4::sha256_hex(&body);
            let to_sign = RequestToSign {
                method: "POST",
                host: &host,
                path: self.endpoint.path(),
                query: "",
                payload_hash: &payload_hash,
                headers: &[],
            };
            for (name, value) in signer.sign(&to_sign, Utc::now())? {
                request = request.header(name, value);
            }
        }

        let resp = request
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Notification {
                message: format!("Publish to {} failed: {}", self.topic_arn, e),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(UploadError::Notification {
                message: format!("Publish to {} failed: status {} {}", self.topic_arn, status, text),
            });
        }

        debug!("Published '{}' to {}", subject, self.topic_arn);
        Ok(())
    }
}
