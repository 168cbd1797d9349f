//! S3-compatible storage client
//!
//! Async multipart operations over the S3 REST API using reqwest, with
//! path-style addressing and optional SigV4 signing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Url};
use std::time::Duration;
use tracing::debug;

use super::sigv4::{self, Credentials, RequestToSign, Signer};
use super::store::{CompletedPart, ObjectStore, UploadSession};
use crate::error::{Result, UploadError};

/// Configuration for S3 client
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 endpoint URL
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Credentials; requests are unsigned when absent
    pub credentials: Option<Credentials>,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "https://s3.us-east-1.amazonaws.com".into(),
            bucket: "partway".into(),
            region: "us-east-1".into(),
            credentials: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
        }
    }
}

/// S3-compatible storage client using reqwest
pub struct S3Client {
    client: Client,
    config: S3Config,
    signer: Option<Signer>,
}

impl S3Client {
    /// Create a new S3 client
    pub fn new(config: S3Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| UploadError::Storage {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let signer = config
            .credentials
            .clone()
            .map(|creds| Signer::new(creds, config.region.clone(), "s3"));

        Ok(Self {
            client,
            config,
            signer,
        })
    }

    /// Get bucket name
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Encoded path-style object path
    fn object_path(&self, key: &str) -> String {
        format!(
            "/{}/{}",
            sigv4::uri_encode(&self.config.bucket, true),
            sigv4::uri_encode(key, false)
        )
    }

    /// Build URL for an object and sub-resource query
    fn object_url(&self, key: &str, query: &str) -> Result<Url> {
        validate_key(key).map_err(|reason| UploadError::Storage {
            message: format!("Invalid object key {:?}: {}", key, reason),
        })?;
        let mut url = format!(
            "{}{}",
            self.config.endpoint.trim_end_matches('/'),
            self.object_path(key)
        );
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        Url::parse(&url).map_err(|e| UploadError::Storage {
            message: format!("Invalid object URL {}: {}", url, e),
        })
    }

    /// Send one request, signing it when credentials are configured
    async fn send(
        &self,
        method: Method,
        key: &str,
        params: &[(&str, &str)],
        headers: &[(&str, String)],
        body: Bytes,
    ) -> Result<reqwest::Response> {
        let query = sigv4::canonical_query(params);
        let url = self.object_url(key, &query)?;

        let mut request = self.client.request(method.clone(), url.clone());
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        if let Some(signer) = &self.signer {
            let host = match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                (None, _) => {
                    return Err(UploadError::Storage {
                        message: format!("Endpoint has no host: {}", self.config.endpoint),
                    })
                }
            };
            let payload_hash = sigv4::sha256_hex(&body);
            let path = self.object_path(key);
            let to_sign = RequestToSign {
                method: method.as_str(),
                host: &host,
                path: &path,
                query: &query,
                payload_hash: &payload_hash,
                headers: &[],
            };
            for (name, value) in signer.sign(&to_sign, Utc::now())? {
                request = request.header(name, value);
            }
        }

        request
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Storage {
                message: format!("{} {} failed: {}", method, key, e),
            })
    }

    /// Turn a non-success response into a storage error
    async fn status_error(operation: &str, key: &str, resp: reqwest::Response) -> UploadError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        UploadError::Storage {
            message: format!("{} failed for {}: status {} {}", operation, key, status, detail)
                .trim_end()
                .to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn create_upload(&self, key: &str, expires_at: DateTime<Utc>) -> Result<UploadSession> {
        let expires = expires_at.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let resp = self
            .send(
                Method::POST,
                key,
                &[("uploads", "")],
                &[("expires", expires)],
                Bytes::new(),
            )
            .await?;

        if !resp.status().is_success() {
            return Err(Self::status_error("CreateMultipartUpload", key, resp).await);
        }

        let body = resp.text().await.map_err(|e| UploadError::Storage {
            message: format!("Failed to read create response for {}: {}", key, e),
        })?;
        let upload_id = parse_upload_id(key, &body)?;

        debug!("Created multipart upload {} for {}", upload_id, key);
        Ok(UploadSession {
            bucket: self.config.bucket.clone(),
            key: key.to_string(),
            upload_id,
            expires_at,
        })
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        part_number: u32,
        body: Bytes,
    ) -> Result<String> {
        let part = part_number.to_string();
        let resp = self
            .send(
                Method::PUT,
                &session.key,
                &[("partNumber", part.as_str()), ("uploadId", session.upload_id.as_str())],
                &[],
                body,
            )
            .await?;

        if !resp.status().is_success() {
            return Err(Self::status_error("UploadPart", &session.key, resp).await);
        }

        let etag = resp
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| UploadError::Storage {
                message: format!("UploadPart {} for {} returned no ETag", part_number, session.key),
            })?;

        debug!("Part {} of {} stored, etag={}", part_number, session.key, etag);
        Ok(etag)
    }

    async fn complete_upload(
        &self,
        session: &UploadSession,
        parts: &[CompletedPart],
    ) -> Result<String> {
        let resp = self
            .send(
                Method::POST,
                &session.key,
                &[("uploadId", session.upload_id.as_str())],
                &[("content-type", "application/xml".to_string())],
                Bytes::from(complete_body(parts)),
            )
            .await?;

        if !resp.status().is_success() {
            return Err(Self::status_error("CompleteMultipartUpload", &session.key, resp).await);
        }

        let body = resp.text().await.map_err(|e| UploadError::Storage {
            message: format!("Failed to read complete response for {}: {}", session.key, e),
        })?;
        let location = match parse_complete_response(&session.key, &body)? {
            Some(location) => location,
            None => self.object_url(&session.key, "")?.to_string(),
        };
        Ok(location)
    }

    async fn abort_upload(&self, session: &UploadSession) -> Result<()> {
        let resp = self
            .send(
                Method::DELETE,
                &session.key,
                &[("uploadId", session.upload_id.as_str())],
                &[],
                Bytes::new(),
            )
            .await?;

        if !resp.status().is_success() {
            return Err(Self::status_error("AbortMultipartUpload", &session.key, resp).await);
        }

        debug!("Aborted multipart upload {}", session.upload_id);
        Ok(())
    }
}

/// Check that a key maps to exactly one request path
///
/// URL parsing collapses `.` and `..` segments, so such keys would be sent
/// to a different path than the one that is signed.
pub fn validate_key(key: &str) -> std::result::Result<(), &'static str> {
    if key.is_empty() {
        return Err("key is empty");
    }
    if key.split('/').any(|segment| segment == "." || segment == "..") {
        return Err("key contains a '.' or '..' path segment");
    }
    Ok(())
}

/// `Code: Message` from an S3 error document, empty when there is none
fn error_detail(body: &str) -> String {
    match (xml_value(body, "Code"), xml_value(body, "Message")) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code,
        _ => String::new(),
    }
}

/// Upload id from an InitiateMultipartUploadResult document
fn parse_upload_id(key: &str, body: &str) -> Result<String> {
    xml_value(body, "UploadId")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| UploadError::Storage {
            message: format!("CreateMultipartUpload response for {} has no UploadId", key),
        })
}

/// Location from a CompleteMultipartUploadResult document
///
/// S3 may report a failed completion inside a 200 response, so an `<Error>`
/// body is an error here.
fn parse_complete_response(key: &str, body: &str) -> Result<Option<String>> {
    if body.contains("<Error>") {
        let detail = match error_detail(body) {
            detail if detail.is_empty() => body.to_string(),
            detail => detail,
        };
        return Err(UploadError::Storage {
            message: format!("CompleteMultipartUpload failed for {}: {}", key, detail),
        });
    }
    Ok(xml_value(body, "Location"))
}

/// Build the CompleteMultipartUpload document
fn complete_body(parts: &[CompletedPart]) -> String {
    let mut xml = String::from("<CompleteMultipartUpload>");
    for part in parts {
        xml.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>",
            part.part_number,
            xml_escape(&part.etag)
        ));
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// Extract the text of the first `<tag>` element (simplified, no nesting)
fn xml_value(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(xml_unescape(&body[start..end]))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
