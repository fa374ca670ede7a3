//! AWS SQS transport using the HTTP query API.
//!
//! This module talks to SQS with direct HTTP calls instead of the AWS SDK, so
//! tests can run against a mocked HTTP server.
//!
//! ## Requests
//!
//! Every call is a `POST /` with a form-encoded body holding `Action`,
//! `Version` and the flattened request arguments, e.g.
//!
//! ```text
//! Action=SendMessage&Version=2012-11-05&QueueUrl=...&MessageBody=...
//! &MessageAttribute.1.Name=Headers
//! &MessageAttribute.1.Value.DataType=String
//! &MessageAttribute.1.Value.StringValue=[{...},{...}]
//! ```
//!
//! Batch entries use the `SendMessageBatchRequestEntry.{n}.` prefix.
//!
//! ## Authentication
//!
//! Requests are signed with AWS Signature Version 4 using the static
//! credentials from [`SqsConnectionConfig`]. A session token, when present, is
//! sent and signed as `x-amz-security-token`.
//!
//! ## Routing
//!
//! The region of a call is the per-call override carried by the request
//! arguments, then the configured region, then `us-east-1`. A configured
//! `endpoint` (e.g. LocalStack) replaces the regional endpoint.

use crate::arguments::{MessageArguments, SendMessageArgs, SendMessageBatchArgs};
use crate::config::SqsConnectionConfig;
use crate::error::TransportError;
use crate::transport::{
    BatchResultEntry, BatchResultErrorEntry, GetQueueUrlArgs, SendMessageBatchOutput,
    SendMessageOutput, SqsTransport,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

const REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature Version 4 signer for request authentication
#[derive(Clone)]
struct AwsV4Signer {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    region: String,
    service: String,
}

impl AwsV4Signer {
    fn new(
        access_key: String,
        secret_key: String,
        session_token: Option<String>,
        region: String,
    ) -> Self {
        Self {
            access_key,
            secret_key,
            session_token,
            region,
            service: "sqs".to_string(),
        }
    }

    /// Headers to add to a request: `Authorization`, `x-amz-date`, `host`
    /// and, with temporary credentials, `x-amz-security-token`
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        query_params: &BTreeMap<String, String>,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<HashMap<String, String>, TransportError> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        let mut canonical_query_string = query_params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>();
        canonical_query_string.sort();
        let canonical_query_string = canonical_query_string.join("&");

        // Header names must be sorted
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = "host;x-amz-date".to_string();
        if let Some(token) = &self.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let payload_hash = format!("{:x}", Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, canonical_query_string, canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let canonical_request_hash = format!("{:x}", Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        let signature = self.calculate_signature(&string_to_sign, &date_stamp)?;

        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.access_key, credential_scope, signed_headers, signature
        );

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), authorization_header);
        headers.insert("x-amz-date".to_string(), amz_date);
        headers.insert("host".to_string(), host.to_string());
        if let Some(token) = &self.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        Ok(headers)
    }

    fn calculate_signature(
        &self,
        string_to_sign: &str,
        date_stamp: &str,
    ) -> Result<String, TransportError> {
        let k_secret = format!("AWS4{}", self.secret_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes())?;

        Ok(hex::encode(signature))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| TransportError::Authentication(format!("Invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// [`SqsTransport`] over the SQS HTTP query API
///
/// With `lazy` set in the configuration the HTTP client is built on the
/// first call instead of at construction.
pub struct HttpSqsTransport {
    http_client: OnceCell<HttpClient>,
    config: SqsConnectionConfig,
}

impl HttpSqsTransport {
    /// Create new HTTP transport
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built or a configured
    /// endpoint is not a valid URL.
    pub fn new(config: SqsConnectionConfig) -> Result<Self, TransportError> {
        if let Some(endpoint) = &config.endpoint {
            Url::parse(endpoint).map_err(|e| {
                TransportError::Configuration(format!("Invalid endpoint '{}': {}", endpoint, e))
            })?;
        }

        let http_client = if config.lazy {
            OnceCell::new()
        } else {
            OnceCell::new_with(Some(build_http_client()?))
        };

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &SqsConnectionConfig {
        &self.config
    }

    /// Check if the HTTP client has been built
    pub fn is_connected(&self) -> bool {
        self.http_client.initialized()
    }

    async fn http_client(&self) -> Result<&HttpClient, TransportError> {
        self.http_client
            .get_or_try_init(|| async {
                debug!("Creating HTTP client");
                build_http_client()
            })
            .await
    }

    fn signer_for(&self, region: &str) -> Option<AwsV4Signer> {
        match (&self.config.key, &self.config.secret) {
            (Some(access_key), Some(secret_key)) => Some(AwsV4Signer::new(
                access_key.clone(),
                secret_key.clone(),
                self.config.token.clone(),
                region.to_string(),
            )),
            _ => None,
        }
    }

    /// Issue one signed query API call and return the response body
    async fn call(
        &self,
        action: &str,
        region_override: Option<&str>,
        mut params: BTreeMap<String, String>,
    ) -> Result<String, TransportError> {
        let region = self.config.region_for(region_override).to_string();
        let endpoint = self.config.endpoint_for(&region);

        let signer = self
            .signer_for(&region)
            .ok_or_else(|| TransportError::Authentication("No credentials configured".to_string()))?;

        params.insert("Action".to_string(), action.to_string());
        params.insert("Version".to_string(), self.config.version.clone());
        let body = encode_form(&params);

        let url = Url::parse(&endpoint).map_err(|e| {
            TransportError::Configuration(format!("Invalid endpoint '{}': {}", endpoint, e))
        })?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(TransportError::Configuration(format!(
                    "Endpoint '{}' has no host",
                    endpoint
                )))
            }
        };

        let auth_headers =
            signer.sign_request("POST", &host, "/", &BTreeMap::new(), &body, &Utc::now())?;

        debug!(action = action, region = %region, "Calling SQS");

        let mut request = self
            .http_client()
            .await?
            .post(format!("{}/", endpoint))
            .header(
                "content-type",
                "application/x-www-form-urlencoded; charset=utf-8",
            )
            .body(body);
        for (key, value) in auth_headers {
            request = request.header(&key, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Network(format!("Request timeout: {}", e))
            } else if e.is_connect() {
                TransportError::Network(format!("Connection failed: {}", e))
            } else {
                TransportError::Network(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(parse_error_response(&response_body, status.as_u16()));
        }

        Ok(response_body)
    }
}

impl fmt::Debug for HttpSqsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSqsTransport")
            .field("region", &self.config.region)
            .field("endpoint", &self.config.endpoint)
            .field("connected", &self.is_connected())
            .field("credentials", &"<redacted>")
            .finish()
    }
}

fn build_http_client() -> Result<HttpClient, TransportError> {
    HttpClient::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {}", e)))
}

#[async_trait]
impl SqsTransport for HttpSqsTransport {
    async fn get_queue_url(&self, args: &GetQueueUrlArgs) -> Result<String, TransportError> {
        let mut params = BTreeMap::new();
        params.insert("QueueName".to_string(), args.queue_name.clone());

        let response = self
            .call("GetQueueUrl", args.region.as_deref(), params)
            .await?;
        parse_queue_url_response(&response)
    }

    async fn send_message(
        &self,
        args: &SendMessageArgs,
    ) -> Result<SendMessageOutput, TransportError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), args.queue_url.clone());
        insert_message_params(&mut params, "", &args.message);

        let response = self
            .call("SendMessage", args.region.as_deref(), params)
            .await?;
        parse_send_message_response(&response)
    }

    async fn send_message_batch(
        &self,
        args: &SendMessageBatchArgs,
    ) -> Result<SendMessageBatchOutput, TransportError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), args.queue_url.clone());
        for (index, entry) in args.entries.iter().enumerate() {
            let prefix = format!("SendMessageBatchRequestEntry.{}.", index + 1);
            params.insert(format!("{}Id", prefix), entry.id.clone());
            insert_message_params(&mut params, &prefix, &entry.message);
        }

        let response = self
            .call("SendMessageBatch", args.region.as_deref(), params)
            .await?;
        parse_send_message_batch_response(&response)
    }
}

// ============================================================================
// Request Encoding
// ============================================================================

/// Flatten per-message arguments into query API parameters
fn insert_message_params(
    params: &mut BTreeMap<String, String>,
    prefix: &str,
    message: &MessageArguments,
) {
    params.insert(
        format!("{}MessageBody", prefix),
        message.message_body.clone(),
    );

    if let Some(delay_seconds) = message.delay_seconds {
        params.insert(format!("{}DelaySeconds", prefix), delay_seconds.to_string());
    }
    if let Some(id) = &message.message_deduplication_id {
        params.insert(format!("{}MessageDeduplicationId", prefix), id.clone());
    }
    if let Some(id) = &message.message_group_id {
        params.insert(format!("{}MessageGroupId", prefix), id.clone());
    }

    for (index, (name, value)) in message.message_attributes.iter().enumerate() {
        let attribute = format!("{}MessageAttribute.{}", prefix, index + 1);
        params.insert(format!("{}.Name", attribute), name.clone());
        params.insert(
            format!("{}.Value.DataType", attribute),
            value.data_type.clone(),
        );
        params.insert(
            format!("{}.Value.StringValue", attribute),
            value.string_value.clone(),
        );
    }
}

fn encode_form(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Collect the text of every child element of each `entry_tag` element
fn collect_entries(xml: &str, entry_tag: &str) -> Result<Vec<HashMap<String, String>>, TransportError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;
    let mut field: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == entry_tag {
                    current = Some(HashMap::new());
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(entry), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = e.unescape().map_err(|e| {
                        TransportError::Serialization(format!("Failed to parse XML: {}", e))
                    })?;
                    entry.insert(name.clone(), text.into_owned());
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == entry_tag.as_bytes() {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TransportError::Serialization(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// Parse GetQueueUrl XML response
fn parse_queue_url_response(xml: &str) -> Result<String, TransportError> {
    collect_entries(xml, "GetQueueUrlResult")?
        .into_iter()
        .find_map(|mut entry| entry.remove("QueueUrl"))
        .ok_or_else(|| TransportError::Serialization("QueueUrl not found in response".to_string()))
}

/// Parse SendMessage XML response
///
/// A response without a result element yields an output without a
/// `message_id`; the caller decides what that means.
fn parse_send_message_response(xml: &str) -> Result<SendMessageOutput, TransportError> {
    let output = collect_entries(xml, "SendMessageResult")?
        .into_iter()
        .next()
        .map(|mut entry| SendMessageOutput {
            message_id: entry.remove("MessageId"),
            md5_of_message_body: entry.remove("MD5OfMessageBody"),
            md5_of_message_attributes: entry.remove("MD5OfMessageAttributes"),
            sequence_number: entry.remove("SequenceNumber"),
        })
        .unwrap_or_default();

    Ok(output)
}

/// Parse SendMessageBatch XML response
fn parse_send_message_batch_response(xml: &str) -> Result<SendMessageBatchOutput, TransportError> {
    let successful = collect_entries(xml, "SendMessageBatchResultEntry")?
        .into_iter()
        .map(|mut entry| {
            let id = required_field(&mut entry, "Id")?;
            let message_id = required_field(&mut entry, "MessageId")?;
            Ok(BatchResultEntry {
                id,
                message_id,
                md5_of_message_body: entry.remove("MD5OfMessageBody"),
                md5_of_message_attributes: entry.remove("MD5OfMessageAttributes"),
                sequence_number: entry.remove("SequenceNumber"),
            })
        })
        .collect::<Result<Vec<_>, TransportError>>()?;

    let failed = collect_entries(xml, "BatchResultErrorEntry")?
        .into_iter()
        .map(|mut entry| {
            Ok(BatchResultErrorEntry {
                code: required_field(&mut entry, "Code")?,
                id: required_field(&mut entry, "Id")?,
                message: entry.remove("Message").unwrap_or_default(),
                sender_fault: entry.get("SenderFault").map(String::as_str) == Some("true"),
            })
        })
        .collect::<Result<Vec<_>, TransportError>>()?;

    Ok(SendMessageBatchOutput { successful, failed })
}

fn required_field(
    entry: &mut HashMap<String, String>,
    name: &str,
) -> Result<String, TransportError> {
    entry
        .remove(name)
        .ok_or_else(|| TransportError::Serialization(format!("{} not found in response", name)))
}

/// Parse error response from XML
fn parse_error_response(xml: &str, status_code: u16) -> TransportError {
    let mut error = collect_entries(xml, "Error")
        .ok()
        .and_then(|entries| entries.into_iter().next())
        .unwrap_or_default();

    let code = error
        .remove("Code")
        .unwrap_or_else(|| "Unknown".to_string());
    let message = error
        .remove("Message")
        .unwrap_or_else(|| "Unknown error".to_string());

    // Map AWS error codes to our error types
    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            TransportError::QueueNotFound(message)
        }
        "InvalidClientTokenId" | "UnrecognizedClientException" | "SignatureDoesNotMatch" => {
            TransportError::Authentication(format!("{}: {}", code, message))
        }
        _ if status_code == 401 || status_code == 403 => {
            TransportError::Authentication(format!("{}: {}", code, message))
        }
        _ => TransportError::Service { code, message },
    }
}
