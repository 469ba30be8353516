// # Porkbun Registrar
//
// Registrar implementation for the Porkbun JSON API v3.
//
// ## Behaviour
//
// - One HTTP request per trait call, no retries and no caching
// - Every request is a POST whose JSON body carries the API key pair
// - A response `status` other than `SUCCESS` is a provider error, whatever
//   the HTTP status code
// - HTTP timeout of 30 seconds
// - Dry-run mode: edits are logged with the key pair redacted and not sent
//
// ## Security
//
// - The secret API key NEVER appears in logs or `Debug` output
//
// ## API Reference
//
// - Ping: POST `https://api-ipv4.porkbun.com/api/json/v3/ping`
// - Retrieve records: POST `/dns/retrieve/{domain}`
// - Edit record: POST `/dns/edit/{domain}/{id}`
// - Retrieve SSL bundle: POST `/ssl/retrieve/{domain}`

use async_trait::async_trait;
use porksync_core::config::Credentials;
use porksync_core::resolver::parse_ipv4;
use porksync_core::traits::{
    CertificateBundle, EditResult, Record, RecordEdit, Registrar, RemoteRecordSet,
};
use porksync_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Porkbun API base URL
pub const PORKBUN_API_BASE: &str = "https://porkbun.com/api/json/v3";

/// IPv4-only API base URL, so ping reports the IPv4 address
pub const PORKBUN_PING_BASE: &str = "https://api-ipv4.porkbun.com/api/json/v3";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Response status signalling success
const STATUS_SUCCESS: &str = "SUCCESS";

const PROVIDER_NAME: &str = "porkbun";

/// Status part shared by every response
#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    #[serde(rename = "yourIp")]
    your_ip: String,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    records: Vec<WireRecord>,
}

/// A record as Porkbun serializes it
#[derive(Debug, Deserialize)]
struct WireRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    #[serde(default)]
    ttl: Option<String>,
    #[serde(default)]
    prio: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

impl From<WireRecord> for Record {
    fn from(wire: WireRecord) -> Self {
        Record {
            id: wire.id,
            name: wire.name,
            record_type: wire.record_type,
            content: wire.content,
            ttl: wire.ttl,
            priority: wire.prio,
            notes: wire.notes,
        }
    }
}

#[derive(Deserialize)]
struct SslResponse {
    certificatechain: String,
    intermediatecertificate: String,
    privatekey: String,
    publickey: String,
}

/// Porkbun registrar
///
/// Stateless apart from the HTTP client. Credentials travel with every
/// call, so one instance serves every catalogue.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the registrar will:
/// - Perform ping, retrieve and SSL retrieve requests
/// - Log the intended edit payload with keys redacted
/// - **NOT** send edit requests
#[derive(Debug)]
pub struct PorkbunRegistrar {
    /// Base URL for DNS and SSL endpoints
    api_base: String,

    /// Base URL for the ping endpoint
    ping_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, skip edit requests
    dry_run: bool,
}

impl PorkbunRegistrar {
    /// Create a registrar against the production API
    ///
    /// # Parameters
    ///
    /// - `dry_run`: If true, log edits instead of sending them
    pub fn new(dry_run: bool) -> Result<Self> {
        Self::with_endpoints(PORKBUN_API_BASE, PORKBUN_PING_BASE, dry_run)
    }

    /// Create a registrar against custom base URLs (mock servers in tests)
    ///
    /// # Parameters
    ///
    /// - `api_base`: Base URL for `/dns/...` and `/ssl/...`
    /// - `ping_base`: Base URL for `/ping`
    /// - `dry_run`: If true, log edits instead of sending them
    pub fn with_endpoints(
        api_base: impl Into<String>,
        ping_base: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_base: trim_base(api_base.into()),
            ping_base: trim_base(ping_base.into()),
            client,
            dry_run,
        })
    }

    /// POST `body` plus the key pair to `url` and decode a successful response
    ///
    /// # Returns
    ///
    /// - `Ok(T)`: Response with status `SUCCESS`, decoded
    /// - `Err(Error::Provider)`: Network failure, undecodable body or a
    ///   non-success status (carrying the registrar's message)
    async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        credentials: &Credentials,
        body: Value,
    ) -> Result<T> {
        let payload = with_credentials(body, credentials);

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        let http_status = response.status();
        let text = response.text().await.map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Failed to read response: {}", e))
        })?;

        let envelope: StatusEnvelope = serde_json::from_str(&text).map_err(|_| {
            Error::provider(
                PROVIDER_NAME,
                format!("Unexpected response ({}): {}", http_status, excerpt(&text)),
            )
        })?;

        if envelope.status != STATUS_SUCCESS {
            tracing::warn!("Porkbun response for {}: {}", endpoint_path(url), text);
            return Err(Error::provider(
                PROVIDER_NAME,
                format!(
                    "{} ({}): {}",
                    envelope.status,
                    http_status,
                    envelope.message.unwrap_or_else(|| "no message".to_string())
                ),
            ));
        }

        serde_json::from_str(&text).map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e))
        })
    }
}

#[async_trait]
impl Registrar for PorkbunRegistrar {
    /// Ask Porkbun which address the request came from
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /ping
    /// {"secretapikey": "...", "apikey": "..."}
    /// ```
    async fn discover_own_ip(&self, credentials: &Credentials) -> Result<Ipv4Addr> {
        let url = format!("{}/ping", self.ping_base);
        let response: PingResponse = self.post(&url, credentials, json!({})).await?;

        tracing::debug!("Porkbun reports own address {}", response.your_ip);
        parse_ipv4(&response.your_ip)
    }

    async fn retrieve_records(
        &self,
        domain: &str,
        credentials: &Credentials,
    ) -> Result<RemoteRecordSet> {
        let url = format!("{}/dns/retrieve/{}", self.api_base, domain);
        let response: RetrieveResponse = self.post(&url, credentials, json!({})).await?;

        Ok(RemoteRecordSet::new(
            response.records.into_iter().map(Record::from).collect(),
        ))
    }

    /// Point an existing record at new content
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /dns/edit/{apex}/{id}
    /// {"secretapikey": "...", "apikey": "...", "name": "www", "type": "A", "content": "1.2.3.4"}
    /// ```
    async fn edit_record(&self, edit: &RecordEdit, credentials: &Credentials) -> Result<EditResult> {
        let url = format!("{}/dns/edit/{}/{}", self.api_base, edit.apex, edit.record_id);
        let body = json!({
            "name": edit.name,
            "type": edit.record_type,
            "content": edit.content.to_string(),
        });

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                url,
                with_redacted_credentials(body)
            );
            return Ok(EditResult::DryRun);
        }

        match self.post::<StatusEnvelope>(&url, credentials, body).await {
            Ok(_) => Ok(EditResult::Applied),
            Err(e) => {
                tracing::warn!("Porkbun rejected edit of record {}: {}", edit.record_id, e);
                Err(e)
            }
        }
    }

    async fn retrieve_certificates(
        &self,
        domain: &str,
        credentials: &Credentials,
    ) -> Result<CertificateBundle> {
        let url = format!("{}/ssl/retrieve/{}", self.api_base, domain);
        let response: SslResponse = self.post(&url, credentials, json!({})).await?;

        Ok(CertificateBundle {
            certificate_chain: response.certificatechain,
            intermediate_certificate: response.intermediatecertificate,
            private_key: response.privatekey,
            public_key: response.publickey,
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

/// Merge the key pair into a request body
fn with_credentials(body: Value, credentials: &Credentials) -> Value {
    let mut payload = json!({
        "secretapikey": credentials.secret_key(),
        "apikey": credentials.public_key(),
    });
    if let (Value::Object(payload), Value::Object(body)) = (&mut payload, body) {
        payload.extend(body);
    }
    payload
}

/// The request body as it would be sent, keys replaced by placeholders
fn with_redacted_credentials(body: Value) -> Value {
    let mut payload = json!({
        "secretapikey": "<REDACTED>",
        "apikey": "<REDACTED>",
    });
    if let (Value::Object(payload), Value::Object(body)) = (&mut payload, body) {
        payload.extend(body);
    }
    payload
}

/// Path below the API version prefix, or the whole URL
fn endpoint_path(url: &str) -> &str {
    url.split_once("/api/json/v3").map_or(url, |(_, path)| path)
}

fn excerpt(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
