//! Rackspace Identity and Cloud DNS HTTP client
//!
//! Uses reqwest with rustls for HTTP requests. [`RackspaceAuthenticator`]
//! exchanges the account's API key for a token and the Cloud DNS endpoint;
//! [`CloudDnsClient`] implements [`DnsClient`] against that endpoint.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use urlencoding::encode;
use zeroize::Zeroizing;

use crate::constants::{
    AUTH_TOKEN_HEADER, DNS_SERVICE_TYPE, JOB_MAX_POLLS, JOB_POLL_INTERVAL, PAGE_LIMIT, USER_AGENT,
};
use crate::credentials::{Authenticator, Session};
use crate::dns_client::{DnsClient, NewRecord, Page, PageToken, Record, Zone};
use crate::error::{Error, Result};

/// Builds the HTTP client shared by identity and DNS calls
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::provider("build reqwest client", e))?;
    Ok(client)
}

//==============================================================================
// Identity
//==============================================================================

#[derive(Serialize)]
struct AuthRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Serialize)]
struct AuthBody<'a> {
    #[serde(rename = "RAX-KSKEY:apiKeyCredentials")]
    credentials: ApiKeyCredentials<'a>,
    #[serde(rename = "tenantId", skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
}

#[derive(Serialize)]
struct ApiKeyCredentials<'a> {
    username: &'a str,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct Token {
    id: String,
    #[serde(default)]
    expires: Option<String>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &"<redacted>")
            .field("expires", &self.expires)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    #[serde(rename = "publicURL")]
    public_url: String,
    #[serde(rename = "tenantId", default)]
    tenant_id: Option<String>,
}

impl IdentityResponse {
    /// Cloud DNS endpoint from the catalog, preferring the configured tenant
    fn dns_endpoint(&self, tenant_id: Option<&str>) -> Option<&str> {
        let mut endpoints = self
            .access
            .service_catalog
            .iter()
            .filter(|entry| entry.service_type == DNS_SERVICE_TYPE)
            .flat_map(|entry| entry.endpoints.iter());

        match tenant_id {
            Some(tenant) => {
                let all: Vec<&CatalogEndpoint> = endpoints.collect();
                all.iter()
                    .find(|ep| {
                        ep.tenant_id.as_deref() == Some(tenant)
                            || ep.public_url.trim_end_matches('/').ends_with(&format!("/{}", tenant))
                    })
                    .copied()
                    .or_else(|| all.first().copied())
                    .map(|ep| ep.public_url.as_str())
            }
            None => endpoints.next().map(|ep| ep.public_url.as_str()),
        }
    }

    /// Token expiry; `None` when absent or unparseable
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.access.token.expires.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                warn!("Unparseable token expiry '{}': {}", raw, e);
                None
            }
        }
    }
}

/// Authenticates against Rackspace Identity v2 with an API key
pub struct RackspaceAuthenticator {
    http: reqwest::Client,
    identity_endpoint: String,
    username: String,
    api_key: Zeroizing<String>,
    tenant_id: Option<String>,
    poll_interval: Duration,
}

impl fmt::Debug for RackspaceAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RackspaceAuthenticator")
            .field("identity_endpoint", &self.identity_endpoint)
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

impl RackspaceAuthenticator {
    pub fn new(
        identity_endpoint: &str,
        username: &str,
        api_key: &str,
        tenant_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            identity_endpoint: identity_endpoint.trim_end_matches('/').to_string(),
            username: username.to_string(),
            api_key: Zeroizing::new(api_key.to_string()),
            tenant_id: tenant_id.map(str::to_string),
            poll_interval: JOB_POLL_INTERVAL,
        })
    }

    /// Overrides the delay between job polls of the clients this creates
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn request_token(&self) -> Result<IdentityResponse> {
        let url = format!("{}/tokens", self.identity_endpoint);
        let body = AuthRequest {
            auth: AuthBody {
                credentials: ApiKeyCredentials {
                    username: &self.username,
                    api_key: &self.api_key,
                },
                tenant_id: self.tenant_id.as_deref(),
            },
        };

        debug!("POST {}", url);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::auth(format!("identity request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp).await;
            return Err(Error::auth(format!(
                "identity returned {}: {}",
                status.as_u16(),
                message
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::auth(format!("failed to parse identity response: {}", e)))
    }
}

#[async_trait]
impl Authenticator for RackspaceAuthenticator {
    async fn authenticate(&self) -> Result<Session> {
        let identity = self.request_token().await?;

        let endpoint = identity
            .dns_endpoint(self.tenant_id.as_deref())
            .ok_or_else(|| {
                Error::auth(format!("no {} endpoint in service catalog", DNS_SERVICE_TYPE))
            })?;
        debug!("Cloud DNS endpoint: {}", endpoint);

        let client = CloudDnsClient::new(self.http.clone(), endpoint, &identity.access.token.id)?
            .with_poll_interval(self.poll_interval);
        let client: Arc<dyn DnsClient> = Arc::new(client);

        Ok(match identity.expires_at() {
            Some(expires_at) => Session::new(client, expires_at),
            None => Session::with_default_lifetime(client),
        })
    }
}

//==============================================================================
// Cloud DNS
//==============================================================================

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    #[serde(default)]
    rel: String,
}

#[derive(Debug, Deserialize)]
struct DomainList {
    #[serde(default)]
    domains: Vec<Zone>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Serialize)]
struct CreateRecords<'a> {
    records: [&'a NewRecord; 1],
}

/// Asynchronous job returned by record mutations
#[derive(Debug, Deserialize)]
struct AsyncJob {
    status: String,
    #[serde(rename = "callbackUrl", default)]
    callback_url: Option<String>,
    #[serde(rename = "jobId", default)]
    job_id: Option<String>,
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[{}] ", code)?;
        }
        match (self.message.is_empty(), self.details.is_empty()) {
            (false, false) => write!(f, "{} ({})", self.message, self.details),
            (false, true) => f.write_str(&self.message),
            (true, false) => f.write_str(&self.details),
            (true, true) => f.write_str("unknown error"),
        }
    }
}

async fn error_message(resp: reqwest::Response) -> String {
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&text) {
        Ok(err) if !err.message.is_empty() || !err.details.is_empty() => err.to_string(),
        _ if text.is_empty() => "empty response".to_string(),
        _ => text,
    }
}

/// Cloud DNS client bound to one session token
pub struct CloudDnsClient {
    http: reqwest::Client,
    endpoint: Url,
    token: Zeroizing<String>,
    poll_interval: Duration,
}

impl fmt::Debug for CloudDnsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudDnsClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl CloudDnsClient {
    pub fn new(http: reqwest::Client, endpoint: &str, token: &str) -> Result<Self> {
        // a trailing slash makes Url::join append rather than replace
        let endpoint = format!("{}/", endpoint.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| Error::auth(format!("invalid Cloud DNS endpoint {}: {}", endpoint, e)))?;
        Ok(Self {
            http,
            endpoint,
            token: Zeroizing::new(token.to_string()),
            poll_interval: JOB_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| Error::provider(format!("invalid URL path {}", path), e))
    }

    /// Resolves a link returned by the API, refusing other origins
    fn follow(&self, href: &str) -> Result<Url> {
        let url = self
            .endpoint
            .join(href)
            .map_err(|e| Error::provider(format!("invalid link {}", href), e))?;
        if url.origin() != self.endpoint.origin() {
            return Err(Error::provider(
                "refusing to follow link",
                format!("{} is not on {}", href, self.endpoint),
            ));
        }
        Ok(url)
    }

    fn first_page(&self, path: &str) -> Result<Url> {
        let mut url = self.url(path)?;
        url.query_pairs_mut()
            .append_pair("limit", &PAGE_LIMIT.to_string())
            .append_pair("offset", "0");
        Ok(url)
    }

    fn next_page(&self, links: &[Link]) -> Result<Option<PageToken>> {
        links
            .iter()
            .find(|link| link.rel == "next")
            .map(|link| self.follow(&link.href).map(|url| url.to_string()))
            .transpose()
    }

    /// Sends an authenticated request and fails on non-success statuses
    async fn send(&self, req: RequestBuilder, context: &str) -> Result<reqwest::Response> {
        let resp = req
            .header(AUTH_TOKEN_HEADER, self.token.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(context, e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = error_message(resp).await;
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => Error::provider(
                context,
                format!("rate limited by Cloud DNS ({}): {}", status.as_u16(), message),
            ),
            StatusCode::UNAUTHORIZED => {
                Error::provider(context, format!("token rejected: {}", message))
            }
            s if s.is_server_error() => Error::provider(
                context,
                format!("Cloud DNS server error {}: {}", s.as_u16(), message),
            ),
            s => Error::provider(context, format!("{}: {}", s.as_u16(), message)),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url, context: &str) -> Result<T> {
        debug!("GET {}", url);
        let resp = self.send(self.http.get(url), context).await?;
        resp.json()
            .await
            .map_err(|e| Error::provider(context, format!("failed to parse response: {}", e)))
    }

    /// Polls a job until it finishes and returns its `response` payload
    async fn wait_for_job(&self, mut job: AsyncJob, context: &str) -> Result<Option<Value>> {
        for attempt in 0..=JOB_MAX_POLLS {
            match job.status.as_str() {
                "COMPLETED" => return Ok(job.response),
                "ERROR" => {
                    let err = job.error.unwrap_or_default();
                    return Err(Error::provider(context, format!("job failed: {}", err)));
                }
                _ => {}
            }
            if attempt == JOB_MAX_POLLS {
                break;
            }

            let callback = job.callback_url.as_deref().ok_or_else(|| {
                Error::provider(context, format!("job in state {} has no callback", job.status))
            })?;
            let mut url = self.follow(callback)?;
            url.query_pairs_mut().append_pair("showDetails", "true");

            tokio::time::sleep(self.poll_interval).await;
            debug!(
                "Polling job {} (attempt {})",
                job.job_id.as_deref().unwrap_or("?"),
                attempt + 1
            );
            job = self.get_json(url, context).await?;
        }

        Err(Error::provider(
            context,
            format!(
                "job {} did not finish after {} polls",
                job.job_id.as_deref().unwrap_or("?"),
                JOB_MAX_POLLS
            ),
        ))
    }

    /// Reads a mutation response: either an async job or an immediate body
    async fn finish_mutation(&self, resp: reqwest::Response, context: &str) -> Result<Option<Value>> {
        let text = resp
            .text()
            .await
            .map_err(|e| Error::provider(context, e))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| Error::provider(context, format!("failed to parse response: {}", e)))?;
        if body.get("status").is_some() && body.get("jobId").is_some() {
            let job: AsyncJob = serde_json::from_value(body)
                .map_err(|e| Error::provider(context, format!("failed to parse job: {}", e)))?;
            self.wait_for_job(job, context).await
        } else {
            Ok(Some(body))
        }
    }
}

#[async_trait]
impl DnsClient for CloudDnsClient {
    async fn list_zones(&self, page: Option<&PageToken>) -> Result<Page<Zone>> {
        let url = match page {
            Some(token) => self.follow(token)?,
            None => self.first_page("domains")?,
        };
        let list: DomainList = self.get_json(url, "failed to list domains").await?;
        Ok(Page {
            next: self.next_page(&list.links)?,
            items: list.domains,
        })
    }

    async fn list_records(&self, zone_id: &str, page: Option<&PageToken>) -> Result<Page<Record>> {
        let url = match page {
            Some(token) => self.follow(token)?,
            None => self.first_page(&format!("domains/{}/records", encode(zone_id)))?,
        };
        let context = format!("failed to list records of domain {}", zone_id);
        let list: RecordList = self.get_json(url, &context).await?;
        Ok(Page {
            next: self.next_page(&list.links)?,
            items: list.records,
        })
    }

    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<Record> {
        let url = self.url(&format!("domains/{}/records", encode(zone_id)))?;
        let context = format!("failed to create {} record {}", record.record_type, record.name);

        debug!("POST {}", url);
        let req = self.http.post(url).json(&CreateRecords { records: [record] });
        let resp = self.send(req, &context).await?;

        let body = self
            .finish_mutation(resp, &context)
            .await?
            .ok_or_else(|| Error::provider(&context, "empty response"))?;
        let list: RecordList = serde_json::from_value(body)
            .map_err(|e| Error::provider(&context, format!("failed to parse records: {}", e)))?;
        list.records
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider(&context, "response contained no record"))
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let url = self.url(&format!(
            "domains/{}/records/{}",
            encode(zone_id),
            encode(record_id)
        ))?;
        let context = format!("failed to delete record {}", record_id);

        debug!("DELETE {}", url);
        let resp = self.send(self.http.delete(url), &context).await?;
        self.finish_mutation(resp, &context).await?;
        Ok(())
    }
}

//==============================================================================
// Tests
//==============================================================================
