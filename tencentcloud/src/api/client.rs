use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use tfplug::Context;

use super::error::ApiError;
use super::retry::{retry, OperationClass, RetryPolicy};
use super::signing::{self, Credential, SignRequest, Signer};

pub const DEFAULT_DOMAIN: &str = "tencentcloudapi.com";
pub const DEFAULT_PROTOCOL: &str = "HTTPS";
const DEFAULT_LANGUAGE: &str = "en-US";

/// Service name and API version of one Tencent Cloud product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    pub service: &'static str,
    pub version: &'static str,
}

/// HTTP connection pool settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub max_idle_connections: usize,
    pub idle_timeout: Duration,
    pub connection_timeout: Duration,
    pub request_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: 10,
            idle_timeout: Duration::from_secs(90),
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            tcp_keepalive: Some(Duration::from_secs(30)),
        }
    }
}

impl ConnectionConfig {
    fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connection_timeout)
            .pool_idle_timeout(self.idle_timeout)
            .pool_max_idle_per_host(self.max_idle_connections);

        if let Some(keepalive) = self.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        builder.build()
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credential: Credential,
    pub region: String,
    /// `HTTPS` or `HTTP`
    pub protocol: String,
    pub domain: String,
    /// Sends every product to this base URL instead of `<service>.<domain>`
    pub endpoint: Option<String>,
    pub language: String,
    pub connection: ConnectionConfig,
    pub read_policy: RetryPolicy,
    pub write_policy: RetryPolicy,
}

impl ClientConfig {
    pub fn new(credential: Credential, region: impl Into<String>) -> Self {
        Self {
            credential,
            region: region.into(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            endpoint: None,
            language: DEFAULT_LANGUAGE.to_string(),
            connection: ConnectionConfig::default(),
            read_policy: RetryPolicy::read(),
            write_policy: RetryPolicy::write(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_retry_policies(mut self, read: RetryPolicy, write: RetryPolicy) -> Self {
        self.read_policy = read;
        self.write_policy = write;
        self
    }
}

/// Tencent Cloud API 3.0 client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    credential: Credential,
    region: String,
    scheme: &'static str,
    domain: String,
    endpoint: Option<Url>,
    language: String,
    read_policy: RetryPolicy,
    write_policy: RetryPolicy,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let scheme = match config.protocol.to_ascii_uppercase().as_str() {
            "HTTPS" => "https",
            "HTTP" => "http",
            other => {
                return Err(ApiError::InvalidEndpoint(format!(
                    "protocol must be HTTPS or HTTP, got {}",
                    other
                )))
            }
        };

        let endpoint = match config.endpoint.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(
                Url::parse(raw.trim()).map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", raw, e)))?,
            ),
            _ => None,
        };

        let http_client = config.connection.build_client()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                credential: config.credential,
                region: config.region,
                scheme,
                domain: config.domain,
                endpoint,
                language: config.language,
                read_policy: config.read_policy,
                write_policy: config.write_policy,
            }),
        })
    }

    pub fn region(&self) -> &str {
        &self.inner.region
    }

    pub fn policy(&self, class: OperationClass) -> &RetryPolicy {
        match class {
            OperationClass::Read => &self.inner.read_policy,
            OperationClass::Write => &self.inner.write_policy,
        }
    }

    fn service_url(&self, service: &str) -> Result<Url, ApiError> {
        if let Some(endpoint) = &self.inner.endpoint {
            return Ok(endpoint.clone());
        }
        let raw = format!("{}://{}.{}/", self.inner.scheme, service, self.inner.domain);
        Url::parse(&raw).map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", raw, e)))
    }

    /// One signed API call, no retries
    pub async fn call<Req, Resp>(
        &self,
        product: Product,
        action: &str,
        request: &Req,
    ) -> Result<Resp, ApiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_string(request)
            .map_err(|e| ApiError::Parse(format!("failed to encode {} request: {}", action, e)))?;
        let url = self.service_url(product.service)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(ApiError::InvalidEndpoint(url.to_string())),
        };

        let now = chrono::Utc::now();
        let timestamp = now.timestamp();
        let date = now.format("%Y-%m-%d").to_string();
        let authorization = Signer::new(&self.inner.credential).authorization(&SignRequest {
            service: product.service,
            host: &host,
            payload: &payload,
            timestamp,
            date: &date,
        })?;

        tracing::debug!(service = product.service, action, "API request: {}", payload);

        let mut builder = self
            .inner
            .http_client
            .post(url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, signing::CONTENT_TYPE)
            .header("X-TC-Action", action)
            .header("X-TC-Version", product.version)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Language", &self.inner.language);
        if !self.inner.region.is_empty() {
            builder = builder.header("X-TC-Region", &self.inner.region);
        }
        if let Some(token) = &self.inner.credential.token {
            builder = builder.header("X-TC-Token", token);
        }

        let response = builder.body(payload).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(action, status = status.as_u16(), "API HTTP error: {}", text);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_response(action, &text)
    }

    /// [`Client::call`] wrapped in the retry policy of `class`
    pub async fn call_with_retry<Req, Resp>(
        &self,
        ctx: &Context,
        class: OperationClass,
        product: Product,
        action: &str,
        request: &Req,
    ) -> Result<Resp, ApiError>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        retry(ctx, self.policy(class), || async move {
            Ok(self.call(product, action, request).await?)
        })
        .await
    }

    pub fn clb(&self) -> super::clb::ClbService<'_> {
        super::clb::ClbService::new(self)
    }

    pub fn cdn(&self) -> super::cdn::CdnService<'_> {
        super::cdn::CdnService::new(self)
    }

    pub fn tcr(&self) -> super::tcr::TcrService<'_> {
        super::tcr::TcrService::new(self)
    }

    pub fn tdmq(&self) -> super::tdmq::TdmqService<'_> {
        super::tdmq::TdmqService::new(self)
    }

    pub fn vpc(&self) -> super::vpc::VpcService<'_> {
        super::vpc::VpcService::new(self)
    }

    pub fn tag(&self) -> super::tag::TagService<'_> {
        super::tag::TagService::new(self)
    }
}

fn parse_response<T: DeserializeOwned>(action: &str, text: &str) -> Result<T, ApiError> {
    let envelope: Envelope = serde_json::from_str(text).map_err(|e| {
        tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
        ApiError::Parse(format!("{}: {}", action, e))
    })?;

    let request_id = envelope
        .response
        .get("RequestId")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(error) = envelope.response.get("Error") {
        let error: ErrorBody = serde_json::from_value(error.clone())
            .map_err(|e| ApiError::Parse(format!("{} error body: {}", action, e)))?;
        tracing::debug!(action, code = %error.code, request_id = %request_id, "API returned error");
        return Err(ApiError::Api {
            code: error.code,
            message: error.message,
            request_id,
        });
    }

    tracing::debug!(action, request_id = %request_id, "API call succeeded");
    serde_json::from_value(envelope.response)
        .map_err(|e| ApiError::Parse(format!("{} response: {}", action, e)))
}
