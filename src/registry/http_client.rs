use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use reqwest::Method;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::Url;
use tracing::debug;
use tracing::warn;

use super::RegistryClient;
use crate::constants::JSON_CONTENT_TYPE;
use crate::metrics::REGISTRY_REQUESTS;
use crate::RegistryConfig;
use crate::RegistryError;
use crate::RegistryRecord;
use crate::Result;

/// [`RegistryClient`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: Client,
    /// Collection URL, without trailing slash
    base_url: String,
}

impl HttpRegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let base_url = normalize_base_address(&config.base_address)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(RegistryError::Client)?;

        Ok(Self { client, base_url })
    }

    fn item_url(
        &self,
        id: &str,
    ) -> String {
        format!("{}/{}", self.base_url, id)
    }

    fn request(
        &self,
        method: Method,
        url: &str,
    ) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
    }

    async fn send(
        &self,
        op: &'static str,
        url: &str,
        request: RequestBuilder,
    ) -> Result<Response> {
        match request.send().await {
            Ok(response) => {
                debug!(op, url, status = %response.status(), "registry response");
                Ok(response)
            }
            Err(source) => {
                record(op, "transport");
                Err(RegistryError::Transport {
                    op,
                    url: url.to_string(),
                    source,
                }
                .into())
            }
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        op: &'static str,
        url: &str,
        response: Response,
    ) -> Result<T> {
        response.json::<T>().await.map_err(|source| {
            record(op, "decode");
            RegistryError::Decode {
                op,
                url: url.to_string(),
                source,
            }
            .into()
        })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let url = self.item_url(id);
        let response = self.send("exists", &url, self.request(Method::GET, &url)).await?;
        record("exists", "ok");
        Ok(response.status() == StatusCode::OK)
    }

    async fn fetch(
        &self,
        id: &str,
    ) -> Result<Option<RegistryRecord>> {
        let url = self.item_url(id);
        let response = self.send("fetch", &url, self.request(Method::GET, &url)).await?;
        match response.status() {
            StatusCode::OK => {
                let record_body = Self::decode("fetch", &url, response).await?;
                record("fetch", "ok");
                Ok(Some(record_body))
            }
            StatusCode::NOT_FOUND => {
                record("fetch", "ok");
                Ok(None)
            }
            status => Err(unexpected("fetch", &url, status)),
        }
    }

    async fn create(
        &self,
        body: &RegistryRecord,
    ) -> Result<()> {
        let url = self.base_url.clone();
        let response = self
            .send("create", &url, self.request(Method::POST, &url).json(body))
            .await?;
        if response.status() == StatusCode::CREATED {
            record("create", "ok");
        } else {
            record("create", "status");
            warn!(
                id = %body.id,
                status = %response.status(),
                "status code received back was not expected during creation"
            );
        }
        Ok(())
    }

    async fn update(
        &self,
        id: &str,
        body: &RegistryRecord,
    ) -> Result<()> {
        let url = self.item_url(id);
        let response = self
            .send("update", &url, self.request(Method::PATCH, &url).json(body))
            .await?;
        if !response.status().is_success() {
            return Err(unexpected("update", &url, response.status()));
        }
        record("update", "ok");
        Ok(())
    }

    async fn delete(
        &self,
        id: &str,
    ) -> Result<()> {
        let url = self.item_url(id);
        let response = self.send("delete", &url, self.request(Method::DELETE, &url)).await?;
        match response.status() {
            status if status.is_success() => {
                record("delete", "ok");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                debug!(id, "registry had no record to delete");
                record("delete", "ok");
                Ok(())
            }
            status => Err(unexpected("delete", &url, status)),
        }
    }

    async fn list(&self) -> Result<Vec<RegistryRecord>> {
        let url = self.base_url.clone();
        let response = self.send("list", &url, self.request(Method::GET, &url)).await?;
        if response.status() != StatusCode::OK {
            return Err(unexpected("list", &url, response.status()));
        }
        let records = Self::decode("list", &url, response).await?;
        record("list", "ok");
        Ok(records)
    }
}

/// Accepts `host:port/path` as well as full URLs; `http://` is assumed when
/// no scheme is given
pub(crate) fn normalize_base_address(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| RegistryError::InvalidAddress(format!("{}: {}", raw, e)))?;
    if url.host_str().is_none() || !matches!(url.scheme(), "http" | "https") {
        return Err(RegistryError::InvalidAddress(raw.to_string()).into());
    }

    Ok(candidate)
}

fn unexpected(
    op: &'static str,
    url: &str,
    status: StatusCode,
) -> crate::Error {
    record(op, "status");
    RegistryError::UnexpectedStatus {
        op,
        url: url.to_string(),
        status,
    }
    .into()
}

fn record(
    op: &str,
    outcome: &str,
) {
    REGISTRY_REQUESTS.with_label_values(&[op, outcome]).inc();
}
