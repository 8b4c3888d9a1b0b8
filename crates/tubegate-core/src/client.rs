use async_trait::async_trait;

use crate::{
    api::{FilterRequest, FilterVerdict},
    error::{Result, TubegateError},
};

/// Seam over the remote classification call. Cancellation happens by
/// dropping the in-flight future, so implementations must not spawn.
#[async_trait]
pub trait FilterClient: Send + Sync {
    async fn classify(&self, request: &FilterRequest) -> Result<Vec<FilterVerdict>>;
}

pub struct HttpFilterClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpFilterClient {
    /// `endpoint` is the service base URL, without the route.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl FilterClient for HttpFilterClient {
    async fn classify(&self, request: &FilterRequest) -> Result<Vec<FilterVerdict>> {
        let response = self
            .http
            .post(format!("{}/filterVideos", self.endpoint))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TubegateError::FilterHttp {
                status: status.as_u16(),
            });
        }

        let verdicts = response.json::<Vec<FilterVerdict>>().await?;
        tracing::debug!(verdicts = verdicts.len(), "filter service responded");
        Ok(verdicts)
    }
}
