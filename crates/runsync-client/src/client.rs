//! HTTP implementation of [`RunTransport`] for the web console API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use runsync_core::config::ApiConfig;
use runsync_core::types::{
    DatasetOption, EstimateRequest, EstimateResult, RunConfig, RunId, RunRecord, RunResultRow,
};
use runsync_core::validation::{render_errors, Validate};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::FetchError;
use crate::transport::RunTransport;
use crate::types::{
    CreateRunResponse, Endpoint, HttpMethod, LogResponse, OptionsResponse, RunDetailResponse,
    RunListResponse,
};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| FetchError::transport(format!("failed to create HTTP client: {err}")))?;
        Self::with_client(client, &config.base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url.trim()).map_err(|err| {
            FetchError::transport(format!("invalid base url '{base_url}': {err}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::transport(format!(
                "base url '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: &Endpoint) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                FetchError::transport(format!("base url '{}' cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend(endpoint.segments());
        }
        Ok(url)
    }

    fn request(&self, endpoint: &Endpoint) -> Result<RequestBuilder, FetchError> {
        let url = self.endpoint_url(endpoint)?;
        Ok(match endpoint.method() {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Delete => self.client.delete(url),
        })
    }

    async fn send(
        &self,
        endpoint: &Endpoint,
        body: Option<serde_json::Value>,
    ) -> Result<Response, FetchError> {
        let mut request = self.request(endpoint)?;
        if let Some(body) = body {
            request = request.json(&body);
        }
        tracing::trace!(endpoint = ?endpoint, "sending request");
        let response = request.send().await?;
        check_status(endpoint, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T, FetchError> {
        let response = self.send(endpoint, None).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_json<B, T>(&self, endpoint: &Endpoint, body: &B) -> Result<T, FetchError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)
            .map_err(|err| FetchError::transport(format!("failed to encode request: {err}")))?;
        let response = self.send(endpoint, Some(body)).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check_status(endpoint: &Endpoint, response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(endpoint, status, &body))
}

pub fn classify_status(endpoint: &Endpoint, status: StatusCode, body: &str) -> FetchError {
    let detail = error_detail(body);
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound {
            resource: endpoint.resource(),
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
            if matches!(endpoint, Endpoint::CreateRun | Endpoint::Estimate) =>
        {
            FetchError::Validation { message: detail }
        }
        _ => FetchError::transport(format!("API error ({status}): {detail}")),
    }
}

/// Pulls `detail` out of JSON error bodies; falls back to the raw text.
fn error_detail(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    match parsed.as_ref().and_then(|value| value.get("detail")) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => body.trim().to_string(),
    }
}

#[async_trait]
impl RunTransport for HttpTransport {
    async fn get_options(&self) -> Result<Vec<DatasetOption>, FetchError> {
        let response: OptionsResponse = self.get_json(&Endpoint::Options).await?;
        Ok(response.datasets)
    }

    async fn list_runs(&self) -> Result<Vec<RunRecord>, FetchError> {
        let response: RunListResponse = self.get_json(&Endpoint::ListRuns).await?;
        Ok(response.runs)
    }

    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord, FetchError> {
        let response: RunDetailResponse = self.get_json(&Endpoint::Run(run_id.clone())).await?;
        Ok(response.run)
    }

    async fn get_log(&self, run_id: &RunId) -> Result<String, FetchError> {
        let response: LogResponse = self.get_json(&Endpoint::RunLog(run_id.clone())).await?;
        Ok(response.log)
    }

    async fn get_results(&self, run_id: &RunId) -> Result<Vec<RunResultRow>, FetchError> {
        self.get_json(&Endpoint::RunResults(run_id.clone())).await
    }

    async fn create_run(&self, config: &RunConfig) -> Result<RunId, FetchError> {
        if let Some(message) = render_errors(&config.validate()) {
            return Err(FetchError::Validation { message });
        }
        let response: CreateRunResponse = self.post_json(&Endpoint::CreateRun, config).await?;
        tracing::info!(run_id = %response.run_id, "run created");
        Ok(response.run_id)
    }

    async fn estimate(&self, request: &EstimateRequest) -> Result<EstimateResult, FetchError> {
        if request.data_file.trim().is_empty() {
            return Err(FetchError::Validation {
                message: "data_file is required".to_string(),
            });
        }
        self.post_json(&Endpoint::Estimate, request).await
    }

    async fn clear_history(&self) -> Result<(), FetchError> {
        self.send(&Endpoint::ClearHistory, None).await?;
        Ok(())
    }
}
