//! Authenticated JSON client shared by the GCP control-plane wrappers

use crate::error::{GcpError, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OAuth access token used for every call.
///
/// Minting and refreshing the token is the orchestrator's job. The token is
/// never written back: it is skipped on serialization, so it stays out of
/// the state file and out of config diffs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpCredentials {
    #[serde(default, skip_serializing)]
    pub access_token: String,

    /// Project billed for API quota (`x-goog-user-project`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_project: Option<String>,
}

impl GcpCredentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            quota_project: None,
        }
    }
}

impl fmt::Debug for GcpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpCredentials")
            .field("access_token", &"<redacted>")
            .field("quota_project", &self.quota_project)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Thin JSON-over-HTTP wrapper with GCP error mapping
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    credentials: GcpCredentials,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, credentials: GcpCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            credentials,
            base_url: base_url.into(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!("GCP {} {}", method, url);
        let mut builder = self
            .http
            .request(method, url)
            .bearer_auth(&self.credentials.access_token);
        if let Some(project) = &self.credentials.quota_project {
            builder = builder.header("x-goog-user-project", project);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        check_status(response).await
    }

    /// GET, mapping 404 to `None`
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.send(self.request(Method::GET, path)).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<serde_json::Value> {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<serde_json::Value> {
        let response = self.send(self.request(Method::PUT, path).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<serde_json::Value> {
        let response = self
            .send(self.request(Method::PATCH, path).json(body))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|b| b.error.message)
        .unwrap_or(text);

    Err(classify(status, message))
}

/// Map an HTTP failure onto the error kinds lifecycle code understands
pub(crate) fn classify(status: StatusCode, message: String) -> GcpError {
    let lower = message.to_lowercase();
    match status {
        StatusCode::NOT_FOUND => GcpError::NotFound(message),
        StatusCode::CONFLICT => GcpError::AlreadyExists(message),
        StatusCode::BAD_REQUEST if lower.contains("does not exist") => GcpError::NotFound(message),
        StatusCode::BAD_REQUEST if lower.contains("already exists") => {
            GcpError::AlreadyExists(message)
        }
        _ => GcpError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert!(classify(StatusCode::NOT_FOUND, "gone".into()).is_not_found());
        assert!(classify(StatusCode::CONFLICT, "dup".into()).is_already_exists());
        assert!(
            classify(StatusCode::BAD_REQUEST, "The instance does not exist.".into())
                .is_not_found()
        );
        assert!(
            classify(StatusCode::BAD_REQUEST, "Instance already exists".into())
                .is_already_exists()
        );
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, "denied".into()),
            GcpError::Api { status: 403, .. }
        ));
    }

    #[test]
    fn test_token_never_serialized() {
        let creds = GcpCredentials::new("ya29.secret");
        let json = serde_json::to_string(&creds).unwrap();
        assert!(!json.contains("ya29"));
        assert!(!format!("{creds:?}").contains("ya29"));
    }

    #[test]
    fn test_url_join() {
        let client = RestClient::new("https://example.test/v1/", GcpCredentials::default()).unwrap();
        assert_eq!(client.url("/projects/p"), "https://example.test/v1/projects/p");
    }
}
