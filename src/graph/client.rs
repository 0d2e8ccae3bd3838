//! Bearer-authenticated JSON transport for Microsoft Graph.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use crate::auth::token::TokenCredential;
use crate::error::ApiError;

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_REQUEST_ID: &str = "client-request-id";
const PREFER: &str = "Prefer";

/// Build the process-wide HTTP client.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .build()
}

/// Encode OData query options into a query string, starting with `?`.
///
/// Option names such as `$select` are kept literal; values are percent-encoded.
pub fn query(options: &[(&str, &str)]) -> String {
    let pairs: Vec<String> = options
        .iter()
        .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
        .collect();
    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

/// Graph error envelope: `{ "error": { "code": ..., "message": ... } }`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// A Graph client bound to one credential and the scopes it requests.
pub struct GraphClient {
    http_client: reqwest::Client,
    base_url: String,
    credential: Arc<dyn TokenCredential>,
    scopes: Vec<String>,
}

impl GraphClient {
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        credential: Arc<dyn TokenCredential>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
            scopes,
        }
    }

    pub fn credential(&self) -> &Arc<dyn TokenCredential> {
        &self.credential
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Resolve a request path against the Graph endpoint.
    ///
    /// Relative paths are appended to the endpoint. Absolute URLs are accepted only
    /// when they point at the same origin, so tokens never leave the Graph host.
    pub fn resolve_path(&self, path: &str) -> Result<String, ApiError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(ApiError::InvalidRequest("path cannot be empty".to_string()));
        }

        match Url::parse(path) {
            Ok(absolute) => {
                let base = Url::parse(&self.base_url)
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                if absolute.origin() != base.origin() {
                    return Err(ApiError::InvalidRequest(format!(
                        "{} is not a Microsoft Graph URL",
                        absolute
                    )));
                }
                Ok(absolute.to_string())
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
            }
            Err(e) => Err(ApiError::InvalidRequest(e.to_string())),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        prefer: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = self.resolve_path(path)?;
        let response = self.send(self.http_client.get(&url), prefer).await?;
        parse_json(response).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        prefer: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = self.resolve_path(path)?;
        let response = self
            .send(self.http_client.post(&url).json(body), prefer)
            .await?;
        parse_json(response).await
    }

    /// POST for endpoints that answer `202 Accepted` with no body.
    pub async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let url = self.resolve_path(path)?;
        self.send(self.http_client.post(&url).json(body), None)
            .await?;
        Ok(())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        prefer: Option<&str>,
    ) -> Result<Response, ApiError> {
        let token = self.credential.get_token(&self.scopes).await?;
        let request_id = Uuid::new_v4().to_string();

        let mut request = request
            .bearer_auth(token.secret())
            .header(CLIENT_REQUEST_ID, &request_id);
        if let Some(prefer) = prefer {
            request = request.header(PREFER, prefer);
        }

        let response = request.send().await?;
        debug!(
            "Graph {} {} (client-request-id {})",
            response.status().as_u16(),
            response.url().path(),
            request_id
        );

        check_status(response).await
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json()
        .await
        .map_err(|e| ApiError::ParseFailed(e.to_string()))
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v: &HeaderValue| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    error!("Graph request failed: HTTP {} - {}", status, body);

    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => (envelope.error.code, envelope.error.message),
        Err(_) => (
            status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        ),
    };

    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { retry_after },
        _ => ApiError::Graph {
            status: status.as_u16(),
            code,
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::AccessToken;
    use crate::error::AuthError;
    use crate::secrets::SecureString;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::{json, Value};
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken;

    #[async_trait]
    impl TokenCredential for StaticToken {
        async fn get_token(&self, _scopes: &[String]) -> Result<AccessToken, AuthError> {
            Ok(AccessToken::new(
                SecureString::new("graph-token".to_string()),
                Utc::now() + ChronoDuration::hours(1),
            ))
        }
    }

    fn client(base: &str) -> GraphClient {
        GraphClient::new(
            reqwest::Client::new(),
            base,
            Arc::new(StaticToken),
            vec!["User.Read".to_string()],
        )
    }

    #[test]
    fn test_query_encoding() {
        assert_eq!(
            query(&[("$top", "25"), ("$orderby", "receivedDateTime DESC")]),
            "?$top=25&$orderby=receivedDateTime%20DESC"
        );
        assert_eq!(query(&[]), "");
    }

    #[test]
    fn test_resolve_path() {
        let client = client("https://graph.microsoft.com/v1.0/");

        assert_eq!(
            client.resolve_path("/me/messages").unwrap(),
            "https://graph.microsoft.com/v1.0/me/messages"
        );
        assert_eq!(
            client.resolve_path("me").unwrap(),
            "https://graph.microsoft.com/v1.0/me"
        );
        assert_eq!(
            client
                .resolve_path("https://graph.microsoft.com/beta/me")
                .unwrap(),
            "https://graph.microsoft.com/beta/me"
        );
        assert!(matches!(
            client.resolve_path("https://example.com/steal"),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            client.resolve_path("  "),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_request_headers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .and(query_param("$select", "displayName"))
            .and(header("authorization", "Bearer graph-token"))
            .and(header("prefer", "outlook.timezone=\"Pacific Standard Time\""))
            .and(header_exists("client-request-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "displayName": "Adele" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/v1.0", server.uri()));
        let value: Value = client
            .get(
                &format!("/me{}", query(&[("$select", "displayName")])),
                Some("outlook.timezone=\"Pacific Standard Time\""),
            )
            .await
            .unwrap();
        assert_eq!(value["displayName"], "Adele");
    }

    #[tokio::test]
    async fn test_graph_error_envelope() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1.0/users"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": "BadRequest", "message": "Invalid filter clause" }
            })))
            .mount(&server)
            .await;

        let client = client(&format!("{}/v1.0", server.uri()));
        let result: Result<Value, _> = client.get("/users", None).await;
        match result {
            Err(ApiError::Graph { status, code, message }) => {
                assert_eq!(status, 400);
                assert_eq!(code, "BadRequest");
                assert_eq!(message, "Invalid filter clause");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1.0/throttled"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/forbidden"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": "Authorization_RequestDenied", "message": "Insufficient privileges" }
            })))
            .mount(&server)
            .await;

        let client = client(&format!("{}/v1.0", server.uri()));

        let throttled: Result<Value, _> = client.get("/throttled", None).await;
        assert!(matches!(
            throttled,
            Err(ApiError::RateLimited { retry_after: Some(7) })
        ));

        let forbidden: Result<Value, _> = client.get("/forbidden", None).await;
        match forbidden {
            Err(ApiError::Forbidden(message)) => assert_eq!(message, "Insufficient privileges"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
