//! Convex HTTP API client
//!
//! `POST {url}/api/{query|mutation|action}` with `{path, args, format}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{BackendClient, BackendError, BackendResult, FunctionKind};

#[derive(Debug, Serialize)]
struct FunctionRequest<'a> {
    path: &'a str,
    args: Value,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum FunctionResponse {
    Success {
        #[serde(default)]
        value: Value,
    },
    Error {
        #[serde(rename = "errorMessage", default)]
        error_message: String,
    },
}

pub struct ConvexHttpClient {
    base_url: String,
    deploy_key: Option<String>,
    client: reqwest::Client,
}

impl ConvexHttpClient {
    pub fn new(
        base_url: impl Into<String>,
        deploy_key: Option<String>,
        timeout: Duration,
    ) -> BackendResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            deploy_key,
            client,
        })
    }

    pub fn from_config(config: &cn_config::BackendConfig) -> BackendResult<Self> {
        Self::new(&config.url, config.deploy_key.clone(), config.timeout())
    }
}

#[async_trait]
impl BackendClient for ConvexHttpClient {
    async fn call(&self, kind: FunctionKind, path: &str, args: Value) -> BackendResult<Value> {
        let url = format!("{}/api/{}", self.base_url, kind.as_str());
        debug!(kind = kind.as_str(), path, "Calling backend function");

        let mut request = self.client.post(&url).json(&FunctionRequest {
            path,
            args,
            format: "json",
        });
        if let Some(key) = &self.deploy_key {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Convex {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_server_error() {
            return Err(BackendError::Status { status: status.as_u16(), body });
        }

        match serde_json::from_str::<FunctionResponse>(&body) {
            Ok(FunctionResponse::Success { value }) => Ok(value),
            Ok(FunctionResponse::Error { error_message }) => Err(BackendError::Function(error_message)),
            Err(_) if !status.is_success() => Err(BackendError::Status { status: status.as_u16(), body }),
            Err(e) => Err(BackendError::Decode(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> ConvexHttpClient {
        ConvexHttpClient::new(server.uri(), key.map(String::from), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_success_unwraps_value() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .and(body_json(json!({
                "path": "queries/orders:getOrderById",
                "args": {"orderId": "o1"},
                "format": "json"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "value": {"_id": "o1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server, None)
            .query("queries/orders:getOrderById", json!({"orderId": "o1"}))
            .await
            .unwrap();
        assert_eq!(value, json!({"_id": "o1"}));
    }

    #[tokio::test]
    async fn test_deploy_key_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mutation"))
            .and(header("authorization", "Convex prod:abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "value": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, Some("prod:abc"))
            .mutation("mutations/meals:updateMeal", json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_function_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mutation"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "error",
                "errorMessage": "Order not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .mutation("mutations/orders:updateRefundWindow", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Function(ref m) if m == "Order not found"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = client(&server, None).action("actions/x:y", json!({})).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 503, .. }));
        assert!(err.is_retryable());
    }
}
