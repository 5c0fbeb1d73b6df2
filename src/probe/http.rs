//! HTTP transport for probes, backed by reqwest.

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use std::time::Duration;

use super::{HttpClient, ProbeError, ProbeRequest};

/// Production [`HttpClient`] sharing one connection pool across probes.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("api-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Unexpected(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: ProbeRequest<'_>) -> Result<u16, ProbeError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| ProbeError::Unexpected(format!("{}: {}", request.method, e)))?;

        let mut builder = self
            .client
            .request(method, request.url)
            .timeout(request.timeout);
        for (name, value) in request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProbeError::Unexpected(format!("header {}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ProbeError::Unexpected(format!("header {}: {}", name, e)))?;
            builder = builder.header(header_name, header_value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, request.timeout))?;
        let status = response.status().as_u16();

        // Read the full body to measure complete transfer time
        response
            .bytes()
            .await
            .map_err(|e| classify(e, request.timeout))?;

        Ok(status)
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> ProbeError {
    if err.is_builder() {
        ProbeError::Unexpected(err.to_string())
    } else if err.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if err.is_connect() {
        ProbeError::Connection(err.to_string())
    } else {
        ProbeError::Request(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{check_endpoint, EndpointSpec};
    use std::collections::BTreeMap;

    fn request<'a>(
        method: &'a str,
        url: &'a str,
        headers: &'a BTreeMap<String, String>,
    ) -> ProbeRequest<'a> {
        ProbeRequest {
            method,
            url,
            headers,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_returns_status_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;

        let client = ReqwestClient::new().unwrap();
        let url = format!("{}/health", server.url());
        let headers = BTreeMap::new();
        let status = client.send(request("GET", &url, &headers)).await.unwrap();

        assert_eq!(status, 503);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sends_method_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders")
            .match_header("x-api-key", "secret")
            .with_status(201)
            .create_async()
            .await;

        let client = ReqwestClient::new().unwrap();
        let url = format!("{}/orders", server.url());
        let mut headers = BTreeMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        let status = client.send(request("POST", &url, &headers)).await.unwrap();

        assert_eq!(status, 201);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ReqwestClient::new().unwrap();
        let url = format!("http://{}/", addr);
        let headers = BTreeMap::new();
        let err = client.send(request("GET", &url, &headers)).await.unwrap_err();

        assert!(matches!(err, ProbeError::Connection(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_invalid_method_is_unexpected() {
        let client = ReqwestClient::new().unwrap();
        let headers = BTreeMap::new();
        let err = client
            .send(request("BAD METHOD", "http://127.0.0.1/", &headers))
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Unexpected(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_invalid_header_is_unexpected() {
        let client = ReqwestClient::new().unwrap();
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let err = client
            .send(request("GET", "http://127.0.0.1/", &headers))
            .await
            .unwrap_err();

        match err {
            ProbeError::Unexpected(msg) => assert!(msg.contains("bad header"), "got {:?}", msg),
            other => panic!("expected unexpected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_header_value_reported_on_result() {
        let client = ReqwestClient::new().unwrap();
        let mut spec = EndpointSpec::new("api", "http://127.0.0.1/");
        spec.headers.insert("X-Token".to_string(), "a\nb".to_string());

        let result = check_endpoint(&client, &spec).await;

        assert!(!result.success);
        assert!(result.status_code.is_none());
        let error = result.error.unwrap();
        assert!(error.starts_with("Unexpected error: header X-Token"), "got {:?}", error);
    }

    #[tokio::test]
    async fn test_hanging_endpoint_times_out() {
        // Accept connections but never answer
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = ReqwestClient::new().unwrap();
        let mut spec = EndpointSpec::new("slow", &format!("http://{}/", addr));
        spec.timeout = Duration::from_secs(2);

        let result = check_endpoint(&client, &spec).await;
        assert!(result.timeout);
        assert!(!result.success);
        assert_eq!(result.status_code, None);
        assert!(result.error.unwrap().contains('2'));
        assert!(result.latency_ms >= 2000.0);
    }
}
