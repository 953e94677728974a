//! JSON-RPC 2.0 program handle over HTTP

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::probe::{ProbeError, ProgramHandle};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Sends each invocation as one JSON-RPC request to a node endpoint
#[derive(Debug, Clone)]
pub struct JsonRpcHandle {
    label: String,
    endpoint: Url,
    client: reqwest::Client,
}

impl JsonRpcHandle {
    /// Build a handle whose requests fail with [`ProbeError::Timeout`] after `timeout`
    pub fn new(
        label: impl Into<String>,
        endpoint: Url,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            label: label.into(),
            endpoint,
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ProgramHandle for JsonRpcHandle {
    fn label(&self) -> &str {
        &self.label
    }

    async fn invoke(&self, method: &str, args: &[Value]) -> Result<String, ProbeError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params: args,
        };
        debug!(endpoint = %self.endpoint, method, "sending rpc request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Rejected(format!("endpoint returned {}", status)));
        }

        let body: RpcResponse = response.json().await.map_err(classify)?;
        identifier_from(body)
    }
}

fn identifier_from(body: RpcResponse) -> Result<String, ProbeError> {
    if let Some(err) = body.error {
        return Err(ProbeError::Rejected(format!("{} (code {})", err.message, err.code)));
    }

    match body.result {
        Some(Value::String(id)) => Ok(id),
        Some(Value::Null) | None => Err(ProbeError::Rejected("empty result".to_string())),
        Some(other) => Ok(other.to_string()),
    }
}

fn classify(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else if err.is_connect() || err.is_request() {
        ProbeError::TransportUnavailable(err.to_string())
    } else {
        ProbeError::Rejected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::probe;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn response(value: Value) -> RpcResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_shape() {
        let params = [json!({"program": "hello"})];
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "initialize",
            params: &params,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": [{"program": "hello"}],
            })
        );
    }

    #[test]
    fn test_string_result_is_identifier() {
        let body = response(json!({"jsonrpc": "2.0", "id": 1, "result": "0xabc"}));
        assert_eq!(identifier_from(body), Ok("0xabc".to_string()));
    }

    #[test]
    fn test_structured_result_is_serialized() {
        let body = response(json!({"jsonrpc": "2.0", "id": 1, "result": {"hash": "0xabc"}}));
        assert_eq!(identifier_from(body), Ok(r#"{"hash":"0xabc"}"#.to_string()));
    }

    #[test]
    fn test_error_object_is_rejection() {
        let body = response(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "Method not found"}
        }));
        assert_eq!(
            identifier_from(body),
            Err(ProbeError::Rejected("Method not found (code -32601)".to_string()))
        );
    }

    #[test]
    fn test_null_result_is_rejection() {
        let body = response(json!({"jsonrpc": "2.0", "id": 1, "result": null}));
        assert!(matches!(identifier_from(body), Err(ProbeError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // nothing listens on port 1
        let endpoint = Url::parse("http://127.0.0.1:1").unwrap();
        let handle = JsonRpcHandle::new("hello", endpoint, Duration::from_secs(5)).unwrap();

        let result = handle.invoke("initialize", &[]).await;
        assert!(matches!(result, Err(ProbeError::TransportUnavailable(_))));
    }

    /// Read one HTTP request, headers and `content-length` body
    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    /// Serve a single connection on a local port. `None` never replies.
    async fn serve_once(reply: Option<String>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            match reply {
                Some(reply) => {
                    stream.write_all(reply.as_bytes()).await.unwrap();
                    let _ = stream.shutdown().await;
                }
                None => tokio::time::sleep(Duration::from_secs(30)).await,
            }
        });

        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    fn http_reply(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    #[tokio::test]
    async fn test_stalled_endpoint_times_out() {
        let endpoint = serve_once(None).await;
        let handle = JsonRpcHandle::new("hello", endpoint, Duration::from_millis(200)).unwrap();

        let result = probe(&handle, "initialize", &[]).await;
        assert!(!result.success);
        assert_eq!(result.error, Some(ProbeError::Timeout));
    }

    #[tokio::test]
    async fn test_server_error_is_rejection() {
        let endpoint = serve_once(Some(http_reply("500 Internal Server Error", ""))).await;
        let handle = JsonRpcHandle::new("hello", endpoint, Duration::from_secs(5)).unwrap();

        match handle.invoke("initialize", &[]).await {
            Err(ProbeError::Rejected(reason)) => assert!(reason.contains("500")),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_string_result_over_http() {
        let body = r#"{"jsonrpc":"2.0","id":1,"result":"5j7s1QjmRKFuDbCWMRVRNibSV2VAAEcNKP6HWU7GwPdX"}"#;
        let endpoint = serve_once(Some(http_reply("200 OK", body))).await;
        let handle = JsonRpcHandle::new("hello", endpoint, Duration::from_secs(5)).unwrap();

        let result = probe(&handle, "initialize", &[]).await;
        assert!(result.success);
        assert_eq!(
            result.identifier.as_deref(),
            Some("5j7s1QjmRKFuDbCWMRVRNibSV2VAAEcNKP6HWU7GwPdX")
        );
    }
}
