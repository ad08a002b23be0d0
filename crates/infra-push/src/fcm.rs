// FCM legacy HTTP gateway

use async_trait::async_trait;
use medtrack_core::domain::PushMessage;
use medtrack_core::port::{PushError, PushGateway, PushReceipt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_FCM_URL: &str = "https://fcm.googleapis.com/fcm/send";

/// Errors that mean the token will never work again
const INVALID_TOKEN_ERRORS: &[&str] = &["NotRegistered", "InvalidRegistration"];

/// Server key belongs to a different sender; every token would fail the same way
const SENDER_MISMATCH: &str = "MismatchSenderId";

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub url: String,
    /// Legacy server key; empty disables sending
    pub server_key: String,
    pub timeout: Duration,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FCM_URL.to_string(),
            server_key: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct FcmGateway {
    client: reqwest::Client,
    config: FcmConfig,
}

impl FcmGateway {
    pub fn new(config: FcmConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PushError::NotConfigured(format!("HTTP client: {}", e)))?;

        if config.server_key.is_empty() {
            warn!("FCM server key is empty, every push will fail");
        }

        Ok(Self { client, config })
    }
}

/// Request body for /fcm/send
#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
    data: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

/// Response body from /fcm/send
#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    failure: u32,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    message_id: Option<String>,
    error: Option<String>,
}

/// Map a 2xx response body to a receipt or a per-message error
fn interpret_response(body: &str) -> Result<PushReceipt, PushError> {
    let parsed: FcmResponse = serde_json::from_str(body)
        .map_err(|e| PushError::Transport(format!("Invalid FCM response: {}", e)))?;

    let first = parsed.results.into_iter().next();

    if parsed.failure > 0 {
        let error = first
            .and_then(|r| r.error)
            .unwrap_or_else(|| "Unknown".to_string());
        if INVALID_TOKEN_ERRORS.contains(&error.as_str()) {
            return Err(PushError::InvalidToken(error));
        }
        if error == SENDER_MISMATCH {
            return Err(PushError::NotConfigured(format!(
                "FCM server key does not match the sender of this token ({})",
                error
            )));
        }
        return Err(PushError::Rejected(error));
    }

    Ok(PushReceipt {
        message_id: first.and_then(|r| r.message_id),
    })
}

/// Map a non-2xx status
fn interpret_status(status: u16, body: String) -> PushError {
    match status {
        // Server key rejected: retrying will not help
        401 | 403 => PushError::NotConfigured(format!("FCM rejected server key (HTTP {})", status)),
        _ => PushError::Http {
            status,
            message: body,
        },
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(&self, message: &PushMessage) -> Result<PushReceipt, PushError> {
        if self.config.server_key.is_empty() {
            return Err(PushError::NotConfigured("missing FCM server key".to_string()));
        }

        let body = FcmRequest {
            to: &message.to,
            notification: FcmNotification {
                title: &message.title,
                body: &message.body,
            },
            data: &message.data,
        };

        let response = self
            .client
            .post(&self.config.url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("key={}", self.config.server_key),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PushError::Transport(format!(
                        "Request timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else if e.is_connect() {
                    PushError::Transport(format!("Cannot connect to {}", self.config.url))
                } else {
                    PushError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(interpret_status(status.as_u16(), text));
        }

        let receipt = interpret_response(&text)?;
        debug!(message_id = ?receipt.message_id, "FCM accepted message");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_success_response() {
        let receipt = interpret_response(
            r#"{"multicast_id":1,"success":1,"failure":0,"canonical_ids":0,"results":[{"message_id":"0:123"}]}"#,
        )
        .unwrap();
        assert_eq!(receipt.message_id.as_deref(), Some("0:123"));
    }

    #[test]
    fn test_not_registered_is_invalid_token() {
        let err = interpret_response(
            r#"{"success":0,"failure":1,"results":[{"error":"NotRegistered"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err, PushError::InvalidToken("NotRegistered".to_string()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_other_failure_is_retryable() {
        let err = interpret_response(
            r#"{"success":0,"failure":1,"results":[{"error":"Unavailable"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err, PushError::Rejected("Unavailable".to_string()));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_sender_mismatch_keeps_token() {
        let err = interpret_response(
            r#"{"success":0,"failure":1,"results":[{"error":"MismatchSenderId"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PushError::NotConfigured(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_garbage_body_is_transport_error() {
        assert!(matches!(
            interpret_response("<html>"),
            Err(PushError::Transport(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            interpret_status(401, String::new()),
            PushError::NotConfigured(_)
        ));
        assert_eq!(
            interpret_status(503, "down".to_string()),
            PushError::Http {
                status: 503,
                message: "down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_server_key_is_not_sent() {
        let gateway = FcmGateway::new(FcmConfig::default()).unwrap();
        let err = gateway
            .send(&PushMessage {
                to: "tok".to_string(),
                title: "t".to_string(),
                body: "b".to_string(),
                data: json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::NotConfigured(_)));
    }

    /// Fake FCM endpoint recording what it received
    async fn spawn_fake_fcm(reply: Value) -> (String, Arc<Mutex<Vec<(String, Value)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/fcm/send",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let recorder = recorder.clone();
                let reply = reply.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    recorder.lock().unwrap().push((auth, body));
                    Json(reply)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/fcm/send", addr), seen)
    }

    #[tokio::test]
    async fn test_send_wire_format() {
        let (url, seen) = spawn_fake_fcm(json!({
            "success": 1, "failure": 0, "results": [{"message_id": "m-1"}]
        }))
        .await;
        let gateway = FcmGateway::new(FcmConfig {
            url,
            server_key: "secret".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let receipt = gateway
            .send(&PushMessage {
                to: "device-1".to_string(),
                title: "Refill reminder".to_string(),
                body: "You'll run out of Metformin in 2 days.".to_string(),
                data: json!({"type": "refill_alert", "medication_id": "3"}),
            })
            .await
            .unwrap();
        assert_eq!(receipt.message_id.as_deref(), Some("m-1"));

        let seen = seen.lock().unwrap();
        let (auth, body) = &seen[0];
        assert_eq!(auth, "key=secret");
        assert_eq!(body["to"], "device-1");
        assert_eq!(body["notification"]["title"], "Refill reminder");
        assert_eq!(body["data"]["medication_id"], "3");
    }

    #[tokio::test]
    async fn test_send_reports_invalid_token() {
        let (url, _) = spawn_fake_fcm(json!({
            "success": 0, "failure": 1, "results": [{"error": "InvalidRegistration"}]
        }))
        .await;
        let gateway = FcmGateway::new(FcmConfig {
            url,
            server_key: "secret".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = gateway
            .send(&PushMessage {
                to: "stale".to_string(),
                title: "t".to_string(),
                body: "b".to_string(),
                data: json!({}),
            })
            .await
            .unwrap_err();
        assert_eq!(err, PushError::InvalidToken("InvalidRegistration".to_string()));
    }
}
