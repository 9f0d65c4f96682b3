use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::form_urlencoded;

use super::{DispatchError, NotificationRequest, NotificationSink};
use crate::util::truncate_chars;

pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

// Pushover field limits, in characters
const MAX_MESSAGE_CHARS: usize = 1024;
const MAX_TITLE_CHARS: usize = 250;
const MAX_URL_CHARS: usize = 512;

const SINK_NAME: &str = "pushover";

/// Body of a Pushover API response.
#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i64,
    #[serde(default)]
    errors: Vec<String>,
}

/// Sends each entry as a Pushover message to one user or group key.
pub struct PushoverSink {
    client: reqwest::Client,
    endpoint: String,
    app_token: SecretString,
    user_key: SecretString,
}

impl PushoverSink {
    pub fn new(client: reqwest::Client, app_token: SecretString, user_key: SecretString) -> Self {
        Self {
            client,
            endpoint: PUSHOVER_API_URL.to_string(),
            app_token,
            user_key,
        }
    }

    /// Points the sink at a different API URL (self-hosted relay, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn form_body(&self, request: &NotificationRequest) -> String {
        let title = truncate_chars(request.title.trim(), MAX_TITLE_CHARS);

        // Pushover rejects blank messages
        let message = [
            request.plain_text_body.trim(),
            request.title.trim(),
            request.link.as_deref().unwrap_or("").trim(),
        ]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("(no content)");
        let message = truncate_chars(message, MAX_MESSAGE_CHARS);

        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("token", self.app_token.expose_secret())
            .append_pair("user", self.user_key.expose_secret())
            .append_pair("message", &message);
        if !title.is_empty() {
            form.append_pair("title", &title);
        }
        if let Some(link) = request.link.as_deref() {
            if link.chars().count() <= MAX_URL_CHARS {
                form.append_pair("url", link);
            }
        }
        form.finish()
    }
}

impl std::fmt::Debug for PushoverSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverSink")
            .field("endpoint", &self.endpoint)
            .field("app_token", &"[REDACTED]")
            .field("user_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl NotificationSink for PushoverSink {
    fn name(&self) -> &'static str {
        SINK_NAME
    }

    async fn dispatch(&self, request: &NotificationRequest) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.form_body(request))
            .send()
            .await
            .map_err(|source| DispatchError::Network {
                sink: SINK_NAME,
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<PushoverResponse>(&body) {
                Ok(parsed) if !parsed.errors.is_empty() => {
                    format!("HTTP {}: {}", status, parsed.errors.join("; "))
                }
                _ => format!("HTTP {}", status),
            };
            return Err(DispatchError::Rejected {
                sink: SINK_NAME,
                reason,
            });
        }

        let body = response.text().await.map_err(|source| DispatchError::Network {
            sink: SINK_NAME,
            source,
        })?;
        match serde_json::from_str::<PushoverResponse>(&body) {
            Ok(parsed) if parsed.status == 1 => {
                tracing::debug!(title = %request.title, "Pushover message accepted");
                Ok(())
            }
            Ok(parsed) => Err(DispatchError::Rejected {
                sink: SINK_NAME,
                reason: if parsed.errors.is_empty() {
                    format!("status {}", parsed.status)
                } else {
                    parsed.errors.join("; ")
                },
            }),
            // 2xx with an unexpected body: the message was accepted
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable Pushover response body");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink(server: &MockServer) -> PushoverSink {
        PushoverSink::new(
            reqwest::Client::new(),
            SecretString::from("app-token".to_string()),
            SecretString::from("user-key".to_string()),
        )
        .with_endpoint(format!("{}/1/messages.json", server.uri()))
    }

    fn request() -> NotificationRequest {
        NotificationRequest {
            title: "New post".into(),
            plain_text_body: "Body text".into(),
            rich_text_body: "<p>Body text</p>".into(),
            link: Some("https://example.com/post".into()),
        }
    }

    #[tokio::test]
    async fn test_dispatch_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/messages.json"))
            .and(header("Content-Type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("token=app-token"))
            .and(body_string_contains("user=user-key"))
            .and(body_string_contains("message=Body+text"))
            .and(body_string_contains("title=New+post"))
            .and(body_string_contains("url=https%3A%2F%2Fexample.com%2Fpost"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"status":1,"request":"abc"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        sink(&server).dispatch(&request()).await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_body_falls_back_to_title() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("message=New+post"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request();
        req.plain_text_body = String::new();
        sink(&server).dispatch(&req).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_with_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"user":"invalid","errors":["user identifier is invalid"],"status":0}"#,
            ))
            .mount(&server)
            .await;

        let err = sink(&server).dispatch(&request()).await.unwrap_err();
        match err {
            DispatchError::Rejected { sink, reason } => {
                assert_eq!(sink, "pushover");
                assert!(reason.contains("user identifier is invalid"), "{}", reason);
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_zero_on_200_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"status":0,"errors":["nope"]}"#),
            )
            .mount(&server)
            .await;

        let err = sink(&server).dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { .. }));
    }

    #[test]
    fn test_debug_masks_keys() {
        let sink = PushoverSink::new(
            reqwest::Client::new(),
            SecretString::from("super-secret-token".to_string()),
            SecretString::from("super-secret-user".to_string()),
        );
        let debug = format!("{:?}", sink);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
