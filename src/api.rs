use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::Result;

#[derive(Serialize)]
struct ChatRequest {
    message: String,
}

/// Wire shape of the backend's reply. The server reports application failures
/// as `{success: false, error}` with a non-2xx status, so both fields are
/// optional and the status code is not consulted.
#[derive(Deserialize)]
struct ChatReply {
    success: bool,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// What the server said, once a response was actually obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// `success: true` - the assistant's reply text.
    Reply(String),
    /// `success: false` - the server-supplied error string.
    Failure(String),
}

impl ChatReply {
    fn into_outcome(self) -> ChatOutcome {
        if self.success {
            ChatOutcome::Reply(self.response.unwrap_or_default())
        } else {
            ChatOutcome::Failure(
                self.error
                    .unwrap_or_else(|| "unknown server error".to_string()),
            )
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Post one user message to the assistant backend.
    ///
    /// `Ok` means a well-formed reply was obtained, successful or not;
    /// `Err` means transport failure (connect error, non-JSON body).
    pub async fn send_message(&self, message: &str) -> Result<ChatOutcome> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            message: message.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        let reply: ChatReply = response.json().await?;
        Ok(reply.into_outcome())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest {
            message: "Email Alice about lunch".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "Email Alice about lunch"})
        );
    }

    #[test]
    fn test_success_reply_maps_to_reply() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"success": true, "response": "Email sent to Alice."}"#)
                .unwrap();
        assert_eq!(
            reply.into_outcome(),
            ChatOutcome::Reply("Email sent to Alice.".to_string())
        );
    }

    #[test]
    fn test_failure_reply_maps_to_failure() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"success": false, "error": "Gmail authentication expired"}"#)
                .unwrap();
        assert_eq!(
            reply.into_outcome(),
            ChatOutcome::Failure("Gmail authentication expired".to_string())
        );
    }

    #[test]
    fn test_failure_reply_without_error_text() {
        let reply: ChatReply = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert_eq!(
            reply.into_outcome(),
            ChatOutcome::Failure("unknown server error".to_string())
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ChatClient::new("http://localhost:5000/");
        assert_eq!(client.base_url(), "http://localhost:5000");
    }
}
