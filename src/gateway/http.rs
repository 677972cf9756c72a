use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{ChatflowError, Result, config::GatewayConfig};

use super::MessagingGateway;

/// [`MessagingGateway`] speaking JSON over http.
///
/// - `POST {base}/messages` returns `{"messageId": ".."}`
/// - `POST {base}/posts/{postId}/replies`
/// - `POST {base}/comments/{commentId}/private-replies`
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_millis(config.timeout_ms)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post(
        &self,
        path: &str,
        body: Value,
    ) -> Result<Value> {
        let mut request = self.client.post(format!("{}{}", self.base_url, path)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|err| ChatflowError::Gateway(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatflowError::Gateway(format!("gateway returned {}: {}", status, text)));
        }

        let text = response.text().await.map_err(|err| ChatflowError::Gateway(err.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| ChatflowError::Gateway(format!("invalid gateway response: {}", err)))
    }
}

#[async_trait]
impl MessagingGateway for HttpGateway {
    async fn send_message(
        &self,
        account_id: &str,
        conversation_id: &str,
        text: &str,
        attachments: Option<&Value>,
    ) -> Result<String> {
        let body = json!({
            "accountId": account_id,
            "conversationId": conversation_id,
            "text": text,
            "attachments": attachments,
        });
        let resp = self.post("/messages", body).await?;
        resp.get("messageId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChatflowError::Gateway("gateway response has no messageId".to_string()))
    }

    async fn reply_to_post(
        &self,
        post_id: &str,
        account_id: &str,
        text: &str,
        comment_id: &str,
    ) -> Result<()> {
        let body = json!({
            "accountId": account_id,
            "text": text,
            "commentId": comment_id,
        });
        self.post(&format!("/posts/{}/replies", post_id), body).await?;
        Ok(())
    }

    async fn send_private_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        account_id: &str,
        text: &str,
    ) -> Result<()> {
        let body = json!({
            "postId": post_id,
            "accountId": account_id,
            "text": text,
        });
        self.post(&format!("/comments/{}/private-replies", comment_id), body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::HttpGateway;
    use crate::{config::GatewayConfig, gateway::MessagingGateway};

    #[tokio::test]
    async fn test_unreachable_gateway_is_an_error() {
        let gateway = HttpGateway::new(&GatewayConfig {
            base_url: "http://127.0.0.1:1/".to_string(),
            api_key: Some("k".to_string()),
            timeout_ms: 500,
        })
        .unwrap();
        assert!(gateway.send_message("a", "c", "hi", None).await.is_err());
    }
}
