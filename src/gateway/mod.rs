//! Outbound messaging gateway.
//!
//! The engine never talks to a messaging platform directly. Every delivery
//! goes through a [`MessagingGateway`], which is expected to know how to
//! reach the platform behind an external account id.

mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

pub use http::HttpGateway;

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a direct message, returning the gateway's message id.
    async fn send_message(
        &self,
        account_id: &str,
        conversation_id: &str,
        text: &str,
        attachments: Option<&Value>,
    ) -> Result<String>;

    /// Publicly reply to a comment under a post.
    async fn reply_to_post(
        &self,
        post_id: &str,
        account_id: &str,
        text: &str,
        comment_id: &str,
    ) -> Result<()>;

    /// Privately message the author of a comment.
    async fn send_private_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        account_id: &str,
        text: &str,
    ) -> Result<()>;
}
