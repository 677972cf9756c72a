/// Handle taken by a condition whose rules hold.
pub const TRUE_HANDLE: &str = "true";
/// Handle taken by a condition whose rules do not hold.
pub const FALSE_HANDLE: &str = "false";
/// Handle taken when a smart-delay gives up waiting.
pub const TIMEOUT_HANDLE: &str = "timeout";

/// Text of the inbound message that resumed a session.
pub const LAST_INPUT_VAR: &str = "last_input";
/// Payload of the inbound message that resumed a session.
pub const LAST_PAYLOAD_VAR: &str = "last_payload";
/// Options offered on a text-only platform, as JSON.
pub const QUICK_REPLIES_VAR: &str = "quick_replies";
/// Reply produced by the last ai-response node.
pub const AI_RESPONSE_VAR: &str = "ai_response";
/// Post of the comment that fired the flow.
pub const POST_ID_VAR: &str = "post_id";
/// Comment that fired the flow.
pub const COMMENT_ID_VAR: &str = "comment_id";
