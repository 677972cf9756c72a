use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

/// Job type resuming a paused session.
pub const RESUME_FLOW_JOB: &str = "resume_flow";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Done,
    /// fired against a session that had already moved on
    Skipped,
    Failed,
    Cancelled,
}

/// What a resume job wakes a session from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WakeReason {
    /// a delay node elapsed
    #[default]
    Timer,
    /// a smart-delay node gave up waiting for input
    Timeout,
}

/// Everything the resume path needs to rebuild an execution context.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResumePayload {
    pub session_id: String,
    pub node_id: String,
    pub flow_id: String,
    pub channel_id: String,
    pub contact_id: String,
    pub conversation_id: Option<String>,
    pub workspace_id: String,
    pub external_account_id: Option<String>,
    pub external_conversation_id: Option<String>,
    #[serde(default)]
    pub reason: WakeReason,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Job {
    pub id: String,
    pub job_type: String,
    pub session_id: String,
    pub payload: ResumePayload,
    /// due time in milliseconds
    pub run_at: i64,
    pub status: JobStatus,
    pub attempts: i64,
    pub err: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Job {
    fn iden() -> StoreIden {
        StoreIden::Jobs
    }
}
