use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Result,
    flow::{
        NodeId, NodeKind,
        actions::{Action, ActionOutput, Suspend, from_params},
    },
    runtime::Context,
    store::data::{Job, JobStatus, RESUME_FLOW_JOB, ResumePayload, WakeReason},
    utils,
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeUnit {
    #[serde(alias = "second")]
    Seconds,
    #[default]
    #[serde(alias = "minute")]
    Minutes,
    #[serde(alias = "hour")]
    Hours,
    #[serde(alias = "day")]
    Days,
}

impl TimeUnit {
    pub fn millis(&self) -> i64 {
        match self {
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
            TimeUnit::Days => 86_400_000,
        }
    }
}

/// A duration as configured in the editor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Wait {
    pub duration: f64,
    #[serde(default)]
    pub unit: TimeUnit,
}

impl Wait {
    /// Length in milliseconds, saturating at `i64::MAX`.
    pub fn as_millis(&self) -> i64 {
        (self.duration.max(0.0) * self.unit.millis() as f64).round() as i64
    }

    /// Instant this wait ends when started at `now`.
    pub fn deadline(
        &self,
        now: i64,
    ) -> i64 {
        now.saturating_add(self.as_millis())
    }

    pub(crate) fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["duration"],
            "properties": {
                "duration": { "type": "number", "minimum": 0 },
                "unit": {
                    "type": "string",
                    "enum": ["seconds", "minutes", "hours", "days", "second", "minute", "hour", "day"]
                }
            }
        })
    }
}

/// Write a job resuming the current session at `run_at`.
pub(crate) fn schedule_resume(
    ctx: &Context,
    nid: &NodeId,
    run_at: i64,
    reason: WakeReason,
) -> Result<Job> {
    let now = utils::time::time_millis();
    let job = Job {
        id: utils::longid(),
        job_type: RESUME_FLOW_JOB.to_string(),
        session_id: ctx.session_id().to_string(),
        payload: ResumePayload {
            session_id: ctx.session_id().to_string(),
            node_id: nid.clone(),
            flow_id: ctx.flow_id().to_string(),
            channel_id: ctx.channel_id().to_string(),
            contact_id: ctx.contact_id().to_string(),
            conversation_id: ctx.conversation_id().map(str::to_string),
            workspace_id: ctx.workspace_id().to_string(),
            external_account_id: ctx.external_account_id.clone(),
            external_conversation_id: ctx.external_conversation_id.clone(),
            reason,
        },
        run_at,
        status: JobStatus::Pending,
        attempts: 0,
        err: None,
        create_time: now,
        update_time: now,
    };
    ctx.store().jobs().create(&job)?;
    tracing::debug!(session_id = %ctx.session_id(), node_id = %nid, "resume ({}) scheduled at {}", reason.as_ref(), run_at);
    Ok(job)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DelayAction {
    #[serde(flatten)]
    wait: Wait,
}

#[async_trait]
impl Action for DelayAction {
    fn create(params: serde_json::Value) -> Result<Self> {
        from_params(params, &Self::schema())
    }

    fn schema() -> serde_json::Value {
        Wait::schema()
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Delay
    }

    async fn run(
        &self,
        ctx: &Context,
        nid: &NodeId,
    ) -> Result<ActionOutput> {
        let until = self.wait.deadline(utils::time::time_millis());
        schedule_resume(ctx, nid, until, WakeReason::Timer)?;
        Ok(ActionOutput::pause(Suspend::Timer {
            until,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DelayAction, TimeUnit, Wait};
    use crate::{
        flow::actions::{Action, Signal, Suspend},
        store::data::{JobStatus, WakeReason},
        testing::Harness,
        utils,
    };

    #[test]
    fn test_wait_millis() {
        let wait = |duration: f64, unit: TimeUnit| Wait { duration, unit }.as_millis();
        assert_eq!(wait(5.0, TimeUnit::Minutes), 300_000);
        assert_eq!(wait(1.5, TimeUnit::Hours), 5_400_000);
        assert_eq!(wait(2.0, TimeUnit::Days), 172_800_000);
        assert_eq!(wait(-3.0, TimeUnit::Seconds), 0);
        assert_eq!(wait(1e300, TimeUnit::Days), i64::MAX);
        assert_eq!(Wait { duration: 1e300, unit: TimeUnit::Days }.deadline(1_000), i64::MAX);
    }

    #[tokio::test]
    async fn test_huge_delay_stays_in_the_future() {
        let h = Harness::new();
        let action = DelayAction::create(json!({"duration": 1e300, "unit": "days"})).unwrap();

        let out = action.run(&h.context(), &"wait".to_string()).await.unwrap();
        assert_eq!(out.signal, Signal::Pause(Suspend::Timer { until: i64::MAX }));

        let jobs = h.store.pending_jobs("s1").unwrap();
        assert_eq!(jobs[0].run_at, i64::MAX);
        assert!(h.store.due_jobs(utils::time::time_millis(), 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delay_writes_job_and_pauses() {
        let h = Harness::new();
        let action = DelayAction::create(json!({"duration": 5, "unit": "minutes"})).unwrap();
        let before = utils::time::time_millis();

        let out = action.run(&h.context(), &"wait".to_string()).await.unwrap();
        let Signal::Pause(Suspend::Timer { until }) = out.signal else {
            panic!("expected a timer pause, got {:?}", out.signal);
        };
        assert!(until >= before + 300_000);

        let jobs = h.store.pending_jobs("s1").unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].run_at, until);
        assert_eq!(jobs[0].status, JobStatus::Pending);
        assert_eq!(jobs[0].payload.node_id, "wait");
        assert_eq!(jobs[0].payload.flow_id, "f1");
        assert_eq!(jobs[0].payload.reason, WakeReason::Timer);
    }
}
