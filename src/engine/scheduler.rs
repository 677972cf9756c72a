use std::{sync::Arc, time::Duration};

use tokio::runtime::Handle;

use crate::{
    Result,
    common::{JobQueue, Shutdown},
    config::SchedulerConfig,
    dispatcher::Dispatcher,
    store::{
        Store,
        data::{Job, JobStatus},
    },
    utils,
};

/// Polls due resume jobs and hands them to a pool of workers.
pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    store: Arc<Store>,
    config: SchedulerConfig,
    queue: Arc<JobQueue>,

    handle: Handle,
    shutdown: Arc<Shutdown>,
}

impl Scheduler {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        store: Arc<Store>,
        config: SchedulerConfig,
        handle: Handle,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let queue = JobQueue::new(config.batch_size.max(1) * 2);
        Self {
            dispatcher,
            store,
            config,
            queue,
            handle,
            shutdown,
        }
    }

    pub fn start(&self) {
        for _ in 0..self.config.workers.max(1) {
            let queue = self.queue.clone();
            let dispatcher = self.dispatcher.clone();
            let store = self.store.clone();
            let shutdown = self.shutdown.clone();
            self.handle.spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        Some(job) = queue.next() => {
                            execute(&dispatcher, &store, job).await;
                        }
                    }
                }
            });
        }

        let store = self.store.clone();
        let dispatcher = self.dispatcher.clone();
        let queue = self.queue.clone();
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(1)));
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => {
                        expire(&dispatcher, &config).await;
                        match claim(&store, config.batch_size, config.claim_lease_secs) {
                            Ok(jobs) => {
                                for job in jobs {
                                    if let Err(err) = queue.push(job).await {
                                        tracing::error!("failed to queue job: {}", err);
                                    }
                                }
                            }
                            Err(err) => tracing::error!("failed to poll jobs: {}", err),
                        }
                    }
                }
            }
            release(&store, &queue);
        });
    }

    /// Claim and run the jobs due now, returning how many ran.
    pub async fn run_due(&self) -> Result<usize> {
        expire(&self.dispatcher, &self.config).await;
        let jobs = claim(&self.store, self.config.batch_size, self.config.claim_lease_secs)?;
        let n = jobs.len();
        for job in jobs {
            execute(&self.dispatcher, &self.store, job).await;
        }
        Ok(n)
    }
}

/// Mark the due jobs `running` so no other poll picks them up.
///
/// Jobs whose claim is older than `lease_secs` were lost by a stopped or
/// crashed worker and are claimed again.
fn claim(
    store: &Store,
    limit: usize,
    lease_secs: u64,
) -> Result<Vec<Job>> {
    let now = utils::time::time_millis();
    let mut due = store.due_jobs(now, limit)?;
    if due.len() < limit {
        let expired = store.expired_claims(now.saturating_sub((lease_secs as i64).saturating_mul(1000)), limit - due.len())?;
        for job in &expired {
            tracing::warn!(job_id = %job.id, session_id = %job.session_id, "claim expired after {} attempts, job claimed again", job.attempts);
        }
        due.extend(expired);
    }

    let jobs = store.jobs();
    let mut claimed = Vec::new();
    for mut job in due {
        job.status = JobStatus::Running;
        job.attempts += 1;
        job.update_time = utils::time::time_millis();
        if jobs.update(&job)? {
            claimed.push(job);
        }
    }
    Ok(claimed)
}

/// Put jobs no worker picked up back to `pending`.
fn release(
    store: &Store,
    queue: &JobQueue,
) {
    let jobs = store.jobs();
    for mut job in queue.drain() {
        job.status = JobStatus::Pending;
        job.update_time = utils::time::time_millis();
        match jobs.update(&job) {
            Ok(_) => tracing::debug!(job_id = %job.id, "job released on shutdown"),
            Err(err) => tracing::error!(job_id = %job.id, "failed to release job: {}", err),
        }
    }
}

async fn execute(
    dispatcher: &Dispatcher,
    store: &Store,
    mut job: Job,
) {
    let outcome = dispatcher.run_job(&job).await;
    match outcome {
        Ok(status) => job.status = status,
        Err(err) => {
            tracing::error!(job_id = %job.id, session_id = %job.session_id, "resume job failed: {}", err);
            job.status = JobStatus::Failed;
            job.err = Some(err.to_string());
        }
    }
    job.update_time = utils::time::time_millis();
    if let Err(err) = store.jobs().update(&job) {
        tracing::error!(job_id = %job.id, "failed to record job outcome: {}", err);
    }
}

async fn expire(
    dispatcher: &Dispatcher,
    config: &SchedulerConfig,
) {
    let Some(ttl) = config.session_ttl_secs else {
        return;
    };
    let before = utils::time::time_millis() - (ttl as i64) * 1000;
    match dispatcher.expire_idle(before, config.batch_size).await {
        Ok(0) => {}
        Ok(n) => tracing::debug!("{} idle sessions expired", n),
        Err(err) => tracing::error!("failed to expire idle sessions: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::{claim, release};
    use crate::{
        common::JobQueue,
        store::data::{Job, JobStatus},
        testing::Harness,
        utils,
    };

    fn job(
        id: &str,
        status: JobStatus,
        update_time: i64,
    ) -> Job {
        Job {
            id: id.into(),
            session_id: "s1".into(),
            run_at: 0,
            status,
            attempts: if status == JobStatus::Running { 1 } else { 0 },
            update_time,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_expired_claims_are_claimed_again() {
        let h = Harness::new();
        let now = utils::time::time_millis();
        h.store.jobs().create(&job("due", JobStatus::Pending, now)).unwrap();
        h.store.jobs().create(&job("lost", JobStatus::Running, now - 120_000)).unwrap();
        h.store.jobs().create(&job("busy", JobStatus::Running, now)).unwrap();

        let mut ids: Vec<String> = claim(&h.store, 10, 60).unwrap().into_iter().map(|j| j.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["due".to_string(), "lost".to_string()]);

        let lost = h.store.jobs().find("lost").unwrap().unwrap();
        assert_eq!(lost.status, JobStatus::Running);
        assert_eq!(lost.attempts, 2);
        assert!(lost.update_time >= now);
        assert!(claim(&h.store, 10, 60).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queued_jobs_released_on_shutdown() {
        let h = Harness::new();
        let now = utils::time::time_millis();
        h.store.jobs().create(&job("j1", JobStatus::Pending, now)).unwrap();

        let queue = JobQueue::new(4);
        for job in claim(&h.store, 10, 300).unwrap() {
            queue.push(job).await.unwrap();
        }
        assert!(h.store.due_jobs(now, 10).unwrap().is_empty());

        release(&h.store, &queue);
        let due = h.store.due_jobs(utils::time::time_millis(), 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "j1");
        assert_eq!(due[0].status, JobStatus::Pending);
    }
}
