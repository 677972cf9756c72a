//! Hand-off queues between the engine's background tasks.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{
    ChatflowError, Result,
    events::{Event, Message},
    store::data::Job,
};

/// Claimed resume jobs waiting for a scheduler worker.
///
/// Each job is taken by exactly one worker. Jobs still queued when the
/// scheduler stops are handed back through [`JobQueue::drain`].
pub struct JobQueue {
    rx: flume::Receiver<Job>,
    tx: flume::Sender<Job>,
}

impl JobQueue {
    pub fn new(cap: usize) -> Arc<Self> {
        let (tx, rx) = flume::bounded(cap.max(1));
        Arc::new(Self { rx, tx })
    }

    /// Next claimed job, `None` once every sender is gone.
    pub async fn next(&self) -> Option<Job> {
        self.rx.recv_async().await.ok()
    }

    /// Queue a claimed job, waiting while the workers are saturated.
    pub async fn push(
        &self,
        job: Job,
    ) -> Result<()> {
        self.tx.send_async(job).await.map_err(|e| ChatflowError::Queue(format!("job {} not queued", e.into_inner().id)))
    }

    /// Take every job nobody has picked up yet.
    pub fn drain(&self) -> Vec<Job> {
        self.rx.drain().collect()
    }
}

/// Fan-out of flow events to every subscriber.
pub struct EventQueue {
    tx: broadcast::Sender<Event<Message>>,
}

impl EventQueue {
    pub fn new(cap: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(cap);
        Arc::new(Self { tx })
    }

    /// Fails only when nobody is subscribed.
    pub fn send(
        &self,
        event: Event<Message>,
    ) -> Result<()> {
        self.tx.send(event).map_err(|_| ChatflowError::Queue("no event subscriber".into()))?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event<Message>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::JobQueue;
    use crate::store::data::Job;

    fn job(id: &str) -> Job {
        Job {
            id: id.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_jobs_taken_once_and_drained() {
        let queue = JobQueue::new(4);
        for id in ["j1", "j2", "j3"] {
            queue.push(job(id)).await.unwrap();
        }
        assert_eq!(queue.next().await.unwrap().id, "j1");

        let left: Vec<String> = queue.drain().into_iter().map(|j| j.id).collect();
        assert_eq!(left, vec!["j2".to_string(), "j3".to_string()]);
        assert!(queue.drain().is_empty());
    }
}
