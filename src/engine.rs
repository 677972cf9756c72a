//! Flow engine - the main entry point for Chatflow.
//!
//! The engine owns the collaborators of every traversal and exposes:
//! - Deploying and publishing flow definitions
//! - Starting or resuming sessions for inbound events
//! - Running due resume jobs, in the background or on demand
//! - Session administration and graceful shutdown

mod scheduler;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::runtime::{Handle, Runtime};

use crate::{
    ChatflowError, Config, Result, StoreType,
    common::Shutdown,
    dispatcher::Dispatcher,
    gateway::MessagingGateway,
    llm::TextGenerator,
    model::{FlowModel, FlowStatus},
    runtime::{Channel, Inbound, Services, Tracker, Trigger},
    store::{DbStore, MemStore, PostgresStore, Store, data::Flow},
    utils,
};

use scheduler::Scheduler;

/// The conversational flow engine.
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().config(config).build()?;
/// engine.launch();
///
/// engine.deploy(&flow_model)?;
/// engine.publish(&flow_model.id)?;
///
/// // for every inbound message or trigger
/// engine.start_or_resume(trigger).await?;
///
/// engine.shutdown();
/// ```
pub struct Engine {
    /// Event channel for broadcasting flow events.
    channel: Arc<Channel>,
    /// Persistent storage.
    store: Arc<Store>,
    /// Traversal core.
    dispatcher: Arc<Dispatcher>,
    /// Background resume job runner.
    scheduler: Scheduler,

    /// Flag indicating if the engine is running.
    running: Arc<AtomicBool>,
    /// Runtime built by the engine itself, kept alive with it.
    _runtime: Option<Arc<Runtime>>,
    /// Shutdown coordinator for the background tasks.
    shutdown: Arc<Shutdown>,
}

impl Engine {
    pub(crate) fn new(
        config: Config,
        handle: Handle,
        runtime: Option<Arc<Runtime>>,
        gateway: Arc<dyn MessagingGateway>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        let store = Store::new();
        let db: Box<dyn DbStore> = match config.store.store_type {
            StoreType::Mem => Box::new(MemStore::new()),
            StoreType::Postgres => {
                let postgres = config
                    .store
                    .postgres
                    .as_ref()
                    .ok_or_else(|| ChatflowError::Config("postgres configuration is required when store type is postgres".to_string()))?;
                Box::new(PostgresStore::new(&postgres.database_url, handle.clone())?)
            }
        };
        db.init(&store)?;
        let store = Arc::new(store);

        let channel = Arc::new(Channel::new(handle.clone()));
        let http = reqwest::Client::builder().build()?;
        let scheduler_config = config.scheduler.clone();
        let services = Arc::new(Services {
            config,
            store: store.clone(),
            gateway,
            generator,
            http,
            tracker: Tracker::new(store.clone(), channel.clone()),
        });
        let dispatcher = Arc::new(Dispatcher::new(services));

        let shutdown = Arc::new(Shutdown::new());
        let scheduler = Scheduler::new(dispatcher.clone(), store.clone(), scheduler_config, handle.clone(), shutdown.clone());

        Ok(Self {
            channel,
            store,
            dispatcher,
            scheduler,
            running: Arc::new(AtomicBool::new(false)),
            _runtime: runtime,
            shutdown,
        })
    }

    /// Starts the event channel listener and the job scheduler.
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        self.channel.listen();
        self.scheduler.start();
        tracing::info!("engine launched");
    }

    /// Stops the background tasks.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.shutdown.shutdown();
        self.channel.shutdown();
        tracing::info!("engine shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stores a flow definition. New flows start as drafts; redeploying
    /// bumps the version.
    pub fn deploy(
        &self,
        flow: &FlowModel,
    ) -> Result<Flow> {
        self.store.deploy(flow)
    }

    /// Makes a flow startable. Fails for archived flows.
    pub fn publish(
        &self,
        flow_id: &str,
    ) -> Result<bool> {
        self.store.set_flow_status(flow_id, FlowStatus::Published)
    }

    /// Stops a flow from being started. Running sessions still finish.
    pub fn archive(
        &self,
        flow_id: &str,
    ) -> Result<bool> {
        self.store.set_flow_status(flow_id, FlowStatus::Archived)
    }

    /// Resumes the session waiting for this contact's input on the channel,
    /// or starts the trigger's flow. Returns the id of the session that ran.
    pub async fn start_or_resume(
        &self,
        trigger: Trigger,
    ) -> Result<Option<String>> {
        self.dispatcher.start_or_resume(&trigger).await
    }

    /// Runs the resume jobs due now. Returns how many ran.
    pub async fn run_due_jobs(&self) -> Result<usize> {
        self.scheduler.run_due().await
    }

    /// Continues a parked session.
    pub async fn resume_session(
        &self,
        session_id: &str,
        inbound: Option<Inbound>,
    ) -> Result<Option<String>> {
        self.dispatcher.resume_session(session_id, inbound).await
    }

    /// Cancels an active session and its pending jobs.
    pub async fn cancel_session(
        &self,
        session_id: &str,
    ) -> Result<bool> {
        self.dispatcher.cancel_session(session_id, "cancelled by operator").await
    }

    /// Gives a conversation taken over by a human back to automation.
    pub fn release_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<bool> {
        let conversations = self.store.conversations();
        let Some(mut conversation) = conversations.find(conversation_id)? else {
            return Ok(false);
        };
        conversation.automation_paused = false;
        conversation.update_time = utils::time::time_millis();
        conversations.update(&conversation)
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    /// Returns the store, for seeding contacts and channels or reading results.
    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
