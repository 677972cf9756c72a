//! # Chatflow
//!
//! Chatflow is an embeddable engine running conversational automation flows
//! over messaging channels.
//!
//! ## Core Features
//!
//! - **Durable Sessions**: Every contact's progress through a flow is persisted
//!   node by node and resumed by timers, replies or operators
//! - **Closed Node Set**: Messaging, branching, data and control nodes validated
//!   against a JSON schema when a flow is loaded
//! - **Platform Adapters**: One message shape rendered for rich, keyboard and
//!   text-only channels
//! - **Pluggable Storage**: In-memory storage (testing) and PostgreSQL (production)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chatflow::{EngineBuilder, FlowModel, Trigger};
//!
//! let engine = EngineBuilder::new().gateway(gateway).build()?;
//! engine.launch();
//!
//! let flow = FlowModel::from_json(json_str)?;
//! engine.deploy(&flow)?;
//! engine.publish(&flow.id)?;
//! engine.start_or_resume(trigger).await?;
//! ```

mod builder;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
mod events;
pub mod flow;
pub mod gateway;
pub mod llm;
mod model;
mod runtime;
pub mod store;
mod utils;

#[cfg(test)]
mod testing;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use common::Vars;
pub use config::{AiConfig, Config, EngineConfig, GatewayConfig, PostgresConfig, SchedulerConfig, StoreConfig, StoreType};
pub use engine::Engine;
pub use error::ChatflowError;
pub use events::{Event, FlowEvent, Message, PauseReason};
pub use gateway::MessagingGateway;
pub use llm::{ChatMessage, GenerateRequest, TextGenerator};
pub use model::*;
pub use runtime::{Channel, ChannelEvent, ChannelOptions, Inbound, Trigger};
pub use store::Store;

/// Result type alias for Chatflow operations.
pub type Result<T> = std::result::Result<T, ChatflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
