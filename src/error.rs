//! Error types for Chatflow.
//!
//! All errors in Chatflow are represented by the `ChatflowError` enum.
//! Most runtime faults (gateway, http, ai provider) never surface here:
//! node executors resolve them locally and record them as failed messages
//! or analytics events. What does surface is configuration and storage.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Chatflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ChatflowError {
    /// Engine-level errors (startup, shutdown, wiring).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Flow definition errors.
    #[error("{0}")]
    Flow(String),

    /// Node definition errors.
    #[error("{0}")]
    Node(String),

    /// Edge definition errors.
    #[error("{0}")]
    Edge(String),

    /// Action execution errors.
    #[error("{0}")]
    Action(String),

    /// Messaging gateway errors.
    #[error("{0}")]
    Gateway(String),

    /// Text-generation provider errors.
    #[error("{0}")]
    Provider(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl From<ChatflowError> for String {
    fn from(val: ChatflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for ChatflowError {
    fn from(error: std::io::Error) -> Self {
        ChatflowError::IoError(error.to_string())
    }
}

impl From<ChatflowError> for std::io::Error {
    fn from(val: ChatflowError) -> Self {
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for ChatflowError {
    fn from(_: FromUtf8Error) -> Self {
        ChatflowError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for ChatflowError {
    fn from(error: serde_json::Error) -> Self {
        ChatflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for ChatflowError {
    fn from(error: toml::de::Error) -> Self {
        ChatflowError::Config(error.to_string())
    }
}

impl From<reqwest::Error> for ChatflowError {
    fn from(error: reqwest::Error) -> Self {
        ChatflowError::Action(format!("Http error: {}", error))
    }
}

impl From<jsonschema::ValidationError<'_>> for ChatflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        ChatflowError::Node(error.to_string())
    }
}
