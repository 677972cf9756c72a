//! Storage layer for flows, sessions, contacts and the records the engine writes.
//!
//! Provides an abstraction over different storage backends:
//! - `MemStore`: In-memory storage for testing and embedding
//! - `PostgresStore`: PostgreSQL for production persistence

pub mod data;
mod db;
pub mod query;
mod store;

use std::error::Error;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

use crate::{ChatflowError, Result};

pub use db::{MemStore, PostgresStore};
pub use query::{Cond, Op, Query};
pub use store::Store;

/// Maps database errors to ChatflowError.
fn map_db_err(err: impl Error) -> ChatflowError {
    ChatflowError::Store(err.to_string())
}

/// Identifiers for different storage collections.
#[derive(Debug, Clone, AsRefStr, PartialEq, Hash, Eq, EnumIter)]
pub enum StoreIden {
    /// Flow definitions.
    #[strum(serialize = "flows")]
    Flows,
    /// Connected messaging channels.
    #[strum(serialize = "channels")]
    Channels,
    /// Contacts.
    #[strum(serialize = "contacts")]
    Contacts,
    /// Conversations between a contact and a channel.
    #[strum(serialize = "conversations")]
    Conversations,
    /// Inbound and outbound messages.
    #[strum(serialize = "messages")]
    Messages,
    /// Workspace tags.
    #[strum(serialize = "tags")]
    Tags,
    /// Contact to tag associations.
    #[strum(serialize = "contact_tags")]
    ContactTags,
    /// Custom field definitions.
    #[strum(serialize = "field_definitions")]
    FieldDefinitions,
    /// Custom field values per contact.
    #[strum(serialize = "field_values")]
    FieldValues,
    /// Execution sessions.
    #[strum(serialize = "sessions")]
    Sessions,
    /// Scheduled jobs.
    #[strum(serialize = "jobs")]
    Jobs,
    /// Analytics events.
    #[strum(serialize = "analytics")]
    Analytics,
}

/// Paginated query result.
#[derive(Debug, Deserialize, Serialize)]
pub struct PageData<T> {
    /// Total number of matching records.
    pub count: usize,
    /// Current page number (1-based).
    pub page_num: usize,
    /// Total number of pages.
    pub page_count: usize,
    /// Number of records per page.
    pub page_size: usize,
    /// Records in the current page.
    pub rows: Vec<T>,
}

/// Trait for types that can identify their storage collection.
pub trait DbCollectionIden {
    /// Returns the collection identifier for this type.
    fn iden() -> StoreIden;
}

/// Trait for database collection operations.
pub trait DbCollection: Send + Sync {
    /// The type of items stored in this collection.
    type Item;

    /// Checks if a record with the given ID exists.
    fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Finds a record by ID, `None` when it does not exist.
    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>>;

    /// Queries records with pagination and filtering.
    fn query(
        &self,
        query: &Query,
    ) -> Result<PageData<Self::Item>>;

    /// Creates a new record. Returns `false` when a record with the same
    /// id (or unique key) already exists.
    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Updates an existing record.
    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Inserts the record or replaces the one with the same id.
    fn upsert(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Deletes a record by ID.
    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// Trait for database store initialization.
pub trait DbStore {
    /// Initializes the database and registers collections with the store.
    fn init(
        &self,
        s: &Store,
    ) -> Result<()>;
}
