//! # Store
//!
//! Owns users, events, reservations and campus locations.
//!
//! ## Reservation consistency
//!
//! `reserve_event` is the one operation where concurrency matters: many
//! students may race for the last servings of an event. The memory store runs
//! the availability check, the decrement and the reservation insert inside a
//! single write-lock critical section, so for every event
//!
//! ```text
//! quantity_remaining + sum(confirmed quantity_reserved) == quantity
//! ```
//!
//! holds between any two operations and an event can never be oversold.
//!
//! ## Durability
//!
//! With a data directory every mutation is appended to a MessagePack journal
//! before it becomes visible, and the journal is periodically folded into a
//! snapshot. See [`persistence`].

pub mod memory;
pub mod persistence;
pub mod tables;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Event, EventPatch, Location, NewEvent, ProfilePatch, Reservation, ReserveOutcome, User,
    UserRecord, ValidationError,
};

pub use memory::MemoryStore;
pub use persistence::DurabilityMode;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("not enough servings remaining: requested {requested}, remaining {remaining}")]
    InsufficientServings { requested: u32, remaining: u32 },

    #[error("event is no longer available")]
    EventInactive,

    #[error("{0}")]
    Forbidden(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }
}

/// Which events `Store::events` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    /// Every active event.
    Active,
    /// All events posted by one organizer, inactive ones included.
    Organizer(Uuid),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, record: UserRecord) -> StoreResult<User>;
    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn update_user(&self, id: Uuid, patch: ProfilePatch) -> StoreResult<User>;

    async fn create_event(&self, organizer_id: Uuid, new: NewEvent) -> StoreResult<Event>;
    async fn event_by_id(&self, id: Uuid) -> StoreResult<Option<Event>>;
    async fn events(&self, scope: EventScope) -> StoreResult<Vec<Event>>;
    async fn update_event(&self, id: Uuid, actor: Uuid, patch: EventPatch) -> StoreResult<Event>;
    async fn deactivate_event(&self, id: Uuid, actor: Uuid) -> StoreResult<Event>;

    /// Atomically claims `servings` of an event for `user_id`.
    async fn reserve_event(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        servings: u32,
    ) -> StoreResult<ReserveOutcome>;
    async fn cancel_reservation(&self, reservation_id: Uuid, actor: Uuid)
    -> StoreResult<Reservation>;
    async fn reservations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>>;
    async fn reservations_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Reservation>>;

    async fn insert_location(&self, location: Location) -> StoreResult<Location>;
    async fn locations(&self) -> StoreResult<Vec<Location>>;

    /// Folds the journal into a snapshot. A no-op for memory-only stores.
    async fn checkpoint(&self) -> StoreResult<()>;
}
