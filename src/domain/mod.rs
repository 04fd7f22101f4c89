//! Domain types shared by the store, the catalog query and the HTTP layer.

pub mod dietary;
pub mod event;
pub mod location;
pub mod reservation;
pub mod user;

use std::fmt;

pub use dietary::{DietaryRestriction, FoodCategory};
pub use event::{CreateEventRequest, Event, EventPatch, EventWithOrganizer, NewEvent};
pub use location::{Location, NewLocation};
pub use reservation::{Reservation, ReservationStatus, ReserveOutcome};
pub use user::{OrganizerSummary, ProfilePatch, SignUp, User, UserRecord, UserRole};

/// Input rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}
