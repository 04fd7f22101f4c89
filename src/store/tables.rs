use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Event, Location, Reservation, UserRecord};

use super::persistence::JournalEntry;

/// Row storage behind the memory store and inside snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    pub users: HashMap<Uuid, UserRecord>,
    pub events: HashMap<Uuid, Event>,
    pub reservations: HashMap<Uuid, Reservation>,
    pub locations: HashMap<Uuid, Location>,
}

impl Tables {
    /// Entries are full-row upserts, so applying one twice is harmless.
    pub fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::User(record) => {
                self.users.insert(record.user.id, record);
            }
            JournalEntry::Event(event) => {
                self.events.insert(event.id, event);
            }
            JournalEntry::Reservation(reservation) => {
                self.reservations.insert(reservation.id, reservation);
            }
            JournalEntry::Location(location) => {
                self.locations.insert(location.id, location);
            }
        }
    }

    pub fn row_count(&self) -> usize {
        self.users.len() + self.events.len() + self.reservations.len() + self.locations.len()
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users
            .values()
            .find(|record| record.user.email.eq_ignore_ascii_case(email))
    }
}
