use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity_reserved: u32,
    pub status: ReservationStatus,
    pub reserved_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn confirmed(user_id: Uuid, event_id: Uuid, servings: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            quantity_reserved: servings,
            status: ReservationStatus::Confirmed,
            reserved_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }
}

/// Result of a successful `reserve_event` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReserveOutcome {
    pub reservation: Reservation,
    pub new_quantity_remaining: u32,
}
