use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    Event, EventPatch, Location, NewEvent, ProfilePatch, Reservation, ReservationStatus,
    ReserveOutcome, User, UserRecord, ValidationError,
};

use super::persistence::{DurabilityMode, JournalEntry, PersistenceManager};
use super::tables::Tables;
use super::{EventScope, Store, StoreError, StoreResult};

/// Tables behind one async `RwLock`, optionally backed by a journal.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

struct Inner {
    tables: Tables,
    persistence: Option<PersistenceManager>,
}

impl Inner {
    /// Journals the entries as one frame, then makes them visible. Once the
    /// frame is written the commit stands, even if the checkpoint after it
    /// fails.
    fn commit(&mut self, entries: Vec<JournalEntry>) -> StoreResult<()> {
        if let Some(persistence) = self.persistence.as_mut() {
            persistence.log(&entries)?;
        }

        for entry in entries {
            self.tables.apply(entry);
        }

        if let Some(persistence) = self.persistence.as_mut()
            && persistence.needs_checkpoint()
            && let Err(err) = persistence.checkpoint(&self.tables)
        {
            warn!(error = %err, "auto checkpoint failed, journal keeps the commit");
        }

        Ok(())
    }

    fn owned_event(&self, id: Uuid, actor: Uuid) -> StoreResult<&Event> {
        let event = self
            .tables
            .events
            .get(&id)
            .ok_or_else(|| StoreError::not_found("event", id))?;

        if event.organizer_id != actor {
            return Err(StoreError::Forbidden(
                "only the organizer can change this event".to_string(),
            ));
        }

        Ok(event)
    }
}

impl MemoryStore {
    /// Memory-only store; nothing survives the process.
    pub fn new() -> Self {
        Self::from_tables(Tables::default(), None)
    }

    /// Opens a durable store in `data_dir`, recovering whatever was there.
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        mode: DurabilityMode,
        checkpoint_every: usize,
    ) -> StoreResult<Self> {
        let mut persistence =
            PersistenceManager::open(data_dir.as_ref(), mode, checkpoint_every)?;
        let tables = persistence.recover()?.unwrap_or_default();

        info!(
            data_dir = %data_dir.as_ref().display(),
            users = tables.users.len(),
            events = tables.events.len(),
            reservations = tables.reservations.len(),
            "durable store opened"
        );

        Ok(Self::from_tables(tables, Some(persistence)))
    }

    fn from_tables(tables: Tables, persistence: Option<PersistenceManager>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                tables,
                persistence,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, record: UserRecord) -> StoreResult<User> {
        let mut inner = self.inner.write().await;

        if inner.tables.find_user_by_email(&record.user.email).is_some() {
            return Err(StoreError::Conflict(
                "user with this email already exists".to_string(),
            ));
        }

        let user = record.user.clone();
        inner.commit(vec![JournalEntry::User(record)])?;
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.tables.users.get(&id).map(|record| record.user.clone()))
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.tables.find_user_by_email(email).cloned())
    }

    async fn update_user(&self, id: Uuid, patch: ProfilePatch) -> StoreResult<User> {
        patch.validate()?;

        let mut inner = self.inner.write().await;
        let mut record = inner
            .tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))?;

        patch.apply(&mut record.user, Utc::now());
        let user = record.user.clone();
        inner.commit(vec![JournalEntry::User(record)])?;
        Ok(user)
    }

    async fn create_event(&self, organizer_id: Uuid, new: NewEvent) -> StoreResult<Event> {
        let mut inner = self.inner.write().await;

        if !inner.tables.users.contains_key(&organizer_id) {
            return Err(StoreError::not_found("user", organizer_id));
        }
        if let Some(location_id) = new.location_id
            && !inner.tables.locations.contains_key(&location_id)
        {
            return Err(StoreError::not_found("location", location_id));
        }

        let event = Event::from_new(Uuid::new_v4(), organizer_id, new, Utc::now());
        inner.commit(vec![JournalEntry::Event(event.clone())])?;

        debug!(event_id = %event.id, %organizer_id, quantity = event.quantity, "event created");
        Ok(event)
    }

    async fn event_by_id(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let inner = self.inner.read().await;
        Ok(inner.tables.events.get(&id).cloned())
    }

    async fn events(&self, scope: EventScope) -> StoreResult<Vec<Event>> {
        let inner = self.inner.read().await;
        let events = inner.tables.events.values().filter(|event| match scope {
            EventScope::Active => event.is_active,
            EventScope::Organizer(organizer_id) => event.organizer_id == organizer_id,
        });

        Ok(events.cloned().collect())
    }

    async fn update_event(&self, id: Uuid, actor: Uuid, patch: EventPatch) -> StoreResult<Event> {
        patch.validate()?;

        let mut inner = self.inner.write().await;
        let mut event = inner.owned_event(id, actor)?.clone();

        if let Some(quantity) = patch.quantity {
            let reserved = event.reserved();
            if quantity < reserved {
                return Err(StoreError::Conflict(format!(
                    "quantity cannot drop below the {reserved} servings already reserved"
                )));
            }
        }
        if let Some(Some(location_id)) = patch.location_id
            && !inner.tables.locations.contains_key(&location_id)
        {
            return Err(StoreError::not_found("location", location_id));
        }

        patch.apply(&mut event, Utc::now())?;
        inner.commit(vec![JournalEntry::Event(event.clone())])?;
        Ok(event)
    }

    async fn deactivate_event(&self, id: Uuid, actor: Uuid) -> StoreResult<Event> {
        let mut inner = self.inner.write().await;
        let mut event = inner.owned_event(id, actor)?.clone();

        if !event.is_active {
            return Err(StoreError::EventInactive);
        }

        event.is_active = false;
        event.updated_at = Utc::now();
        inner.commit(vec![JournalEntry::Event(event.clone())])?;
        Ok(event)
    }

    async fn reserve_event(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        servings: u32,
    ) -> StoreResult<ReserveOutcome> {
        if servings == 0 {
            return Err(ValidationError::new("servings must be at least 1").into());
        }

        // Check, decrement and insert under one write guard.
        let mut inner = self.inner.write().await;

        if !inner.tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }

        let mut event = inner
            .tables
            .events
            .get(&event_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("event", event_id))?;

        if !event.is_active {
            return Err(StoreError::EventInactive);
        }
        if event.quantity_remaining < servings {
            return Err(StoreError::InsufficientServings {
                requested: servings,
                remaining: event.quantity_remaining,
            });
        }

        let now = Utc::now();
        event.quantity_remaining -= servings;
        event.updated_at = now;
        let reservation = Reservation::confirmed(user_id, event_id, servings, now);
        let new_quantity_remaining = event.quantity_remaining;

        inner.commit(vec![
            JournalEntry::Event(event),
            JournalEntry::Reservation(reservation.clone()),
        ])?;

        Ok(ReserveOutcome {
            reservation,
            new_quantity_remaining,
        })
    }

    async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
        actor: Uuid,
    ) -> StoreResult<Reservation> {
        let mut inner = self.inner.write().await;

        let mut reservation = inner
            .tables
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("reservation", reservation_id))?;

        if reservation.user_id != actor {
            return Err(StoreError::Forbidden(
                "only the reserving user can cancel this reservation".to_string(),
            ));
        }
        if !reservation.is_confirmed() {
            return Err(StoreError::Conflict(
                "reservation is already cancelled".to_string(),
            ));
        }

        let mut event = inner
            .tables
            .events
            .get(&reservation.event_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("event", reservation.event_id))?;

        let now = Utc::now();
        event.quantity_remaining =
            (event.quantity_remaining + reservation.quantity_reserved).min(event.quantity);
        event.updated_at = now;
        reservation.status = ReservationStatus::Cancelled;
        reservation.updated_at = now;

        inner.commit(vec![
            JournalEntry::Event(event),
            JournalEntry::Reservation(reservation.clone()),
        ])?;

        Ok(reservation)
    }

    async fn reservations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let inner = self.inner.read().await;
        let mut reservations: Vec<Reservation> = inner
            .tables
            .reservations
            .values()
            .filter(|reservation| reservation.user_id == user_id)
            .cloned()
            .collect();

        reservations.sort_by(|a, b| {
            b.reserved_at
                .cmp(&a.reserved_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(reservations)
    }

    async fn reservations_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let inner = self.inner.read().await;
        let mut reservations: Vec<Reservation> = inner
            .tables
            .reservations
            .values()
            .filter(|reservation| reservation.event_id == event_id)
            .cloned()
            .collect();

        reservations.sort_by(|a, b| {
            a.reserved_at
                .cmp(&b.reserved_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(reservations)
    }

    async fn insert_location(&self, location: Location) -> StoreResult<Location> {
        let mut inner = self.inner.write().await;

        if inner
            .tables
            .locations
            .values()
            .any(|existing| existing.slug == location.slug)
        {
            return Err(StoreError::Conflict(format!(
                "location '{}' already exists",
                location.slug
            )));
        }

        inner.commit(vec![JournalEntry::Location(location.clone())])?;
        Ok(location)
    }

    async fn locations(&self) -> StoreResult<Vec<Location>> {
        let inner = self.inner.read().await;
        let mut locations: Vec<Location> = inner
            .tables
            .locations
            .values()
            .filter(|location| location.is_active)
            .cloned()
            .collect();

        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn checkpoint(&self) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        if let Some(persistence) = inner.persistence.as_mut() {
            persistence.checkpoint(&inner.tables)?;
        }
        Ok(())
    }
}
