/// Concurrent reservation tests
///
/// Many students racing for the same event must never push it below zero.
/// Run with: cargo test --test reservation_concurrency
use std::sync::Arc;

use campus_food_share::{
    domain::{CreateEventRequest, NewEvent, ReservationStatus, User, UserRecord, UserRole},
    store::{MemoryStore, Store, StoreError},
};
use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use tokio::sync::Barrier;
use uuid::Uuid;

async fn user(store: &MemoryStore, role: UserRole) -> Uuid {
    let now = Utc::now();
    let id = Uuid::new_v4();
    store
        .insert_user(UserRecord {
            user: User {
                id,
                full_name: "Racer".to_string(),
                email: format!("{id}@bu.edu"),
                role,
                food_restrictions: vec![],
                created_at: now,
                updated_at: now,
            },
            password_hash: "unused".to_string(),
        })
        .await
        .unwrap();
    id
}

async fn event(store: &MemoryStore, organizer: Uuid, quantity: u32) -> Uuid {
    let request: CreateEventRequest = serde_json::from_value(json!({
        "event_name": "Leftover catering",
        "event_location": "Center for Computing & Data Sciences",
        "event_date": "2030-05-01",
        "start_time": "18:00:00",
        "end_time": "19:30:00",
        "quantity": quantity
    }))
    .unwrap();

    store
        .create_event(organizer, NewEvent::try_from(request).unwrap())
        .await
        .unwrap()
        .id
}

async fn assert_balanced(store: &MemoryStore, event_id: Uuid) {
    let event = store.event_by_id(event_id).await.unwrap().unwrap();
    let confirmed: u32 = store
        .reservations_for_event(event_id)
        .await
        .unwrap()
        .iter()
        .filter(|reservation| reservation.status == ReservationStatus::Confirmed)
        .map(|reservation| reservation.quantity_reserved)
        .sum();

    assert_eq!(event.quantity_remaining + confirmed, event.quantity);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_last_servings_go_to_exactly_one_winner_each() {
    let store = Arc::new(MemoryStore::new());
    let organizer = user(&store, UserRole::Organizer).await;
    let servings = 5;
    let event_id = event(&store, organizer, servings).await;

    let num_tasks = 40;
    let barrier = Arc::new(Barrier::new(num_tasks));
    let mut handles = vec![];

    for _ in 0..num_tasks {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        let student = user(&store, UserRole::Student).await;

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            store.reserve_event(event_id, student, 1).await
        }));
    }

    let mut successes = 0;
    let mut sold_out = 0;
    for result in join_all(handles).await {
        match result.unwrap() {
            Ok(_) => successes += 1,
            Err(StoreError::InsufficientServings { requested: 1, remaining: 0 }) => sold_out += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, servings as usize);
    assert_eq!(sold_out, num_tasks - servings as usize);

    let event = store.event_by_id(event_id).await.unwrap().unwrap();
    assert_eq!(event.quantity_remaining, 0);
    assert_balanced(&store, event_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_reserve_and_cancel_keeps_totals_balanced() {
    let store = Arc::new(MemoryStore::new());
    let organizer = user(&store, UserRole::Organizer).await;
    let event_id = event(&store, organizer, 20).await;

    let mut handles = vec![];
    for task_id in 0..10u32 {
        let store = Arc::clone(&store);
        let student = user(&store, UserRole::Student).await;

        handles.push(tokio::spawn(async move {
            for round in 0..5u32 {
                let servings = 1 + (task_id + round) % 3;
                if let Ok(outcome) = store.reserve_event(event_id, student, servings).await
                    && round % 2 == 0
                {
                    store
                        .cancel_reservation(outcome.reservation.id, student)
                        .await
                        .unwrap();
                }
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_balanced(&store, event_id).await;
}
