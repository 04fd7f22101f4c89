use std::collections::HashMap;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, MaybeAuthUser},
    catalog::{self, CatalogStats, EventQuery, Page},
    domain::{
        CreateEventRequest, Event, EventPatch, EventWithOrganizer, NewEvent, OrganizerSummary,
        Reservation, User,
    },
    error::{AppError, AppResult},
    handlers::uploads::read_image_field,
    models::ApiResponse,
    state::AppState,
    store::EventScope,
};

pub async fn list_events(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<ApiResponse<Page<EventWithOrganizer>>>> {
    let selected = visible_events(&state, viewer.as_ref(), &query).await?;
    let page = catalog::paginate(selected, query.page, query.per_page);

    let items = with_organizers(&state, page.items).await?;

    Ok(Json(ApiResponse::new(Page {
        items,
        page: page.page,
        per_page: page.per_page,
        total: page.total,
        total_pages: page.total_pages,
    })))
}

/// Headline numbers for the browse page, over the same events the listing shows.
pub async fn event_stats(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<ApiResponse<CatalogStats>>> {
    let selected = visible_events(&state, viewer.as_ref(), &query).await?;
    Ok(Json(ApiResponse::new(catalog::stats(&selected))))
}

/// Active events after search, dietary, tag and week filters, in listing order.
async fn visible_events(
    state: &AppState,
    viewer: Option<&User>,
    query: &EventQuery,
) -> AppResult<Vec<Event>> {
    query.validate()?;

    let restrictions = viewer
        .map(|user| user.food_restrictions.as_slice())
        .unwrap_or_default();

    let events = state.store.events(EventScope::Active).await?;
    Ok(catalog::select(events, query, restrictions, Utc::now().date_naive()))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<EventWithOrganizer>>> {
    let event = state
        .store
        .event_by_id(id)
        .await?
        .filter(|event| event.is_active)
        .ok_or_else(|| AppError::not_found("event not found"))?;

    let mut items = with_organizers(&state, vec![event]).await?;
    let event = items.pop().ok_or_else(AppError::internal)?;

    Ok(Json(ApiResponse::new(event)))
}

pub async fn create_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateEventRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Event>>)> {
    auth.require_organizer()?;

    let new = NewEvent::try_from(payload)?;
    let event = state.store.create_event(auth.user.id, new).await?;

    info!(
        event_id = %event.id,
        organizer_id = %auth.user.id,
        quantity = event.quantity,
        "event posted"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::new(event))))
}

pub async fn patch_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> AppResult<Json<ApiResponse<Event>>> {
    auth.require_organizer()?;

    let event = state.store.update_event(id, auth.user.id, patch).await?;
    Ok(Json(ApiResponse::new(event)))
}

pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require_organizer()?;

    state.store.deactivate_event(id, auth.user.id).await?;
    info!(event_id = %id, organizer_id = %auth.user.id, "event taken down");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn event_reservations(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Reservation>>>> {
    owned_event(&state, id, &auth).await?;

    let reservations = state.store.reservations_for_event(id).await?;
    Ok(Json(ApiResponse::new(reservations)))
}

/// Uploads an image and points the event at it.
pub async fn attach_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Event>>> {
    owned_event(&state, id, &auth).await?;

    let field = read_image_field(multipart).await?;
    let image = state
        .images
        .save(
            auth.user.id,
            field.file_name.as_deref(),
            &field.content_type,
            &field.bytes,
        )
        .await?;

    let patch = EventPatch {
        event_image: Some(Some(image.url)),
        ..EventPatch::default()
    };
    let event = state.store.update_event(id, auth.user.id, patch).await?;

    Ok(Json(ApiResponse::new(event)))
}

async fn owned_event(state: &AppState, id: Uuid, auth: &AuthUser) -> AppResult<Event> {
    let event = state
        .store
        .event_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("event not found"))?;

    if event.organizer_id != auth.user.id {
        return Err(AppError::forbidden("only the event organizer can do this"));
    }

    Ok(event)
}

async fn with_organizers(
    state: &AppState,
    events: Vec<Event>,
) -> AppResult<Vec<EventWithOrganizer>> {
    let mut organizers: HashMap<Uuid, Option<OrganizerSummary>> = HashMap::new();
    let mut items = Vec::with_capacity(events.len());

    for event in events {
        let organizer = match organizers.get(&event.organizer_id) {
            Some(summary) => summary.clone(),
            None => {
                let summary = state
                    .store
                    .user_by_id(event.organizer_id)
                    .await?
                    .as_ref()
                    .map(OrganizerSummary::from);
                organizers.insert(event.organizer_id, summary.clone());
                summary
            }
        };

        items.push(EventWithOrganizer { event, organizer });
    }

    Ok(items)
}
