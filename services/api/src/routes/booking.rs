//! Seat booking, passenger tickets and cancellation

use axum::{
    Json,
    extract::{Path, Query, State},
};
use common::{
    error::DatabaseError,
    models::{NotificationKind, Purpose},
    notifications::NotificationStore,
    verification::CodeTarget,
};
use serde_json::json;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    models::{
        CodeIssuedResponse,
        booking::{
            BookingConfirmRequest, BookingPayload, BookingRequest, CancelTicketRequest,
            CancelTicketResponse, MyFlightsQuery, SeatSelection, TicketListResponse,
        },
    },
    repositories::{PassengerRepository, flight::FlightRepository, ticket::TicketRepository},
    routes::{confirm_code, to_payload},
    seats::seat_exists,
    state::AppState,
    validation::{normalize_seat, optional, validate_code, validate_subject},
};

/// Most seats a single booking may hold
const MAX_SELECTIONS: usize = 10;

/// A selection checked against the current state of its flight
#[derive(Debug, Clone)]
struct ResolvedSeat {
    flight_id: i64,
    flight_number: String,
    seat_no: String,
    price_usd: f64,
}

impl From<&ResolvedSeat> for SeatSelection {
    fn from(seat: &ResolvedSeat) -> Self {
        Self {
            flight_id: seat.flight_id,
            seat_no: seat.seat_no.clone(),
            price_usd: Some(seat.price_usd),
        }
    }
}

/// Check that every selected seat exists, is picked once and is free
async fn resolve_selections(
    conn: &mut SqliteConnection,
    selections: &[SeatSelection],
) -> ApiResult<Vec<ResolvedSeat>> {
    if selections.is_empty() {
        return Err(ApiError::validation("Select at least one seat"));
    }
    if selections.len() > MAX_SELECTIONS {
        return Err(ApiError::validation(format!(
            "At most {} seats can be booked at once",
            MAX_SELECTIONS
        )));
    }

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(selections.len());

    for selection in selections {
        let seat_no = normalize_seat(&selection.seat_no);
        if seat_no.is_empty() {
            return Err(ApiError::validation("Seat number is required"));
        }

        let flight = FlightRepository::find_in(conn, selection.flight_id)
            .await?
            .ok_or_else(|| {
                ApiError::not_found(format!("Flight {} not found", selection.flight_id))
            })?;

        let capacity = usize::try_from(flight.seat_capacity).unwrap_or(0);
        if !seat_exists(&seat_no, capacity) {
            return Err(ApiError::validation(format!(
                "Seat {} does not exist on flight {}",
                seat_no, flight.flight_number
            )));
        }

        if !seen.insert((flight.flight_id, seat_no.clone())) {
            return Err(ApiError::validation(format!(
                "Seat {} on flight {} is selected twice",
                seat_no, flight.flight_number
            )));
        }

        if TicketRepository::is_seat_taken(conn, flight.flight_id, &seat_no).await? {
            return Err(ApiError::conflict(format!(
                "Seat {} on flight {} is already taken",
                seat_no, flight.flight_number
            )));
        }

        let price_usd = selection
            .price_usd
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or(flight.base_price_usd);

        resolved.push(ResolvedSeat {
            flight_id: flight.flight_id,
            flight_number: flight.flight_number,
            seat_no,
            price_usd,
        });
    }

    Ok(resolved)
}

/// Validate a seat selection and issue a booking code for it
pub async fn request_booking(
    State(state): State<AppState>,
    Json(body): Json<BookingRequest>,
) -> ApiResult<Json<CodeIssuedResponse>> {
    let subject = validate_subject(&body.subject)?;

    let seats = {
        let mut conn = state.db_pool.acquire().await?;
        if PassengerRepository::find_in(&mut conn, &subject)
            .await?
            .is_none()
        {
            return Err(ApiError::not_found("Passenger is not registered, sign up first"));
        }
        resolve_selections(&mut conn, &body.selections).await?
    };

    let payload = to_payload(&BookingPayload {
        selections: seats.iter().map(SeatSelection::from).collect(),
    })?;

    let request_id = state
        .verification_store
        .create(
            &subject,
            Purpose::Booking,
            Some(&payload),
            state.settings.require_binding_on_create,
        )
        .await?;

    Ok(Json(CodeIssuedResponse {
        ok: true,
        request_id,
    }))
}

/// Confirm a booking code and issue the tickets it carries
pub async fn confirm_booking(
    State(state): State<AppState>,
    Json(body): Json<BookingConfirmRequest>,
) -> ApiResult<Json<TicketListResponse>> {
    let subject = validate_subject(&body.subject)?;
    let code = validate_code(&body.code)?;
    let request_id = optional(body.request_id.as_deref());
    let target = match request_id.as_deref() {
        Some(id) => CodeTarget::ById(id),
        None => CodeTarget::Latest,
    };

    let mut tx = state.db_pool.begin().await?;

    let request = confirm_code(&state, &mut tx, &subject, Purpose::Booking, target, &code).await?;

    let payload: BookingPayload = request
        .payload
        .and_then(|p| serde_json::from_value(p).ok())
        .unwrap_or_default();
    if payload.selections.is_empty() {
        return Err(ApiError::validation("Booking request carries no seats"));
    }

    if PassengerRepository::find_in(&mut tx, &subject)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Passenger is not registered, sign up first"));
    }

    // Seats may have been taken since the code was requested
    let seats = resolve_selections(&mut tx, &payload.selections).await?;

    let mut tickets = Vec::with_capacity(seats.len());
    for seat in &seats {
        let ticket_id =
            TicketRepository::insert(&mut tx, &subject, seat.flight_id, &seat.seat_no, seat.price_usd)
                .await
                .map_err(|e| seat_conflict(e, seat))?;

        let ticket = TicketRepository::find_in(&mut tx, ticket_id, &subject)
            .await?
            .ok_or(ApiError::InternalServerError)?;
        tickets.push(ticket);
    }

    let booked = to_payload(&tickets)?;
    let notification = json!({ "tickets": booked });
    NotificationStore::enqueue(
        &mut tx,
        &subject,
        NotificationKind::BookingSuccess,
        None,
        Some(&notification),
    )
    .await?;

    tx.commit().await?;
    info!(
        "Booked {} seat(s) for {} with request {}",
        tickets.len(),
        subject,
        request.request_id
    );

    Ok(Json(TicketListResponse { ok: true, tickets }))
}

/// The partial unique index on live seats is the last line against double booking
fn seat_conflict(err: DatabaseError, seat: &ResolvedSeat) -> ApiError {
    if err.is_unique_violation() {
        ApiError::conflict(format!(
            "Seat {} on flight {} is already taken",
            seat.seat_no, seat.flight_number
        ))
    } else {
        ApiError::Database(err)
    }
}

/// Tickets of a passenger
pub async fn my_flights(
    State(state): State<AppState>,
    Query(query): Query<MyFlightsQuery>,
) -> ApiResult<Json<TicketListResponse>> {
    let subject = validate_subject(&query.subject)?;
    let tickets = state.ticket_repository.list_for_subject(&subject).await?;

    Ok(Json(TicketListResponse { ok: true, tickets }))
}

/// Cancel a ticket, freeing its seat
pub async fn cancel_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<i64>,
    Json(body): Json<CancelTicketRequest>,
) -> ApiResult<Json<CancelTicketResponse>> {
    let subject = validate_subject(&body.subject)?;

    let mut tx = state.db_pool.begin().await?;

    let cancelled = TicketRepository::cancel(&mut tx, ticket_id, &subject).await?;
    let ticket = TicketRepository::find_in(&mut tx, ticket_id, &subject)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))?;
    if !cancelled {
        return Err(ApiError::conflict("Ticket is already cancelled"));
    }

    let notification = to_payload(&ticket)?;
    NotificationStore::enqueue(
        &mut tx,
        &subject,
        NotificationKind::BookingCancelled,
        None,
        Some(&notification),
    )
    .await?;

    tx.commit().await?;
    info!("Cancelled ticket {} of {}", ticket_id, subject);

    Ok(Json(CancelTicketResponse { ok: true, ticket }))
}
