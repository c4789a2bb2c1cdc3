//! Flight search and seat maps

use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::collections::HashMap;

use crate::{
    error::{ApiError, ApiResult},
    models::flight::{FlightListResponse, FlightQuery, Seat, SeatMapResponse},
    seats::seat_labels,
    state::AppState,
    validation::{require, validate_date},
};

/// Search flights by exact route and date
pub async fn search_flights(
    State(state): State<AppState>,
    Query(query): Query<FlightQuery>,
) -> ApiResult<Json<FlightListResponse>> {
    let from = require("Departure city", query.from.as_deref())?;
    let to = require("Arrival city", query.to.as_deref())?;
    let date = validate_date(query.date.as_deref().unwrap_or_default())?;

    let flights = state.flight_repository.search(&from, &to, &date).await?;

    Ok(Json(FlightListResponse { ok: true, flights }))
}

/// Seat map of a flight
pub async fn seat_map(
    State(state): State<AppState>,
    Path(flight_id): Path<i64>,
) -> ApiResult<Json<SeatMapResponse>> {
    let flight = state
        .flight_repository
        .find(flight_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Flight not found"))?;

    let occupied: HashMap<String, _> = state
        .flight_repository
        .occupied_seats(flight_id)
        .await?
        .into_iter()
        .collect();

    let capacity = usize::try_from(flight.seat_capacity).unwrap_or(0);
    let seats = seat_labels(capacity)
        .into_iter()
        .map(|seat_no| {
            let status = occupied
                .get(&seat_no)
                .map(|status| status.to_string())
                .unwrap_or_else(|| "free".to_string());
            Seat { seat_no, status }
        })
        .collect();

    Ok(Json(SeatMapResponse {
        ok: true,
        flight_id,
        capacity: flight.seat_capacity,
        seats,
    }))
}
