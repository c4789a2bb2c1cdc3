//! Flight search and seat map models

use serde::{Deserialize, Serialize};

/// Flight joined with its plane's capacity
#[derive(Debug, Clone, Serialize)]
pub struct Flight {
    pub flight_id: i64,
    pub flight_number: String,
    pub departure_city: String,
    pub arrival_city: String,
    pub flight_date: String,
    pub flight_time: String,
    pub seat_capacity: i64,
    pub base_price_usd: f64,
}

/// Query parameters for `GET /api/flights`
#[derive(Debug, Deserialize)]
pub struct FlightQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FlightListResponse {
    pub ok: bool,
    pub flights: Vec<Flight>,
}

/// One seat of the map, `status` is `free` or the occupying ticket's status
#[derive(Debug, Serialize)]
pub struct Seat {
    pub seat_no: String,
    pub status: String,
}

/// Response for `GET /api/flights/:flight_id/seats`
#[derive(Debug, Serialize)]
pub struct SeatMapResponse {
    pub ok: bool,
    pub flight_id: i64,
    pub capacity: i64,
    pub seats: Vec<Seat>,
}
