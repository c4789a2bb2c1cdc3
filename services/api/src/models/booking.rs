//! Booking, ticket and cancellation models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use common::error::DatabaseError;

/// A seat the passenger wants on a flight
///
/// Stored as the payload of the booking verification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatSelection {
    pub flight_id: i64,
    #[serde(default)]
    pub seat_no: String,
    /// Non-positive or missing prices fall back to the flight's base price
    #[serde(default)]
    pub price_usd: Option<f64>,
}

/// Payload carried by a booking verification request
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BookingPayload {
    #[serde(default)]
    pub selections: Vec<SeatSelection>,
}

/// Request body for `POST /api/booking/request`
#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    #[serde(default, alias = "username")]
    pub subject: String,
    #[serde(default)]
    pub selections: Vec<SeatSelection>,
}

/// Request body for `POST /api/booking/confirm`
#[derive(Debug, Deserialize)]
pub struct BookingConfirmRequest {
    #[serde(default, alias = "username")]
    pub subject: String,
    #[serde(default)]
    pub code: String,
    /// Confirm this request instead of the latest one
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Booked,
    Paid,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Booked => "booked",
            TicketStatus::Paid => "paid",
            TicketStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(TicketStatus::Booked),
            "paid" => Ok(TicketStatus::Paid),
            "cancelled" => Ok(TicketStatus::Cancelled),
            other => Err(DatabaseError::Decode(format!(
                "unknown ticket status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket joined with its flight
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub ticket_id: i64,
    pub flight_id: i64,
    pub flight_number: String,
    pub departure_city: String,
    pub arrival_city: String,
    pub flight_date: String,
    pub flight_time: String,
    pub seat_no: String,
    pub price_usd: f64,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    pub ok: bool,
    pub tickets: Vec<Ticket>,
}

/// Query parameters for `GET /api/my/flights`
#[derive(Debug, Deserialize)]
pub struct MyFlightsQuery {
    #[serde(default, alias = "username")]
    pub subject: String,
}

/// Request body for `POST /api/my/tickets/:ticket_id/cancel`
#[derive(Debug, Deserialize)]
pub struct CancelTicketRequest {
    #[serde(default, alias = "username")]
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct CancelTicketResponse {
    pub ok: bool,
    pub ticket: Ticket,
}
