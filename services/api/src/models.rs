//! API models for request and response payloads

use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod auth;
pub mod booking;
pub mod flight;

/// Registered passenger, keyed by subject
#[derive(Debug, Clone, Serialize)]
pub struct Passenger {
    pub subject: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    /// Stored in full, only ever shown masked
    #[serde(skip_serializing)]
    pub passport_no: String,
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Passenger {
    /// "Last First Middle", skipping a missing middle name
    pub fn full_name(&self) -> String {
        match &self.middle_name {
            Some(middle) => format!("{} {} {}", self.last_name, self.first_name, middle),
            None => format!("{} {}", self.last_name, self.first_name),
        }
    }
}

/// Generic `{ok, request_id}` response for endpoints that issue a code
#[derive(Debug, Serialize)]
pub struct CodeIssuedResponse {
    pub ok: bool,
    pub request_id: String,
}
