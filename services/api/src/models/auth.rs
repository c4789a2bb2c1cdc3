//! Code request and confirmation payloads

use chrono::{DateTime, Utc};
use common::{
    format::mask_passport,
    models::{Purpose, RequestStatus, VerificationRequest},
};
use serde::{Deserialize, Serialize};

use crate::models::Passenger;

/// Request body for `POST /api/auth/request-code`
#[derive(Debug, Deserialize)]
pub struct RequestCodeRequest {
    #[serde(default, alias = "username")]
    pub subject: String,
    #[serde(default)]
    pub purpose: String,
}

/// Request body for `POST /api/auth/confirm`
///
/// The passenger fields are only read when confirming a registration.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default, alias = "username")]
    pub subject: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub code: String,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub passport_no: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Validated registration data
#[derive(Debug, Clone)]
pub struct NewPassenger {
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub passport_no: String,
    pub phone: String,
    pub email: String,
}

/// Passenger as returned to the client, with the passport masked
#[derive(Debug, Serialize)]
pub struct PassengerView {
    pub subject: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub passport_masked: String,
    pub phone: String,
    pub email: String,
}

impl From<&Passenger> for PassengerView {
    fn from(p: &Passenger) -> Self {
        Self {
            subject: p.subject.clone(),
            last_name: p.last_name.clone(),
            first_name: p.first_name.clone(),
            middle_name: p.middle_name.clone(),
            passport_masked: mask_passport(&p.passport_no),
            phone: p.phone.clone(),
            email: p.email.clone(),
        }
    }
}

/// Response for `POST /api/auth/confirm`
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub ok: bool,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passenger: Option<PassengerView>,
}

/// Response for `GET /api/requests/:request_id`
#[derive(Debug, Serialize)]
pub struct RequestStatusResponse {
    pub request_id: String,
    pub subject: String,
    pub purpose: Purpose,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
}

impl From<VerificationRequest> for RequestStatusResponse {
    fn from(r: VerificationRequest) -> Self {
        Self {
            request_id: r.request_id,
            subject: r.subject,
            purpose: r.purpose,
            status: r.status,
            created_at: r.created_at,
            sent_at: r.sent_at,
            used_at: r.used_at,
        }
    }
}
