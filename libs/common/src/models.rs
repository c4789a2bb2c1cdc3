//! Relay entities shared by the API and the relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DatabaseError;

/// What a verification code unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Register,
    Login,
    Booking,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Register => "register",
            Purpose::Login => "login",
            Purpose::Booking => "booking",
        }
    }

    /// Human readable title used in delivered messages
    pub fn title(&self) -> &'static str {
        match self {
            Purpose::Register => "Registration",
            Purpose::Login => "Sign-in",
            Purpose::Booking => "Booking",
        }
    }
}

impl FromStr for Purpose {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" => Ok(Purpose::Register),
            "login" => Ok(Purpose::Login),
            "booking" => Ok(Purpose::Booking),
            other => Err(DatabaseError::Decode(format!("unknown purpose '{}'", other))),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a verification request
///
/// `Pending -> Sent -> Used`, with side exits to `Cancelled` or `Expired`
/// from `Pending` and `Sent`. The last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Sent,
    Used,
    Cancelled,
    Expired,
}

impl FromStr for RequestStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "sent" => Ok(RequestStatus::Sent),
            "used" => Ok(RequestStatus::Used),
            "cancelled" => Ok(RequestStatus::Cancelled),
            "expired" => Ok(RequestStatus::Expired),
            other => Err(DatabaseError::Decode(format!(
                "unknown request status '{}'",
                other
            ))),
        }
    }
}

/// A one-time-code challenge tied to a subject and a purpose
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRequest {
    pub request_id: String,
    pub subject: String,
    pub purpose: Purpose,
    /// Only set once the relay delivered the code
    #[serde(skip_serializing)]
    pub code: Option<String>,
    pub status: RequestStatus,
    /// Data to act on once the code is confirmed
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Kind of a queued notification, drives message rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RegistrationSuccess,
    BookingSuccess,
    BookingCancelled,
    Generic,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::RegistrationSuccess => "registration_success",
            NotificationKind::BookingSuccess => "booking_success",
            NotificationKind::BookingCancelled => "booking_cancelled",
            NotificationKind::Generic => "generic",
        }
    }

    /// Unknown kinds written by other tools render as a generic message
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "registration_success" => NotificationKind::RegistrationSuccess,
            "booking_success" => NotificationKind::BookingSuccess,
            "booking_cancelled" => NotificationKind::BookingCancelled,
            _ => NotificationKind::Generic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    /// Gave up after too many failed sends
    Failed,
}

impl FromStr for NotificationStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            other => Err(DatabaseError::Decode(format!(
                "unknown notification status '{}'",
                other
            ))),
        }
    }
}

/// A message queued for the relay
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub notification_id: i64,
    pub subject: String,
    pub kind: NotificationKind,
    /// Pre-rendered text, takes precedence over the payload
    pub message: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub status: NotificationStatus,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Subject handle bound to a Telegram chat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelBinding {
    pub subject: String,
    pub chat_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parse an optional JSON text column
pub(crate) fn parse_payload(raw: Option<String>) -> Option<serde_json::Value> {
    raw.filter(|s| !s.trim().is_empty())
        .and_then(|s| serde_json::from_str(&s).ok())
}
