//! Rendering of delivered messages
//!
//! Messages are sent with HTML parse mode, so every value that comes from a
//! user goes through [`escape_html`].

use common::{
    format::mask_passport,
    models::{Notification, NotificationKind, Purpose},
};
use serde_json::Value;

/// Escape the characters Telegram's HTML mode treats as markup
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Message carrying a verification code
pub fn code_message(code: &str, purpose: Purpose) -> String {
    format!(
        "Verification code: <b>{}</b>\nPurpose: <b>{}</b>\n\nEnter this code in the web app.",
        code,
        purpose.title()
    )
}

fn field<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// One line describing a ticket
fn ticket_line(ticket: &Value) -> String {
    let mut line = format!(
        "• <b>{}</b> {} → {}, {} {}, seat <b>{}</b>",
        escape_html(field(ticket, "flight_number")),
        escape_html(field(ticket, "departure_city")),
        escape_html(field(ticket, "arrival_city")),
        escape_html(field(ticket, "flight_date")),
        escape_html(field(ticket, "flight_time")),
        escape_html(field(ticket, "seat_no")),
    );
    if let Some(price) = ticket.get("price_usd").and_then(Value::as_f64) {
        line.push_str(&format!(", ${:.2}", price));
    }
    line
}

/// Text of a queued notification
///
/// A literal message wins. Otherwise the payload is rendered according to the
/// notification kind.
pub fn notification_message(notification: &Notification) -> String {
    if let Some(message) = notification
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
    {
        return message.to_string();
    }

    let empty = Value::Null;
    let payload = notification.payload.as_ref().unwrap_or(&empty);

    match notification.kind {
        NotificationKind::RegistrationSuccess => format!(
            "✅ Registration complete.\n\nName: <b>{}</b>\nPassport: <b>{}</b>",
            escape_html(field(payload, "full_name")),
            escape_html(&mask_passport(field(payload, "passport_no"))),
        ),
        NotificationKind::BookingSuccess => {
            let lines: Vec<String> = payload
                .get("tickets")
                .and_then(Value::as_array)
                .map(|tickets| tickets.iter().map(ticket_line).collect())
                .unwrap_or_default();

            if lines.is_empty() {
                "✅ Booking confirmed.".to_string()
            } else {
                format!("✅ Booking confirmed.\n\n{}", lines.join("\n"))
            }
        }
        NotificationKind::BookingCancelled => match payload.get("ticket_id").and_then(Value::as_i64) {
            Some(ticket_id) => format!(
                "❌ Ticket #{} cancelled.\n\n{}",
                ticket_id,
                ticket_line(payload)
            ),
            None => "❌ Ticket cancelled.".to_string(),
        },
        NotificationKind::Generic => "✅ Done.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::models::NotificationStatus;
    use serde_json::json;

    fn notification(kind: NotificationKind, message: Option<&str>, payload: Option<Value>) -> Notification {
        Notification {
            notification_id: 1,
            subject: "@anna".to_string(),
            kind,
            message: message.map(str::to_string),
            payload,
            status: NotificationStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            sent_at: None,
        }
    }

    #[test]
    fn test_code_message() {
        let text = code_message("012345", Purpose::Booking);
        assert!(text.contains("<b>012345</b>"));
        assert!(text.contains("Booking"));
    }

    #[test]
    fn test_registration_masks_passport() {
        let text = notification_message(&notification(
            NotificationKind::RegistrationSuccess,
            None,
            Some(json!({"full_name": "Ivanova <Anna>", "passport_no": "MP1234567"})),
        ));
        assert!(text.contains("Ivanova &lt;Anna&gt;"));
        assert!(text.contains("MP1***567"));
        assert!(!text.contains("MP1234567"));
    }

    #[test]
    fn test_booking_lists_every_ticket() {
        let text = notification_message(&notification(
            NotificationKind::BookingSuccess,
            None,
            Some(json!({"tickets": [
                {"ticket_id": 1, "flight_number": "AB101", "departure_city": "Minsk", "arrival_city": "Warsaw",
                 "flight_date": "2025-12-10", "flight_time": "09:30", "seat_no": "A1", "price_usd": 150.0},
                {"ticket_id": 2, "flight_number": "AB202", "departure_city": "Warsaw", "arrival_city": "Minsk",
                 "flight_date": "2025-12-17", "flight_time": "10:00", "seat_no": "C4", "price_usd": 99.5},
            ]})),
        ));
        assert_eq!(text.lines().filter(|l| l.starts_with('•')).count(), 2);
        assert!(text.contains("seat <b>A1</b>, $150.00"));
        assert!(text.contains("<b>AB202</b> Warsaw → Minsk"));
    }

    #[test]
    fn test_cancellation_and_fallbacks() {
        let text = notification_message(&notification(
            NotificationKind::BookingCancelled,
            None,
            Some(json!({"ticket_id": 7, "flight_number": "AB101", "seat_no": "A1"})),
        ));
        assert!(text.starts_with("❌ Ticket #7 cancelled."));

        let text = notification_message(&notification(NotificationKind::Generic, None, None));
        assert_eq!(text, "✅ Done.");

        let text = notification_message(&notification(
            NotificationKind::BookingSuccess,
            Some("  Custom <b>text</b> "),
            None,
        ));
        assert_eq!(text, "Custom <b>text</b>");
    }
}
