//! Registration and sign-in through verification codes

use axum::{
    Json,
    extract::{Path, State},
};
use common::{
    models::{NotificationKind, Purpose},
    notifications::NotificationStore,
    verification::CodeTarget,
};
use serde_json::json;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    models::{
        CodeIssuedResponse,
        auth::{
            ConfirmRequest, ConfirmResponse, NewPassenger, PassengerView, RequestCodeRequest,
            RequestStatusResponse,
        },
    },
    repositories::PassengerRepository,
    routes::confirm_code,
    state::AppState,
    validation::{optional, require, validate_code, validate_email, validate_subject},
};

fn parse_purpose(raw: &str) -> ApiResult<Purpose> {
    match raw.trim() {
        "register" => Ok(Purpose::Register),
        "login" => Ok(Purpose::Login),
        _ => Err(ApiError::validation("Purpose must be 'register' or 'login'")),
    }
}

/// Issue a registration or sign-in code
pub async fn request_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeRequest>,
) -> ApiResult<Json<CodeIssuedResponse>> {
    let subject = validate_subject(&body.subject)?;
    let purpose = parse_purpose(&body.purpose)?;

    if purpose == Purpose::Login && state.passenger_repository.find(&subject).await?.is_none() {
        return Err(ApiError::not_found("Passenger is not registered, sign up first"));
    }

    let request_id = state
        .verification_store
        .create(
            &subject,
            purpose,
            None,
            state.settings.require_binding_on_create,
        )
        .await?;

    Ok(Json(CodeIssuedResponse {
        ok: true,
        request_id,
    }))
}

/// Report the status of a verification request without revealing its code
pub async fn request_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<RequestStatusResponse>> {
    let request = state
        .verification_store
        .find(&request_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Request not found"))?;

    Ok(Json(request.into()))
}

/// Confirm a registration or sign-in code
pub async fn confirm(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> ApiResult<Json<ConfirmResponse>> {
    let subject = validate_subject(&body.subject)?;
    let purpose = parse_purpose(&body.purpose)?;
    let code = validate_code(&body.code)?;

    match purpose {
        Purpose::Register => {
            let details = new_passenger(&body)?;
            confirm_registration(&state, subject, &code, &details).await
        }
        _ => confirm_login(&state, subject, &code).await,
    }
}

fn new_passenger(body: &ConfirmRequest) -> ApiResult<NewPassenger> {
    Ok(NewPassenger {
        last_name: require("Last name", body.last_name.as_deref())?,
        first_name: require("First name", body.first_name.as_deref())?,
        middle_name: optional(body.middle_name.as_deref()),
        passport_no: require("Passport number", body.passport_no.as_deref())?,
        phone: require("Phone", body.phone.as_deref())?,
        email: validate_email(body.email.as_deref().unwrap_or_default())?,
    })
}

async fn confirm_registration(
    state: &AppState,
    subject: String,
    code: &str,
    details: &NewPassenger,
) -> ApiResult<Json<ConfirmResponse>> {
    let mut tx = state.db_pool.begin().await?;

    confirm_code(
        state,
        &mut tx,
        &subject,
        Purpose::Register,
        CodeTarget::Latest,
        code,
    )
    .await?;

    let passenger = PassengerRepository::upsert(&mut tx, &subject, details).await?;

    let payload = json!({
        "full_name": passenger.full_name(),
        "passport_no": passenger.passport_no,
    });
    NotificationStore::enqueue(
        &mut tx,
        &subject,
        NotificationKind::RegistrationSuccess,
        None,
        Some(&payload),
    )
    .await?;

    tx.commit().await?;
    info!("Registered passenger {}", subject);

    Ok(Json(ConfirmResponse {
        ok: true,
        passenger: Some(PassengerView::from(&passenger)),
        subject,
    }))
}

async fn confirm_login(
    state: &AppState,
    subject: String,
    code: &str,
) -> ApiResult<Json<ConfirmResponse>> {
    let mut tx = state.db_pool.begin().await?;

    confirm_code(state, &mut tx, &subject, Purpose::Login, CodeTarget::Latest, code).await?;

    let passenger = PassengerRepository::find_in(&mut tx, &subject)
        .await?
        .ok_or_else(|| ApiError::not_found("Passenger is not registered, sign up first"))?;

    tx.commit().await?;
    info!("Passenger {} signed in", subject);

    Ok(Json(ConfirmResponse {
        ok: true,
        passenger: Some(PassengerView::from(&passenger)),
        subject,
    }))
}
