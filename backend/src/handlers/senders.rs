use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use dealpig_types::{CreateSenderRequest, SenderResponse, UpdateSenderRequest};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::NewSender;
use crate::scheduler::gmail_client::GmailSender;

const DEFAULT_DAILY_QUOTA: i32 = 50;

pub async fn list_senders(State(pool): State<DbPool>) -> ApiResult<Json<Vec<SenderResponse>>> {
    let mut conn = pool.get().await?;

    let senders = db::senders::list_all(&mut conn).await?;
    let responses: Vec<SenderResponse> = senders.into_iter().map(Into::into).collect();

    Ok(Json(responses))
}

pub async fn get_sender(
    State(pool): State<DbPool>,
    Path(sender_id): Path<Uuid>,
) -> ApiResult<Json<SenderResponse>> {
    let mut conn = pool.get().await?;

    let sender = db::senders::get_by_id(&mut conn, sender_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sender"))?;

    Ok(Json(sender.into()))
}

pub async fn create_sender(
    State(pool): State<DbPool>,
    Json(payload): Json<CreateSenderRequest>,
) -> ApiResult<(StatusCode, Json<SenderResponse>)> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::bad_request("Sender email is required"));
    }
    if let Some(quota) = payload.daily_quota {
        if quota < 1 {
            return Err(ApiError::bad_request("daily_quota must be positive"));
        }
    }

    let mut conn = pool.get().await?;

    let sender = db::senders::create(
        &mut conn,
        NewSender {
            name: payload.name,
            email: payload.email,
            title: payload.title,
            daily_quota: payload.daily_quota.unwrap_or(DEFAULT_DAILY_QUOTA),
            oauth_refresh_token: payload.oauth_refresh_token,
            is_verified: false,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(sender.into())))
}

pub async fn update_sender(
    State(pool): State<DbPool>,
    Path(sender_id): Path<Uuid>,
    Json(payload): Json<UpdateSenderRequest>,
) -> ApiResult<Json<SenderResponse>> {
    if let Some(quota) = payload.daily_quota {
        if quota < 1 {
            return Err(ApiError::bad_request("daily_quota must be positive"));
        }
    }

    let mut conn = pool.get().await?;

    db::senders::get_by_id(&mut conn, sender_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sender"))?;

    let sender = db::senders::update(&mut conn, sender_id, payload).await?;

    Ok(Json(sender.into()))
}

pub async fn delete_sender(
    State(pool): State<DbPool>,
    Path(sender_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = pool.get().await?;

    db::senders::get_by_id(&mut conn, sender_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sender"))?;
    db::senders::delete(&mut conn, sender_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Verify the sender's stored credentials by building a Gmail client and
/// fetching the account profile.
pub async fn verify_sender(
    State(pool): State<DbPool>,
    Path(sender_id): Path<Uuid>,
) -> ApiResult<Json<SenderResponse>> {
    let mut conn = pool.get().await?;

    let sender = db::senders::get_by_id(&mut conn, sender_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sender"))?;

    if sender.oauth_refresh_token.is_none() {
        return Err(ApiError::bad_request(
            "Sender has no stored credentials to verify",
        ));
    }

    let client = GmailSender::for_sender(&sender).await?;
    client
        .check_profile()
        .await
        .map_err(|e| ApiError::bad_request(format!("Credential verification failed: {}", e)))?;

    let sender = db::senders::mark_verified(&mut conn, sender_id).await?;

    tracing::info!(sender_id = %sender_id, email = %sender.email, "Sender verified");

    Ok(Json(sender.into()))
}
