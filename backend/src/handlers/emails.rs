use axum::extract::{Json, Path, Query, State};
use dealpig_types::{Email, EmailStatus, QueueStats};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct EmailListQuery {
    pub status: Option<String>,
    pub campaign_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_emails(
    State(pool): State<DbPool>,
    Query(params): Query<EmailListQuery>,
) -> ApiResult<Json<Vec<Email>>> {
    if let Some(s) = &params.status {
        if EmailStatus::parse(s).is_none() {
            return Err(ApiError::bad_request(format!("Unknown email status: {}", s)));
        }
    }

    let mut conn = pool.get().await?;

    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let offset = params.offset.unwrap_or(0).max(0);

    let emails = db::emails::list(
        &mut conn,
        params.status.as_deref(),
        params.campaign_id,
        limit,
        offset,
    )
    .await?;

    Ok(Json(emails))
}

pub async fn get_email(
    State(pool): State<DbPool>,
    Path(email_id): Path<Uuid>,
) -> ApiResult<Json<Email>> {
    let mut conn = pool.get().await?;

    let email = db::emails::get_by_id(&mut conn, email_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email"))?;

    Ok(Json(email))
}

pub async fn queue_stats(State(pool): State<DbPool>) -> ApiResult<Json<QueueStats>> {
    let mut conn = pool.get().await?;

    let stats = db::emails::queue_stats(&mut conn).await?;

    Ok(Json(stats))
}
