use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveTime;
use dealpig_types::{
    AttachLeadsRequest, AttachSendersRequest, AttachedResponse, Campaign, CampaignStats,
    CampaignStatus, CreateCampaignRequest, CycleStats, UpdateCampaignRequest,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::NewCampaign;
use crate::scheduler;

const DEFAULT_LEADS_PER_DAY: i32 = 10;
const DEFAULT_MIN_INTERVAL_MINUTES: i32 = 5;
const DEFAULT_MAX_INTERVAL_MINUTES: i32 = 15;

#[derive(Debug, Deserialize)]
pub struct CampaignListQuery {
    pub status: Option<String>,
}

pub async fn list_campaigns(
    State(pool): State<DbPool>,
    Query(params): Query<CampaignListQuery>,
) -> ApiResult<Json<Vec<Campaign>>> {
    if let Some(s) = &params.status {
        if CampaignStatus::parse(s).is_none() {
            return Err(ApiError::bad_request(format!(
                "Unknown campaign status: {}",
                s
            )));
        }
    }

    let mut conn = pool.get().await?;

    let campaigns = db::campaigns::list(&mut conn, params.status.as_deref()).await?;

    Ok(Json(campaigns))
}

pub async fn get_campaign(
    State(pool): State<DbPool>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    let mut conn = pool.get().await?;

    let campaign = db::campaigns::get_by_id(&mut conn, campaign_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))?;

    Ok(Json(campaign))
}

pub async fn create_campaign(
    State(pool): State<DbPool>,
    Json(payload): Json<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Campaign name is required"));
    }

    let min_interval = payload
        .min_interval_minutes
        .unwrap_or(DEFAULT_MIN_INTERVAL_MINUTES);
    let max_interval = payload
        .max_interval_minutes
        .unwrap_or(DEFAULT_MAX_INTERVAL_MINUTES);
    validate_schedule(payload.leads_per_day, min_interval, max_interval)?;

    // Business-hours defaults matching the dashboard's campaign form
    let start_time = payload
        .start_time
        .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default());
    let end_time = payload
        .end_time
        .unwrap_or_else(|| NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default());

    let mut conn = pool.get().await?;

    let campaign = db::campaigns::create(
        &mut conn,
        NewCampaign {
            name: payload.name,
            description: payload.description,
            status: CampaignStatus::Draft.as_str().to_string(),
            email_template_id: payload.email_template_id,
            leads_per_day: payload.leads_per_day.unwrap_or(DEFAULT_LEADS_PER_DAY),
            start_time,
            end_time,
            min_interval_minutes: min_interval,
            max_interval_minutes: max_interval,
            attachment_path: payload.attachment_path,
            tracking_enabled: payload.tracking_enabled.unwrap_or(true),
            email_subject: payload.email_subject,
            email_body: payload.email_body,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn update_campaign(
    State(pool): State<DbPool>,
    Path(campaign_id): Path<Uuid>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> ApiResult<Json<Campaign>> {
    let mut conn = pool.get().await?;

    let existing = db::campaigns::get_by_id(&mut conn, campaign_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))?;

    let min_interval = payload
        .min_interval_minutes
        .unwrap_or(existing.min_interval_minutes);
    let max_interval = payload
        .max_interval_minutes
        .unwrap_or(existing.max_interval_minutes);
    validate_schedule(payload.leads_per_day, min_interval, max_interval)?;

    let campaign = db::campaigns::update(&mut conn, campaign_id, payload).await?;

    Ok(Json(campaign))
}

pub async fn delete_campaign(
    State(pool): State<DbPool>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = pool.get().await?;

    db::campaigns::get_by_id(&mut conn, campaign_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))?;
    db::campaigns::delete(&mut conn, campaign_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_campaign(
    State(pool): State<DbPool>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    transition(pool, campaign_id, CampaignStatus::Active).await
}

pub async fn pause_campaign(
    State(pool): State<DbPool>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    transition(pool, campaign_id, CampaignStatus::Paused).await
}

pub async fn complete_campaign(
    State(pool): State<DbPool>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    transition(pool, campaign_id, CampaignStatus::Completed).await
}

async fn transition(
    pool: DbPool,
    campaign_id: Uuid,
    target: CampaignStatus,
) -> ApiResult<Json<Campaign>> {
    let mut conn = pool.get().await?;

    match db::campaigns::set_status(&mut conn, campaign_id, target).await? {
        Some(campaign) => {
            tracing::info!(campaign_id = %campaign_id, status = target.as_str(), "Campaign transitioned");
            Ok(Json(campaign))
        }
        None => {
            let current = db::campaigns::get_by_id(&mut conn, campaign_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Campaign"))?;
            Err(ApiError::conflict(format!(
                "Cannot move campaign from {} to {}",
                current.status,
                target.as_str()
            )))
        }
    }
}

pub async fn attach_leads(
    State(pool): State<DbPool>,
    Path(campaign_id): Path<Uuid>,
    Json(payload): Json<AttachLeadsRequest>,
) -> ApiResult<Json<AttachedResponse>> {
    if payload.lead_ids.is_empty() {
        return Err(ApiError::bad_request("No lead ids given"));
    }

    let mut conn = pool.get().await?;

    db::campaigns::get_by_id(&mut conn, campaign_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))?;

    let attached = db::campaign_leads::attach(&mut conn, campaign_id, &payload.lead_ids).await?;
    if attached > 0 {
        db::campaigns::add_total_leads(&mut conn, campaign_id, attached as i32).await?;
    }

    Ok(Json(AttachedResponse { attached }))
}

pub async fn attach_senders(
    State(pool): State<DbPool>,
    Path(campaign_id): Path<Uuid>,
    Json(payload): Json<AttachSendersRequest>,
) -> ApiResult<Json<AttachedResponse>> {
    if payload.sender_ids.is_empty() {
        return Err(ApiError::bad_request("No sender ids given"));
    }

    let mut conn = pool.get().await?;

    db::campaigns::get_by_id(&mut conn, campaign_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))?;

    let attached =
        db::campaign_senders::attach(&mut conn, campaign_id, &payload.sender_ids).await?;

    Ok(Json(AttachedResponse { attached }))
}

pub async fn campaign_stats(
    State(pool): State<DbPool>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<CampaignStats>> {
    let mut conn = pool.get().await?;

    db::campaigns::get_by_id(&mut conn, campaign_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))?;

    let stats = db::emails::campaign_stats(&mut conn, campaign_id).await?;

    Ok(Json(stats))
}

/// Run one scheduler cycle inline instead of waiting for the next tick.
pub async fn process_campaigns(State(pool): State<DbPool>) -> ApiResult<Json<CycleStats>> {
    let stats = scheduler::campaign::run_cycle(&pool).await?;

    Ok(Json(stats))
}

fn validate_schedule(
    leads_per_day: Option<i32>,
    min_interval: i32,
    max_interval: i32,
) -> ApiResult<()> {
    if let Some(n) = leads_per_day {
        if n < 1 {
            return Err(ApiError::bad_request("leads_per_day must be positive"));
        }
    }
    if min_interval < 1 || max_interval < 1 {
        return Err(ApiError::bad_request("Send intervals must be positive"));
    }
    if min_interval > max_interval {
        return Err(ApiError::bad_request(
            "min_interval_minutes cannot exceed max_interval_minutes",
        ));
    }
    Ok(())
}
