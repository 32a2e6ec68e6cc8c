use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use dealpig_types::{CreateTemplateRequest, Template, UpdateTemplateRequest};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::NewTemplate;

#[derive(Debug, Deserialize)]
pub struct TemplateListQuery {
    #[serde(rename = "type")]
    pub template_type: Option<String>,
}

pub async fn list_templates(
    State(pool): State<DbPool>,
    Query(params): Query<TemplateListQuery>,
) -> ApiResult<Json<Vec<Template>>> {
    let mut conn = pool.get().await?;

    let templates = db::templates::list(&mut conn, params.template_type.as_deref()).await?;

    Ok(Json(templates))
}

pub async fn get_template(
    State(pool): State<DbPool>,
    Path(template_id): Path<Uuid>,
) -> ApiResult<Json<Template>> {
    let mut conn = pool.get().await?;

    let template = db::templates::get_by_id(&mut conn, template_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;

    Ok(Json(template))
}

pub async fn create_template(
    State(pool): State<DbPool>,
    Json(payload): Json<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::bad_request("Template content is required"));
    }

    let mut conn = pool.get().await?;

    let template = db::templates::create(
        &mut conn,
        NewTemplate {
            name: payload.name,
            subject: payload.subject,
            content: payload.content,
            template_type: payload.template_type.unwrap_or_else(|| "EMAIL".to_string()),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(pool): State<DbPool>,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<UpdateTemplateRequest>,
) -> ApiResult<Json<Template>> {
    let mut conn = pool.get().await?;

    db::templates::get_by_id(&mut conn, template_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;

    let template = db::templates::update(&mut conn, template_id, payload).await?;

    Ok(Json(template))
}

pub async fn delete_template(
    State(pool): State<DbPool>,
    Path(template_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = pool.get().await?;

    db::templates::get_by_id(&mut conn, template_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;
    db::templates::delete(&mut conn, template_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
