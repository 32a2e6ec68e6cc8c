use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use dealpig_types::{
    Contact, CreateLeadRequest, ImportLeadsRequest, ImportLeadsResponse, Lead, UpdateLeadRequest,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::{NewContact, NewLead, NewLeadSource};

#[derive(Debug, Deserialize)]
pub struct LeadListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: Lead,
    pub contacts: Vec<Contact>,
}

pub async fn list_leads(
    State(pool): State<DbPool>,
    Query(params): Query<LeadListQuery>,
) -> ApiResult<Json<Vec<Lead>>> {
    let mut conn = pool.get().await?;

    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let offset = params.offset.unwrap_or(0).max(0);

    let leads = db::leads::list(
        &mut conn,
        params.status.as_deref(),
        params.search.as_deref(),
        limit,
        offset,
    )
    .await?;

    Ok(Json(leads))
}

pub async fn get_lead(
    State(pool): State<DbPool>,
    Path(lead_id): Path<Uuid>,
) -> ApiResult<Json<LeadDetail>> {
    let mut conn = pool.get().await?;

    let lead = db::leads::get_by_id(&mut conn, lead_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead"))?;
    let contacts = db::contacts::list_by_lead(&mut conn, lead_id).await?;

    Ok(Json(LeadDetail { lead, contacts }))
}

pub async fn create_lead(
    State(pool): State<DbPool>,
    Json(payload): Json<CreateLeadRequest>,
) -> ApiResult<(StatusCode, Json<LeadDetail>)> {
    let mut conn = pool.get().await?;

    let lead = insert_lead_with_contacts(&mut conn, payload, None).await?;
    let contacts = db::contacts::list_by_lead(&mut conn, lead.id).await?;

    Ok((StatusCode::CREATED, Json(LeadDetail { lead, contacts })))
}

pub async fn update_lead(
    State(pool): State<DbPool>,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<UpdateLeadRequest>,
) -> ApiResult<Json<Lead>> {
    let mut conn = pool.get().await?;

    if let Some(status) = &payload.status {
        if !matches!(status.as_str(), "NEW" | "CONTACTED" | "DEAD") {
            return Err(ApiError::bad_request(format!(
                "Unknown lead status: {}",
                status
            )));
        }
    }

    db::leads::get_by_id(&mut conn, lead_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead"))?;

    let lead = db::leads::update(&mut conn, lead_id, payload).await?;

    Ok(Json(lead))
}

pub async fn delete_lead(
    State(pool): State<DbPool>,
    Path(lead_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = pool.get().await?;

    db::leads::get_by_id(&mut conn, lead_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead"))?;
    db::leads::delete(&mut conn, lead_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Batch import of normalized lead records. Records without any contact
/// email are skipped rather than failing the whole batch; the source row
/// is only created once at least one record is importable.
pub async fn import_leads(
    State(pool): State<DbPool>,
    Json(payload): Json<ImportLeadsRequest>,
) -> ApiResult<(StatusCode, Json<ImportLeadsResponse>)> {
    if payload.leads.is_empty() {
        return Err(ApiError::bad_request("Import contains no lead records"));
    }

    let (importable, skipped) = partition_importable(payload.leads);
    if importable.is_empty() {
        return Err(ApiError::bad_request(
            "No lead record in the import has a contact email",
        ));
    }

    let mut conn = pool.get().await?;

    let source = db::lead_sources::create(
        &mut conn,
        NewLeadSource {
            name: payload.source_name,
            file_name: payload.file_name,
            record_count: importable.len() as i32,
            is_active: true,
            last_imported: Utc::now(),
        },
    )
    .await?;

    let mut imported = 0;

    for record in importable {
        insert_lead_with_contacts(&mut conn, record, Some(source.id)).await?;
        imported += 1;
    }

    tracing::info!(
        source_id = %source.id,
        imported,
        skipped,
        "Lead import completed"
    );

    Ok((
        StatusCode::CREATED,
        Json(ImportLeadsResponse {
            source_id: source.id,
            imported,
            skipped,
        }),
    ))
}

/// Split a batch into records that can be emailed and a skip count for
/// those without any contact email.
fn partition_importable(leads: Vec<CreateLeadRequest>) -> (Vec<CreateLeadRequest>, usize) {
    let mut importable = Vec::with_capacity(leads.len());
    let mut skipped = 0;

    for record in leads {
        if record.contacts.iter().all(|c| c.email.trim().is_empty()) {
            skipped += 1;
        } else {
            importable.push(record);
        }
    }

    (importable, skipped)
}

async fn insert_lead_with_contacts(
    conn: &mut diesel_async::AsyncPgConnection,
    record: CreateLeadRequest,
    source_id: Option<Uuid>,
) -> ApiResult<Lead> {
    let lead = db::leads::create(
        conn,
        NewLead {
            property_address: record.property_address,
            property_city: record.property_city,
            property_state: record.property_state,
            property_zip: record.property_zip,
            owner_name: record.owner_name,
            wholesale_value: record.wholesale_value,
            market_value: record.market_value,
            days_on_market: record.days_on_market,
            status: "NEW".to_string(),
            source_id,
            notes: record.notes,
        },
    )
    .await?;

    for contact in record.contacts {
        if contact.email.trim().is_empty() {
            continue;
        }
        db::contacts::create(
            conn,
            NewContact {
                lead_id: lead.id,
                name: contact.name,
                email: contact.email,
                is_primary: contact.is_primary,
            },
        )
        .await?;
    }

    Ok(lead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealpig_types::NewContactRecord;

    fn record(emails: &[&str]) -> CreateLeadRequest {
        CreateLeadRequest {
            property_address: Some("12 Oak St".into()),
            property_city: None,
            property_state: None,
            property_zip: None,
            owner_name: None,
            wholesale_value: None,
            market_value: None,
            days_on_market: None,
            notes: None,
            contacts: emails
                .iter()
                .map(|e| NewContactRecord {
                    name: None,
                    email: (*e).to_string(),
                    is_primary: false,
                })
                .collect(),
        }
    }

    #[test]
    fn records_without_contact_emails_are_skipped() {
        let batch = vec![
            record(&["owner@example.com"]),
            record(&[]),
            record(&["", "  "]),
            record(&["", "second@example.com"]),
        ];

        let (importable, skipped) = partition_importable(batch);
        assert_eq!(importable.len(), 2);
        assert_eq!(skipped, 2);
    }

    #[tokio::test]
    async fn import_with_no_usable_records_is_rejected_before_any_write() {
        use axum::{body::Body, routing::post, Router};
        use diesel_async::pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager};
        use diesel_async::AsyncPgConnection;
        use tower::ServiceExt;

        // The pool never connects: the batch is rejected before a
        // source row could be written
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(
            "postgres://127.0.0.1:1/unused",
        );
        let pool = Pool::builder(config).build().unwrap();

        let app = Router::new()
            .route("/api/leads/import", post(import_leads))
            .with_state(pool);

        let body = serde_json::json!({
            "source_name": "county-auction",
            "file_name": "batch.csv",
            "leads": [
                { "property_address": "12 Oak St", "contacts": [] },
                { "property_address": "9 Elm Ave", "contacts": [{ "email": " " }] }
            ]
        });

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/leads/import")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
