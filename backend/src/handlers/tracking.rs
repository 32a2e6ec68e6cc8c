use axum::{
    extract::{Json, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use dealpig_types::{Email, EmailEventType, TrackingEventRequest};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::NewEmailEvent;

/// 1x1 transparent PNG served for every pixel request.
const PIXEL_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn pixel_bytes() -> &'static [u8] {
    static PIXEL: OnceLock<Vec<u8>> = OnceLock::new();
    PIXEL
        .get_or_init(|| STANDARD.decode(PIXEL_BASE64).unwrap_or_default())
        .as_slice()
}

fn pixel_response() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate, max-age=0",
            ),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        pixel_bytes().to_vec(),
    )
        .into_response()
}

/// Open tracking. Mail clients fetch this when the message is rendered,
/// so it must always return the pixel, whatever the lookup finds. The
/// id is taken as a raw string: a mangled one must not become a 400.
pub async fn tracking_pixel(
    State(pool): State<DbPool>,
    Path(tracking_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    match tracking_id.parse::<Uuid>() {
        Ok(id) => {
            if let Err(e) = record_open(&pool, id, &headers).await {
                tracing::warn!(tracking_id = %id, error = %e, "Failed to record open");
            }
        }
        Err(_) => {
            tracing::debug!(raw = %tracking_id, "Pixel fetch with malformed tracking id");
        }
    }

    pixel_response()
}

async fn record_open(
    pool: &DbPool,
    tracking_id: Uuid,
    headers: &HeaderMap,
) -> anyhow::Result<()> {
    let mut conn = pool.get().await.map_err(|e| anyhow::anyhow!(e))?;

    let Some(email) = db::emails::get_by_tracking_id(&mut conn, tracking_id).await? else {
        tracing::debug!(tracking_id = %tracking_id, "Pixel fetch for unknown tracking id");
        return Ok(());
    };

    db::emails::mark_opened(&mut conn, email.id).await?;

    db::email_events::insert(
        &mut conn,
        NewEmailEvent {
            email_id: email.id,
            event_type: EmailEventType::Opened.as_str().to_string(),
            recipient: email.to_address,
            campaign_id: email.campaign_id,
            metadata: None,
            user_agent: header_value(headers, header::USER_AGENT.as_str()),
            ip_address: header_value(headers, "x-forwarded-for"),
        },
    )
    .await?;

    Ok(())
}

/// Bounce/reply webhook from the mail provider integration.
pub async fn tracking_event(
    State(pool): State<DbPool>,
    Json(payload): Json<TrackingEventRequest>,
) -> ApiResult<Json<Email>> {
    let mut conn = pool.get().await?;

    let email = db::emails::get_by_tracking_id(&mut conn, payload.tracking_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email"))?;

    let (updated, event_type) = match payload.event.as_str() {
        "bounce" => {
            let reason = payload.reason.as_deref().unwrap_or("unknown");
            let updated = db::emails::mark_bounced(&mut conn, email.id, reason).await?;
            (updated, EmailEventType::Bounced)
        }
        "reply" => {
            let updated = db::emails::mark_replied(&mut conn, email.id).await?;
            // A reply is the strongest contact signal we get
            db::leads::mark_contacted(&mut conn, email.lead_id).await?;
            (updated, EmailEventType::Replied)
        }
        other => {
            return Err(ApiError::bad_request(format!(
                "Unknown tracking event: {}",
                other
            )));
        }
    };

    let metadata = payload
        .reason
        .as_ref()
        .map(|r| serde_json::json!({ "reason": r }).to_string());

    db::email_events::insert(
        &mut conn,
        NewEmailEvent {
            email_id: email.id,
            event_type: event_type.as_str().to_string(),
            recipient: email.to_address,
            campaign_id: email.campaign_id,
            metadata,
            user_agent: None,
            ip_address: None,
        },
    )
    .await?;

    tracing::info!(
        tracking_id = %payload.tracking_id,
        event = event_type.as_str(),
        "Tracking event recorded"
    );

    Ok(Json(updated))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_decodes_to_valid_png() {
        let bytes = pixel_bytes();
        assert!(!bytes.is_empty());
        // PNG magic number
        assert_eq!(&bytes[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[tokio::test]
    async fn pixel_response_has_no_cache_headers() {
        let response = pixel_response();
        let headers = response.headers();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/png");
        assert!(headers
            .get(header::CACHE_CONTROL)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("no-cache"));
    }

    #[tokio::test]
    async fn malformed_tracking_id_still_gets_the_pixel() {
        use axum::{body::Body, routing::get, Router};
        use diesel_async::pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager};
        use diesel_async::AsyncPgConnection;
        use tower::ServiceExt;

        // The pool never connects: a bad id short-circuits before any
        // database work
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(
            "postgres://127.0.0.1:1/unused",
        );
        let pool = Pool::builder(config).build().unwrap();

        let app = Router::new()
            .route("/api/tracking/:tracking_id/pixel.png", get(tracking_pixel))
            .with_state(pool);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/tracking/not-a-uuid/pixel.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
