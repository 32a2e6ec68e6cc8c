use axum::{
    http::{header, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, CorsLayer};

mod db;
pub mod error;
mod handlers;
mod models;
mod scheduler;
mod schema;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();

    // Establish database connection pool
    let pool = db::establish_connection_pool()?;

    // Start campaign scheduler background task
    let scheduler_pool = pool.clone();
    tokio::spawn(async move {
        scheduler::start_scheduler_task(scheduler_pool).await;
    });

    // Start the midnight quota reset task
    let reset_pool = pool.clone();
    tokio::spawn(async move {
        scheduler::start_daily_reset_task(reset_pool).await;
    });

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        // Lead routes
        .route("/api/leads", get(handlers::leads::list_leads))
        .route("/api/leads", post(handlers::leads::create_lead))
        .route("/api/leads/import", post(handlers::leads::import_leads))
        .route("/api/leads/:id", get(handlers::leads::get_lead))
        .route("/api/leads/:id", put(handlers::leads::update_lead))
        .route("/api/leads/:id", delete(handlers::leads::delete_lead))
        // Sender routes
        .route("/api/senders", get(handlers::senders::list_senders))
        .route("/api/senders", post(handlers::senders::create_sender))
        .route("/api/senders/:id", get(handlers::senders::get_sender))
        .route("/api/senders/:id", put(handlers::senders::update_sender))
        .route("/api/senders/:id", delete(handlers::senders::delete_sender))
        .route(
            "/api/senders/:id/verify",
            post(handlers::senders::verify_sender),
        )
        // Template routes
        .route("/api/templates", get(handlers::templates::list_templates))
        .route("/api/templates", post(handlers::templates::create_template))
        .route("/api/templates/:id", get(handlers::templates::get_template))
        .route(
            "/api/templates/:id",
            put(handlers::templates::update_template),
        )
        .route(
            "/api/templates/:id",
            delete(handlers::templates::delete_template),
        )
        // Campaign routes
        .route("/api/campaigns", get(handlers::campaigns::list_campaigns))
        .route("/api/campaigns", post(handlers::campaigns::create_campaign))
        .route(
            "/api/campaigns/process",
            post(handlers::campaigns::process_campaigns),
        )
        .route("/api/campaigns/:id", get(handlers::campaigns::get_campaign))
        .route(
            "/api/campaigns/:id",
            put(handlers::campaigns::update_campaign),
        )
        .route(
            "/api/campaigns/:id",
            delete(handlers::campaigns::delete_campaign),
        )
        .route(
            "/api/campaigns/:id/start",
            post(handlers::campaigns::start_campaign),
        )
        .route(
            "/api/campaigns/:id/pause",
            post(handlers::campaigns::pause_campaign),
        )
        .route(
            "/api/campaigns/:id/complete",
            post(handlers::campaigns::complete_campaign),
        )
        .route(
            "/api/campaigns/:id/leads",
            post(handlers::campaigns::attach_leads),
        )
        .route(
            "/api/campaigns/:id/senders",
            post(handlers::campaigns::attach_senders),
        )
        .route(
            "/api/campaigns/:id/stats",
            get(handlers::campaigns::campaign_stats),
        )
        // Email routes
        .route("/api/emails", get(handlers::emails::list_emails))
        .route("/api/emails/queue/stats", get(handlers::emails::queue_stats))
        .route("/api/emails/:id", get(handlers::emails::get_email))
        // Tracking routes
        .route(
            "/api/tracking/:tracking_id/pixel.png",
            get(handlers::tracking::tracking_pixel),
        )
        .route(
            "/api/tracking/events",
            post(handlers::tracking::tracking_event),
        )
        .layer(build_cors_layer())
        .with_state(pool);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build CORS layer based on environment configuration.
///
/// If CORS_ALLOWED_ORIGINS is set, only those origins are allowed.
/// If not set, defaults to permissive CORS (for development only).
fn build_cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS").ok();

    match allowed_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                tracing::warn!(
                    "CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS (not recommended for production)"
                );
                CorsLayer::permissive()
            } else {
                tracing::info!("CORS configured for origins: {:?}", origins);
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                    .allow_credentials(true)
            }
        }
        None => {
            tracing::warn!(
                "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
            );
            CorsLayer::permissive()
        }
    }
}
