pub mod campaigns;
pub mod emails;
pub mod leads;
pub mod senders;
pub mod templates;
pub mod tracking;

use axum::Json;
use serde_json::{json, Value};

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
