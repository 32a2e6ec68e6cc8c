// Database models for Diesel
use chrono::{DateTime, NaiveTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// Insertable struct for new leads
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::leads)]
pub struct NewLead {
    pub property_address: Option<String>,
    pub property_city: Option<String>,
    pub property_state: Option<String>,
    pub property_zip: Option<String>,
    pub owner_name: Option<String>,
    pub wholesale_value: Option<i32>,
    pub market_value: Option<i32>,
    pub days_on_market: Option<i32>,
    pub status: String,
    pub source_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::contacts)]
pub struct NewContact {
    pub lead_id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::lead_sources)]
pub struct NewLeadSource {
    pub name: String,
    pub file_name: String,
    pub record_count: i32,
    pub is_active: bool,
    pub last_imported: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::senders)]
pub struct NewSender {
    pub name: String,
    pub email: String,
    pub title: Option<String>,
    pub daily_quota: i32,
    pub oauth_refresh_token: Option<String>,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::templates)]
pub struct NewTemplate {
    pub name: String,
    pub subject: Option<String>,
    pub content: String,
    pub template_type: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::campaigns)]
pub struct NewCampaign {
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub email_template_id: Option<Uuid>,
    pub leads_per_day: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub min_interval_minutes: i32,
    pub max_interval_minutes: i32,
    pub attachment_path: Option<String>,
    pub tracking_enabled: bool,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::campaign_senders)]
pub struct NewCampaignSender {
    pub campaign_id: Uuid,
    pub sender_id: Uuid,
    pub is_active: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::campaign_leads)]
pub struct NewCampaignLead {
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub status: String,
}

/// Insertable struct for new outbound emails, written at assignment time
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::emails)]
pub struct NewEmail {
    pub lead_id: Uuid,
    pub sender_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub to_address: String,
    pub subject: String,
    pub body: String,
    pub attachment_path: Option<String>,
    pub status: String,
    pub scheduled_for: DateTime<Utc>,
    pub tracking_id: Uuid,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::email_events)]
pub struct NewEmailEvent {
    pub email_id: Uuid,
    pub event_type: String,
    pub recipient: String,
    pub campaign_id: Option<Uuid>,
    pub metadata: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}
