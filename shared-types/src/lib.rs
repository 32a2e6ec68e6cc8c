use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lead struct matching database column order exactly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct Lead {
    pub id: Uuid,
    pub property_address: Option<String>,
    pub property_city: Option<String>,
    pub property_state: Option<String>,
    pub property_zip: Option<String>,
    pub owner_name: Option<String>,
    pub wholesale_value: Option<i32>,
    pub market_value: Option<i32>,
    pub days_on_market: Option<i32>,
    pub status: String, // stored as VARCHAR: "NEW", "CONTACTED", "DEAD"
    pub source_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct Contact {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct LeadSource {
    pub id: Uuid,
    pub name: String,
    pub file_name: String,
    pub record_count: i32,
    pub is_active: bool,
    pub last_imported: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct Sender {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub title: Option<String>,
    pub daily_quota: i32,
    pub emails_sent_today: i32,
    pub total_emails_sent: i32,
    pub oauth_refresh_token: Option<String>,
    pub is_verified: bool,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sender {
    /// Remaining sends before this sender hits its daily quota.
    pub fn remaining_capacity(&self) -> i32 {
        (self.daily_quota - self.emails_sent_today).max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub subject: Option<String>,
    pub content: String,
    pub template_type: String, // "EMAIL", "LOI"
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct Campaign {
    pub id: Uuid,
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
    pub total_leads: i32,
    pub leads_worked: i32,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct CampaignSender {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub sender_id: Uuid,
    pub emails_sent_today: i32,
    pub total_emails_sent: i32,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct CampaignLead {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub status: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct Email {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub sender_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub to_address: String,
    pub subject: String,
    pub body: String,
    pub attachment_path: Option<String>,
    pub status: String,
    pub scheduled_for: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,
    pub bounced_at: Option<DateTime<Utc>>,
    pub bounce_reason: Option<String>,
    pub message_id: Option<String>,
    pub tracking_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct EmailEvent {
    pub id: Uuid,
    pub email_id: Uuid,
    pub event_type: String,
    pub recipient: String,
    pub campaign_id: Option<Uuid>,
    pub metadata: Option<String>, // JSON stored as TEXT
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Status enums. Stored as VARCHAR in the database; these are the only
// values the service reads or writes.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "DRAFT",
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Paused => "PAUSED",
            CampaignStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(CampaignStatus::Draft),
            "ACTIVE" => Some(CampaignStatus::Active),
            "PAUSED" => Some(CampaignStatus::Paused),
            "COMPLETED" => Some(CampaignStatus::Completed),
            _ => None,
        }
    }

    /// Statuses a campaign may be in for the given transition to apply.
    pub fn allowed_from(target: CampaignStatus) -> &'static [&'static str] {
        match target {
            CampaignStatus::Active => &["DRAFT", "PAUSED"],
            CampaignStatus::Paused => &["ACTIVE"],
            CampaignStatus::Completed => &["ACTIVE", "PAUSED"],
            CampaignStatus::Draft => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignLeadStatus {
    Pending,
    Assigned,
    Sent,
    Failed,
}

impl CampaignLeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignLeadStatus::Pending => "PENDING",
            CampaignLeadStatus::Assigned => "ASSIGNED",
            CampaignLeadStatus::Sent => "SENT",
            CampaignLeadStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(CampaignLeadStatus::Pending),
            "ASSIGNED" => Some(CampaignLeadStatus::Assigned),
            "SENT" => Some(CampaignLeadStatus::Sent),
            "FAILED" => Some(CampaignLeadStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailStatus {
    Pending,
    Sent,
    Opened,
    Replied,
    Bounced,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "PENDING",
            EmailStatus::Sent => "SENT",
            EmailStatus::Opened => "OPENED",
            EmailStatus::Replied => "REPLIED",
            EmailStatus::Bounced => "BOUNCED",
            EmailStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(EmailStatus::Pending),
            "SENT" => Some(EmailStatus::Sent),
            "OPENED" => Some(EmailStatus::Opened),
            "REPLIED" => Some(EmailStatus::Replied),
            "BOUNCED" => Some(EmailStatus::Bounced),
            "FAILED" => Some(EmailStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailEventType {
    Sent,
    Opened,
    Bounced,
    Replied,
    Failed,
}

impl EmailEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailEventType::Sent => "sent",
            EmailEventType::Opened => "opened",
            EmailEventType::Bounced => "bounced",
            EmailEventType::Replied => "replied",
            EmailEventType::Failed => "failed",
        }
    }
}

// API Request/Response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeadRequest {
    pub property_address: Option<String>,
    pub property_city: Option<String>,
    pub property_state: Option<String>,
    pub property_zip: Option<String>,
    pub owner_name: Option<String>,
    pub wholesale_value: Option<i32>,
    pub market_value: Option<i32>,
    pub days_on_market: Option<i32>,
    pub notes: Option<String>,
    #[serde(default)]
    pub contacts: Vec<NewContactRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLeadRequest {
    pub property_address: Option<String>,
    pub property_city: Option<String>,
    pub property_state: Option<String>,
    pub property_zip: Option<String>,
    pub owner_name: Option<String>,
    pub wholesale_value: Option<i32>,
    pub market_value: Option<i32>,
    pub days_on_market: Option<i32>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContactRecord {
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Batch import of already-normalized lead records, tied to a lead source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLeadsRequest {
    pub source_name: String,
    pub file_name: String,
    pub leads: Vec<CreateLeadRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLeadsResponse {
    pub source_id: Uuid,
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSenderRequest {
    pub name: String,
    pub email: String,
    pub title: Option<String>,
    pub daily_quota: Option<i32>,
    pub oauth_refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSenderRequest {
    pub name: Option<String>,
    pub title: Option<String>,
    pub daily_quota: Option<i32>,
    pub oauth_refresh_token: Option<String>,
}

/// Sender as exposed over the API. Never carries the refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub title: Option<String>,
    pub daily_quota: i32,
    pub emails_sent_today: i32,
    pub total_emails_sent: i32,
    pub is_verified: bool,
    pub has_credentials: bool,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Sender> for SenderResponse {
    fn from(sender: Sender) -> Self {
        SenderResponse {
            id: sender.id,
            name: sender.name,
            email: sender.email,
            title: sender.title,
            daily_quota: sender.daily_quota,
            emails_sent_today: sender.emails_sent_today,
            total_emails_sent: sender.total_emails_sent,
            is_verified: sender.is_verified,
            has_credentials: sender.oauth_refresh_token.is_some(),
            last_sent_at: sender.last_sent_at,
            created_at: sender.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub subject: Option<String>,
    pub content: String,
    pub template_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub template_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub description: Option<String>,
    pub email_template_id: Option<Uuid>,
    pub leads_per_day: Option<i32>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub min_interval_minutes: Option<i32>,
    pub max_interval_minutes: Option<i32>,
    pub attachment_path: Option<String>,
    pub tracking_enabled: Option<bool>,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub email_template_id: Option<Uuid>,
    pub leads_per_day: Option<i32>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub min_interval_minutes: Option<i32>,
    pub max_interval_minutes: Option<i32>,
    pub attachment_path: Option<String>,
    pub tracking_enabled: Option<bool>,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachLeadsRequest {
    pub lead_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachSendersRequest {
    pub sender_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedResponse {
    pub attached: usize,
}

/// Bounce/reply webhook payload from the mail provider integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEventRequest {
    pub event: String, // "bounce" or "reply"
    pub tracking_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignStats {
    pub total_leads: i64,
    pub pending: i64,
    pub sent: i64,
    pub opened: i64,
    pub replied: i64,
    pub bounced: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

/// Outcome of one scheduler cycle, returned by the manual trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleStats {
    pub campaigns_processed: usize,
    pub leads_assigned: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_status_round_trips() {
        for status in [
            CampaignStatus::Draft,
            CampaignStatus::Active,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
        ] {
            assert_eq!(CampaignStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CampaignStatus::parse("RUNNING"), None);
    }

    #[test]
    fn start_is_only_legal_from_draft_or_paused() {
        let from = CampaignStatus::allowed_from(CampaignStatus::Active);
        assert!(from.contains(&"DRAFT"));
        assert!(from.contains(&"PAUSED"));
        assert!(!from.contains(&"COMPLETED"));
        assert!(!from.contains(&"ACTIVE"));
    }

    #[test]
    fn email_status_round_trips() {
        for status in [
            EmailStatus::Pending,
            EmailStatus::Sent,
            EmailStatus::Opened,
            EmailStatus::Replied,
            EmailStatus::Bounced,
            EmailStatus::Failed,
        ] {
            assert_eq!(EmailStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn remaining_capacity_never_negative() {
        let sender = Sender {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "test@example.com".into(),
            title: None,
            daily_quota: 10,
            emails_sent_today: 25,
            total_emails_sent: 25,
            oauth_refresh_token: None,
            is_verified: true,
            last_sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(sender.remaining_capacity(), 0);
    }

    #[test]
    fn sender_response_hides_refresh_token() {
        let sender = Sender {
            id: Uuid::new_v4(),
            name: "Jess".into(),
            email: "jess@example.com".into(),
            title: Some("Acquisitions".into()),
            daily_quota: 40,
            emails_sent_today: 3,
            total_emails_sent: 120,
            oauth_refresh_token: Some("1//secret".into()),
            is_verified: true,
            last_sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let response = SenderResponse::from(sender);
        assert!(response.has_credentials);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("secret"));
    }
}
