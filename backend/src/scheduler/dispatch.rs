//! Sends due queued emails through each sender's Gmail account.

use anyhow::{Context, Result};
use chrono::Utc;
use dealpig_types::{Contact, Email, EmailEventType, Lead, Sender};
use diesel_async::AsyncPgConnection;
use uuid::Uuid;

use super::gmail_client::{build_mime, GmailSender};
use crate::db::{self, DbPool};
use crate::models::NewEmailEvent;

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failed: usize,
    pub deferred: usize,
}

enum SendResult {
    Sent,
    Failed,
    Deferred,
}

/// Placeholder values substituted into subject and body templates
struct RenderContext {
    property_address: String,
    property_city: String,
    property_state: String,
    property_zip: String,
    owner_name: String,
    contact_name: String,
    sender_name: String,
    sender_title: String,
    sender_email: String,
}

impl RenderContext {
    fn new(lead: &Lead, contact: Option<&Contact>, sender: &Sender) -> Self {
        let contact_name = contact
            .and_then(|c| c.name.clone())
            .or_else(|| lead.owner_name.clone())
            .unwrap_or_else(|| "Property Owner".to_string());

        Self {
            property_address: lead.property_address.clone().unwrap_or_default(),
            property_city: lead.property_city.clone().unwrap_or_default(),
            property_state: lead.property_state.clone().unwrap_or_default(),
            property_zip: lead.property_zip.clone().unwrap_or_default(),
            owner_name: lead.owner_name.clone().unwrap_or_default(),
            contact_name,
            sender_name: sender.name.clone(),
            sender_title: sender.title.clone().unwrap_or_default(),
            sender_email: sender.email.clone(),
        }
    }
}

fn render_placeholders(text: &str, ctx: &RenderContext) -> String {
    text.replace("{{property_address}}", &ctx.property_address)
        .replace("{{property_city}}", &ctx.property_city)
        .replace("{{property_state}}", &ctx.property_state)
        .replace("{{property_zip}}", &ctx.property_zip)
        .replace("{{owner_name}}", &ctx.owner_name)
        .replace("{{contact_name}}", &ctx.contact_name)
        .replace("{{sender_name}}", &ctx.sender_name)
        .replace("{{sender_title}}", &ctx.sender_title)
        .replace("{{sender_email}}", &ctx.sender_email)
}

/// Insert the open-tracking pixel just before the closing body tag, or
/// append it when the body has no such tag.
fn inject_tracking_pixel(body: &str, pixel_url: &str) -> String {
    let tag = format!(
        "<img src=\"{}\" width=\"1\" height=\"1\" alt=\"\" style=\"display:none\" />",
        pixel_url
    );

    match body.find("</body>") {
        Some(pos) => {
            let mut injected = String::with_capacity(body.len() + tag.len());
            injected.push_str(&body[..pos]);
            injected.push_str(&tag);
            injected.push_str(&body[pos..]);
            injected
        }
        None => format!("{}{}", body, tag),
    }
}

fn pixel_url(tracking_id: Uuid) -> String {
    let base = std::env::var("TRACKING_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    format!(
        "{}/api/tracking/{}/pixel.png",
        base.trim_end_matches('/'),
        tracking_id
    )
}

/// Send everything due in this cycle. Each email succeeds or fails on
/// its own; one bad send never aborts the rest of the batch.
pub async fn dispatch_due_emails(pool: &DbPool, batch_size: i64) -> Result<DispatchOutcome> {
    let mut conn = pool.get().await.context("Failed to get DB connection")?;

    let due = db::emails::due_pending(&mut conn, Utc::now(), batch_size).await?;
    if due.is_empty() {
        return Ok(DispatchOutcome::default());
    }

    tracing::debug!(due = due.len(), "Dispatching due emails");

    let mut outcome = DispatchOutcome::default();
    for email in due {
        let email_id = email.id;
        match send_one(&mut conn, email).await {
            Ok(SendResult::Sent) => outcome.sent += 1,
            Ok(SendResult::Failed) => outcome.failed += 1,
            Ok(SendResult::Deferred) => outcome.deferred += 1,
            Err(e) => {
                tracing::error!(email_id = %email_id, error = %e, "Dispatch bookkeeping failed");
                outcome.failed += 1;
            }
        }
    }

    if outcome.sent > 0 || outcome.failed > 0 {
        tracing::info!(
            sent = outcome.sent,
            failed = outcome.failed,
            deferred = outcome.deferred,
            "Dispatch cycle finished"
        );
    }

    Ok(outcome)
}

async fn send_one(conn: &mut AsyncPgConnection, email: Email) -> Result<SendResult> {
    let Some(sender) = db::senders::get_by_id(conn, email.sender_id).await? else {
        record_failure(conn, &email, "Sender account no longer exists").await?;
        return Ok(SendResult::Failed);
    };

    // Quota may have been consumed by other campaigns since this email
    // was queued; leave it PENDING for a later cycle
    if sender.remaining_capacity() == 0 {
        tracing::debug!(email_id = %email.id, sender = %sender.email, "Sender at quota, deferring");
        return Ok(SendResult::Deferred);
    }

    let Some(lead) = db::leads::get_by_id(conn, email.lead_id).await? else {
        record_failure(conn, &email, "Lead no longer exists").await?;
        return Ok(SendResult::Failed);
    };
    let contact = db::contacts::primary_for_lead(conn, email.lead_id).await?;

    let tracking_enabled = match email.campaign_id {
        Some(campaign_id) => db::campaigns::get_by_id(conn, campaign_id)
            .await?
            .map(|c| c.tracking_enabled)
            .unwrap_or(false),
        None => false,
    };

    let ctx = RenderContext::new(&lead, contact.as_ref(), &sender);
    let subject = render_placeholders(&email.subject, &ctx);
    let mut body = render_placeholders(&email.body, &ctx);
    if tracking_enabled {
        body = inject_tracking_pixel(&body, &pixel_url(email.tracking_id));
    }

    let attachment_bytes = match &email.attachment_path {
        Some(path) => match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                record_failure(conn, &email, &format!("Cannot read attachment {}: {}", path, e))
                    .await?;
                return Ok(SendResult::Failed);
            }
        },
        None => None,
    };
    let attachment = attachment_bytes.as_deref().and_then(|bytes| {
        email
            .attachment_path
            .as_deref()
            .map(|path| (file_name_of(path), bytes))
    });

    let raw = build_mime(
        &sender.name,
        &sender.email,
        &email.to_address,
        &subject,
        &body,
        attachment,
    );

    let client = match GmailSender::for_sender(&sender).await {
        Ok(client) => client,
        Err(e) => {
            record_failure(conn, &email, &format!("Gmail client error: {}", e)).await?;
            return Ok(SendResult::Failed);
        }
    };

    match client.send_raw(raw.into_bytes()).await {
        Ok(message_id) => {
            record_success(conn, &email, &sender, message_id.as_deref()).await?;
            Ok(SendResult::Sent)
        }
        Err(e) => {
            record_failure(conn, &email, &format!("Send failed: {}", e)).await?;
            Ok(SendResult::Failed)
        }
    }
}

async fn record_success(
    conn: &mut AsyncPgConnection,
    email: &Email,
    sender: &Sender,
    message_id: Option<&str>,
) -> Result<()> {
    db::emails::mark_sent(conn, email.id, message_id).await?;
    db::senders::increment_sent(conn, sender.id).await?;

    if let Some(campaign_id) = email.campaign_id {
        db::campaign_leads::mark_sent(conn, campaign_id, email.lead_id).await?;
        db::campaign_senders::increment_sent(conn, campaign_id, sender.id).await?;
        db::campaigns::increment_leads_worked(conn, campaign_id, 1).await?;
    }

    db::email_events::insert(
        conn,
        NewEmailEvent {
            email_id: email.id,
            event_type: EmailEventType::Sent.as_str().to_string(),
            recipient: email.to_address.clone(),
            campaign_id: email.campaign_id,
            metadata: message_id
                .map(|id| serde_json::json!({ "message_id": id }).to_string()),
            user_agent: None,
            ip_address: None,
        },
    )
    .await?;

    tracing::info!(
        email_id = %email.id,
        to = %email.to_address,
        sender = %sender.email,
        "Email sent"
    );

    Ok(())
}

async fn record_failure(conn: &mut AsyncPgConnection, email: &Email, reason: &str) -> Result<()> {
    tracing::warn!(email_id = %email.id, reason, "Email failed");

    db::emails::mark_failed(conn, email.id, reason).await?;

    if let Some(campaign_id) = email.campaign_id {
        db::campaign_leads::mark_failed(conn, campaign_id, email.lead_id).await?;
    }

    db::email_events::insert(
        conn,
        NewEmailEvent {
            email_id: email.id,
            event_type: EmailEventType::Failed.as_str().to_string(),
            recipient: email.to_address.clone(),
            campaign_id: email.campaign_id,
            metadata: Some(serde_json::json!({ "reason": reason }).to_string()),
            user_agent: None,
            ip_address: None,
        },
    )
    .await?;

    Ok(())
}

fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_lead() -> Lead {
        Lead {
            id: Uuid::new_v4(),
            property_address: Some("12 Oak St".into()),
            property_city: Some("Tulsa".into()),
            property_state: Some("OK".into()),
            property_zip: Some("74101".into()),
            owner_name: Some("Morgan Reyes".into()),
            wholesale_value: Some(85000),
            market_value: Some(120000),
            days_on_market: Some(45),
            status: "NEW".into(),
            source_id: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_sender() -> Sender {
        Sender {
            id: Uuid::new_v4(),
            name: "Jess Harper".into(),
            email: "jess@example.com".into(),
            title: Some("Acquisitions Manager".into()),
            daily_quota: 50,
            emails_sent_today: 0,
            total_emails_sent: 0,
            oauth_refresh_token: Some("1//token".into()),
            is_verified: true,
            last_sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn renders_all_placeholders() {
        let lead = sample_lead();
        let sender = sample_sender();
        let ctx = RenderContext::new(&lead, None, &sender);

        let out = render_placeholders(
            "Hi {{contact_name}}, about {{property_address}} in {{property_city}}, {{property_state}} {{property_zip}}. - {{sender_name}}, {{sender_title}} ({{sender_email}})",
            &ctx,
        );

        assert_eq!(
            out,
            "Hi Morgan Reyes, about 12 Oak St in Tulsa, OK 74101. - Jess Harper, Acquisitions Manager (jess@example.com)"
        );
    }

    #[test]
    fn contact_name_prefers_contact_over_owner() {
        let lead = sample_lead();
        let sender = sample_sender();
        let contact = Contact {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            name: Some("Sam Trustee".into()),
            email: "sam@example.com".into(),
            is_primary: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let ctx = RenderContext::new(&lead, Some(&contact), &sender);
        assert_eq!(render_placeholders("{{contact_name}}", &ctx), "Sam Trustee");
    }

    #[test]
    fn missing_fields_render_empty() {
        let mut lead = sample_lead();
        lead.property_zip = None;
        lead.owner_name = None;
        let sender = sample_sender();
        let ctx = RenderContext::new(&lead, None, &sender);

        assert_eq!(render_placeholders("[{{property_zip}}]", &ctx), "[]");
        assert_eq!(
            render_placeholders("{{contact_name}}", &ctx),
            "Property Owner"
        );
    }

    #[test]
    fn pixel_lands_before_closing_body_tag() {
        let body = "<html><body><p>Hello</p></body></html>";
        let out = inject_tracking_pixel(body, "http://t.example/p.png");
        let pixel_pos = out.find("http://t.example/p.png").unwrap();
        let body_close = out.find("</body>").unwrap();
        assert!(pixel_pos < body_close);
        assert!(out.ends_with("</body></html>"));
    }

    #[test]
    fn pixel_appended_when_no_body_tag() {
        let out = inject_tracking_pixel("<p>Hello</p>", "http://t.example/p.png");
        assert!(out.starts_with("<p>Hello</p><img"));
        assert!(out.contains("http://t.example/p.png"));
    }

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(file_name_of("/srv/attachments/loi.pdf"), "loi.pdf");
        assert_eq!(file_name_of("loi.pdf"), "loi.pdf");
        assert_eq!(file_name_of("C:\\docs\\loi.pdf"), "loi.pdf");
    }
}
