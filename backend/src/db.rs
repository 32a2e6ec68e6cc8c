use chrono::{DateTime, Utc};
use dealpig_types::{
    Campaign, CampaignLead, CampaignSender, CampaignStats, CampaignStatus, Contact, Email,
    EmailStatus, Lead, LeadSource, QueueStats, Sender, Template,
};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

use crate::models::{
    NewCampaign, NewCampaignLead, NewCampaignSender, NewContact, NewEmail, NewEmailEvent, NewLead,
    NewLeadSource, NewSender, NewTemplate,
};

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    // Parse the connection string and connect with TLS
    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    // Spawn the connection task
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    // Build the async connection from the tokio-postgres client
    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool() -> anyhow::Result<DbPool> {
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

// Lead database operations
pub mod leads {
    use super::*;

    pub async fn list(
        conn: &mut AsyncPgConnection,
        status_filter: Option<&str>,
        search: Option<&str>,
        limit_val: i64,
        offset_val: i64,
    ) -> anyhow::Result<Vec<Lead>> {
        use crate::schema::leads::dsl::*;

        let mut query = leads.order_by(created_at.desc()).into_boxed();

        if let Some(s) = status_filter {
            query = query.filter(status.eq(s.to_string()));
        }
        if let Some(term) = search {
            let pattern = format!("%{}%", term);
            query = query.filter(
                property_address
                    .ilike(pattern.clone())
                    .or(owner_name.ilike(pattern)),
            );
        }

        let items = query
            .limit(limit_val)
            .offset(offset_val)
            .load::<Lead>(conn)
            .await?;

        Ok(items)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        lead_id: Uuid,
    ) -> anyhow::Result<Option<Lead>> {
        use crate::schema::leads::dsl::*;

        let lead = leads
            .filter(id.eq(lead_id))
            .first::<Lead>(conn)
            .await
            .optional()?;

        Ok(lead)
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_lead: NewLead) -> anyhow::Result<Lead> {
        use crate::schema::leads::dsl::*;

        let lead = diesel::insert_into(leads)
            .values(new_lead)
            .get_result::<Lead>(conn)
            .await?;

        Ok(lead)
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        lead_id: Uuid,
        updates: dealpig_types::UpdateLeadRequest,
    ) -> anyhow::Result<Lead> {
        use crate::schema::leads::dsl::*;

        if let Some(v) = updates.property_address {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(property_address.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.property_city {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(property_city.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.property_state {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(property_state.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.property_zip {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(property_zip.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.owner_name {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(owner_name.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.wholesale_value {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(wholesale_value.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.market_value {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(market_value.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.days_on_market {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(days_on_market.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.status {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(status.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.notes {
            diesel::update(leads.filter(id.eq(lead_id)))
                .set(notes.eq(Some(v)))
                .execute(conn)
                .await?;
        }

        // Always update updated_at and return the result
        let updated = diesel::update(leads.filter(id.eq(lead_id)))
            .set(updated_at.eq(Utc::now()))
            .get_result::<Lead>(conn)
            .await?;

        Ok(updated)
    }

    pub async fn mark_contacted(
        conn: &mut AsyncPgConnection,
        lead_id: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::leads::dsl::*;

        diesel::update(leads.filter(id.eq(lead_id)))
            .set((status.eq("CONTACTED"), updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn delete(conn: &mut AsyncPgConnection, lead_id: Uuid) -> anyhow::Result<()> {
        use crate::schema::leads::dsl::*;

        diesel::delete(leads.filter(id.eq(lead_id)))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Contact database operations
pub mod contacts {
    use super::*;

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_contact: NewContact,
    ) -> anyhow::Result<Contact> {
        use crate::schema::contacts::dsl::*;

        let contact = diesel::insert_into(contacts)
            .values(new_contact)
            .get_result::<Contact>(conn)
            .await?;

        Ok(contact)
    }

    pub async fn list_by_lead(
        conn: &mut AsyncPgConnection,
        lead: Uuid,
    ) -> anyhow::Result<Vec<Contact>> {
        use crate::schema::contacts::dsl::*;

        let items = contacts
            .filter(lead_id.eq(lead))
            .order_by((is_primary.desc(), created_at.asc()))
            .load::<Contact>(conn)
            .await?;

        Ok(items)
    }

    /// The primary contact for a lead, or the oldest one when no contact
    /// is marked primary.
    pub async fn primary_for_lead(
        conn: &mut AsyncPgConnection,
        lead: Uuid,
    ) -> anyhow::Result<Option<Contact>> {
        use crate::schema::contacts::dsl::*;

        let contact = contacts
            .filter(lead_id.eq(lead))
            .order_by((is_primary.desc(), created_at.asc()))
            .first::<Contact>(conn)
            .await
            .optional()?;

        Ok(contact)
    }
}

// Lead source database operations
pub mod lead_sources {
    use super::*;

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_source: NewLeadSource,
    ) -> anyhow::Result<LeadSource> {
        use crate::schema::lead_sources::dsl::*;

        let source = diesel::insert_into(lead_sources)
            .values(new_source)
            .get_result::<LeadSource>(conn)
            .await?;

        Ok(source)
    }

    pub async fn list_all(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<LeadSource>> {
        use crate::schema::lead_sources::dsl::*;

        let items = lead_sources
            .order_by(created_at.desc())
            .load::<LeadSource>(conn)
            .await?;

        Ok(items)
    }
}

// Sender database operations
pub mod senders {
    use super::*;

    pub async fn list_all(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<Sender>> {
        use crate::schema::senders::dsl::*;

        let items = senders
            .order_by(created_at.desc())
            .load::<Sender>(conn)
            .await?;

        Ok(items)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        sender_id: Uuid,
    ) -> anyhow::Result<Option<Sender>> {
        use crate::schema::senders::dsl::*;

        let sender = senders
            .filter(id.eq(sender_id))
            .first::<Sender>(conn)
            .await
            .optional()?;

        Ok(sender)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_sender: NewSender,
    ) -> anyhow::Result<Sender> {
        use crate::schema::senders::dsl::*;

        let sender = diesel::insert_into(senders)
            .values(new_sender)
            .get_result::<Sender>(conn)
            .await?;

        Ok(sender)
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        sender_id: Uuid,
        updates: dealpig_types::UpdateSenderRequest,
    ) -> anyhow::Result<Sender> {
        use crate::schema::senders::dsl::*;

        if let Some(v) = updates.name {
            diesel::update(senders.filter(id.eq(sender_id)))
                .set(name.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.title {
            diesel::update(senders.filter(id.eq(sender_id)))
                .set(title.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.daily_quota {
            diesel::update(senders.filter(id.eq(sender_id)))
                .set(daily_quota.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.oauth_refresh_token {
            // Replacing credentials invalidates any earlier verification
            diesel::update(senders.filter(id.eq(sender_id)))
                .set((oauth_refresh_token.eq(Some(v)), is_verified.eq(false)))
                .execute(conn)
                .await?;
        }

        let updated = diesel::update(senders.filter(id.eq(sender_id)))
            .set(updated_at.eq(Utc::now()))
            .get_result::<Sender>(conn)
            .await?;

        Ok(updated)
    }

    pub async fn mark_verified(
        conn: &mut AsyncPgConnection,
        sender_id: Uuid,
    ) -> anyhow::Result<Sender> {
        use crate::schema::senders::dsl::*;

        let updated = diesel::update(senders.filter(id.eq(sender_id)))
            .set((is_verified.eq(true), updated_at.eq(Utc::now())))
            .get_result::<Sender>(conn)
            .await?;

        Ok(updated)
    }

    pub async fn increment_sent(
        conn: &mut AsyncPgConnection,
        sender_id: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::senders::dsl::*;

        diesel::update(senders.filter(id.eq(sender_id)))
            .set((
                emails_sent_today.eq(emails_sent_today + 1),
                total_emails_sent.eq(total_emails_sent + 1),
                last_sent_at.eq(Some(Utc::now())),
                updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn reset_daily_counts(conn: &mut AsyncPgConnection) -> anyhow::Result<usize> {
        use crate::schema::senders::dsl::*;

        let affected = diesel::update(senders)
            .set((emails_sent_today.eq(0), updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        Ok(affected)
    }

    pub async fn delete(conn: &mut AsyncPgConnection, sender_id: Uuid) -> anyhow::Result<()> {
        use crate::schema::senders::dsl::*;

        diesel::delete(senders.filter(id.eq(sender_id)))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Template database operations
pub mod templates {
    use super::*;

    pub async fn list(
        conn: &mut AsyncPgConnection,
        type_filter: Option<&str>,
    ) -> anyhow::Result<Vec<Template>> {
        use crate::schema::templates::dsl::*;

        let mut query = templates.order_by(name.asc()).into_boxed();
        if let Some(t) = type_filter {
            query = query.filter(template_type.eq(t.to_string()));
        }

        let items = query.load::<Template>(conn).await?;

        Ok(items)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        template_id: Uuid,
    ) -> anyhow::Result<Option<Template>> {
        use crate::schema::templates::dsl::*;

        let template = templates
            .filter(id.eq(template_id))
            .first::<Template>(conn)
            .await
            .optional()?;

        Ok(template)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_template: NewTemplate,
    ) -> anyhow::Result<Template> {
        use crate::schema::templates::dsl::*;

        let template = diesel::insert_into(templates)
            .values(new_template)
            .get_result::<Template>(conn)
            .await?;

        Ok(template)
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        template_id: Uuid,
        updates: dealpig_types::UpdateTemplateRequest,
    ) -> anyhow::Result<Template> {
        use crate::schema::templates::dsl::*;

        if let Some(v) = updates.name {
            diesel::update(templates.filter(id.eq(template_id)))
                .set(name.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.subject {
            diesel::update(templates.filter(id.eq(template_id)))
                .set(subject.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.content {
            diesel::update(templates.filter(id.eq(template_id)))
                .set(content.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.template_type {
            diesel::update(templates.filter(id.eq(template_id)))
                .set(template_type.eq(v))
                .execute(conn)
                .await?;
        }

        let updated = diesel::update(templates.filter(id.eq(template_id)))
            .set(updated_at.eq(Utc::now()))
            .get_result::<Template>(conn)
            .await?;

        Ok(updated)
    }

    pub async fn delete(conn: &mut AsyncPgConnection, template_id: Uuid) -> anyhow::Result<()> {
        use crate::schema::templates::dsl::*;

        diesel::delete(templates.filter(id.eq(template_id)))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Campaign database operations
pub mod campaigns {
    use super::*;

    pub async fn list(
        conn: &mut AsyncPgConnection,
        status_filter: Option<&str>,
    ) -> anyhow::Result<Vec<Campaign>> {
        use crate::schema::campaigns::dsl::*;

        let mut query = campaigns.order_by(created_at.desc()).into_boxed();
        if let Some(s) = status_filter {
            query = query.filter(status.eq(s.to_string()));
        }

        let items = query.load::<Campaign>(conn).await?;

        Ok(items)
    }

    pub async fn list_active(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<Campaign>> {
        use crate::schema::campaigns::dsl::*;

        let items = campaigns
            .filter(status.eq(CampaignStatus::Active.as_str()))
            .order_by(created_at.asc())
            .load::<Campaign>(conn)
            .await?;

        Ok(items)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        campaign_id: Uuid,
    ) -> anyhow::Result<Option<Campaign>> {
        use crate::schema::campaigns::dsl::*;

        let campaign = campaigns
            .filter(id.eq(campaign_id))
            .first::<Campaign>(conn)
            .await
            .optional()?;

        Ok(campaign)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_campaign: NewCampaign,
    ) -> anyhow::Result<Campaign> {
        use crate::schema::campaigns::dsl::*;

        let campaign = diesel::insert_into(campaigns)
            .values(new_campaign)
            .get_result::<Campaign>(conn)
            .await?;

        Ok(campaign)
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        campaign_id: Uuid,
        updates: dealpig_types::UpdateCampaignRequest,
    ) -> anyhow::Result<Campaign> {
        use crate::schema::campaigns::dsl::*;

        if let Some(v) = updates.name {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(name.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.description {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(description.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.email_template_id {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(email_template_id.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.leads_per_day {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(leads_per_day.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.start_time {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(start_time.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.end_time {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(end_time.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.min_interval_minutes {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(min_interval_minutes.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.max_interval_minutes {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(max_interval_minutes.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.attachment_path {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(attachment_path.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.tracking_enabled {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(tracking_enabled.eq(v))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.email_subject {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(email_subject.eq(Some(v)))
                .execute(conn)
                .await?;
        }
        if let Some(v) = updates.email_body {
            diesel::update(campaigns.filter(id.eq(campaign_id)))
                .set(email_body.eq(Some(v)))
                .execute(conn)
                .await?;
        }

        let updated = diesel::update(campaigns.filter(id.eq(campaign_id)))
            .set(updated_at.eq(Utc::now()))
            .get_result::<Campaign>(conn)
            .await?;

        Ok(updated)
    }

    /// Transition a campaign to `target`, but only from the statuses the
    /// state machine permits. Returns None when the row exists in a
    /// disallowed status (or not at all) so handlers can 409/404.
    pub async fn set_status(
        conn: &mut AsyncPgConnection,
        campaign_id: Uuid,
        target: CampaignStatus,
    ) -> anyhow::Result<Option<Campaign>> {
        use crate::schema::campaigns::dsl::*;

        let allowed = CampaignStatus::allowed_from(target);

        let updated = diesel::update(
            campaigns
                .filter(id.eq(campaign_id))
                .filter(status.eq_any(allowed.iter().copied())),
        )
        .set((status.eq(target.as_str()), updated_at.eq(Utc::now())))
        .get_result::<Campaign>(conn)
        .await
        .optional()?;

        Ok(updated)
    }

    pub async fn increment_leads_worked(
        conn: &mut AsyncPgConnection,
        campaign_id: Uuid,
        count: i32,
    ) -> anyhow::Result<()> {
        use crate::schema::campaigns::dsl::*;

        diesel::update(campaigns.filter(id.eq(campaign_id)))
            .set((
                leads_worked.eq(leads_worked + count),
                updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn add_total_leads(
        conn: &mut AsyncPgConnection,
        campaign_id: Uuid,
        count: i32,
    ) -> anyhow::Result<()> {
        use crate::schema::campaigns::dsl::*;

        diesel::update(campaigns.filter(id.eq(campaign_id)))
            .set((total_leads.eq(total_leads + count), updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn delete(conn: &mut AsyncPgConnection, campaign_id: Uuid) -> anyhow::Result<()> {
        use crate::schema::campaigns::dsl::*;

        diesel::delete(campaigns.filter(id.eq(campaign_id)))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Campaign sender junction operations
pub mod campaign_senders {
    use super::*;

    pub async fn attach(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
        sender_ids: &[Uuid],
    ) -> anyhow::Result<usize> {
        use crate::schema::campaign_senders::dsl::*;

        let rows: Vec<NewCampaignSender> = sender_ids
            .iter()
            .map(|sid| NewCampaignSender {
                campaign_id: campaign,
                sender_id: *sid,
                is_active: true,
            })
            .collect();

        let inserted = diesel::insert_into(campaign_senders)
            .values(rows)
            .on_conflict_do_nothing()
            .execute(conn)
            .await?;

        Ok(inserted)
    }

    /// Active campaign senders joined with their sender rows.
    pub async fn list_with_senders(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
    ) -> anyhow::Result<Vec<(CampaignSender, Sender)>> {
        use crate::schema::{campaign_senders, senders};

        let rows = campaign_senders::table
            .inner_join(senders::table)
            .filter(campaign_senders::campaign_id.eq(campaign))
            .filter(campaign_senders::is_active.eq(true))
            .order_by(campaign_senders::created_at.asc())
            .load::<(CampaignSender, Sender)>(conn)
            .await?;

        Ok(rows)
    }

    pub async fn increment_sent(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
        sender: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::campaign_senders::dsl::*;

        diesel::update(
            campaign_senders
                .filter(campaign_id.eq(campaign))
                .filter(sender_id.eq(sender)),
        )
        .set((
            emails_sent_today.eq(emails_sent_today + 1),
            total_emails_sent.eq(total_emails_sent + 1),
            last_sent_at.eq(Some(Utc::now())),
            updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn reset_daily_counts(conn: &mut AsyncPgConnection) -> anyhow::Result<usize> {
        use crate::schema::campaign_senders::dsl::*;

        let affected = diesel::update(campaign_senders)
            .set((emails_sent_today.eq(0), updated_at.eq(Utc::now())))
            .execute(conn)
            .await?;

        Ok(affected)
    }
}

// Campaign lead junction operations
pub mod campaign_leads {
    use super::*;
    use dealpig_types::CampaignLeadStatus;

    pub async fn attach(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
        lead_ids: &[Uuid],
    ) -> anyhow::Result<usize> {
        use crate::schema::campaign_leads::dsl::*;

        let rows: Vec<NewCampaignLead> = lead_ids
            .iter()
            .map(|lid| NewCampaignLead {
                campaign_id: campaign,
                lead_id: *lid,
                status: CampaignLeadStatus::Pending.as_str().to_string(),
            })
            .collect();

        let inserted = diesel::insert_into(campaign_leads)
            .values(rows)
            .on_conflict_do_nothing()
            .execute(conn)
            .await?;

        Ok(inserted)
    }

    /// Pending leads for a campaign, oldest first.
    pub async fn list_pending(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
        limit_val: i64,
    ) -> anyhow::Result<Vec<CampaignLead>> {
        use crate::schema::campaign_leads::dsl::*;

        let items = campaign_leads
            .filter(campaign_id.eq(campaign))
            .filter(status.eq(CampaignLeadStatus::Pending.as_str()))
            .order_by(created_at.asc())
            .limit(limit_val)
            .load::<CampaignLead>(conn)
            .await?;

        Ok(items)
    }

    /// Claim a pending campaign lead for a sender. The status guard makes
    /// the claim idempotent: a row already ASSIGNED (by a concurrent or
    /// repeated cycle) is not touched, and the caller sees 0 rows affected.
    pub async fn claim_for_sender(
        conn: &mut AsyncPgConnection,
        campaign_lead_id: Uuid,
        sender: Uuid,
        send_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        use crate::schema::campaign_leads::dsl::*;

        let affected = diesel::update(
            campaign_leads
                .filter(id.eq(campaign_lead_id))
                .filter(status.eq(CampaignLeadStatus::Pending.as_str())),
        )
        .set((
            sender_id.eq(Some(sender)),
            status.eq(CampaignLeadStatus::Assigned.as_str()),
            scheduled_for.eq(Some(send_at)),
            updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;

        Ok(affected > 0)
    }

    pub async fn mark_sent(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
        lead: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::campaign_leads::dsl::*;

        diesel::update(
            campaign_leads
                .filter(campaign_id.eq(campaign))
                .filter(lead_id.eq(lead)),
        )
        .set((
            status.eq(CampaignLeadStatus::Sent.as_str()),
            processed_at.eq(Some(Utc::now())),
            updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
        lead: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::campaign_leads::dsl::*;

        diesel::update(
            campaign_leads
                .filter(campaign_id.eq(campaign))
                .filter(lead_id.eq(lead)),
        )
        .set((
            status.eq(CampaignLeadStatus::Failed.as_str()),
            processed_at.eq(Some(Utc::now())),
            updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn detach(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
        lead: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::campaign_leads::dsl::*;

        diesel::delete(
            campaign_leads
                .filter(campaign_id.eq(campaign))
                .filter(lead_id.eq(lead)),
        )
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn count_for_campaign(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
    ) -> anyhow::Result<i64> {
        use crate::schema::campaign_leads::dsl::*;

        let count: i64 = campaign_leads
            .filter(campaign_id.eq(campaign))
            .count()
            .get_result(conn)
            .await?;

        Ok(count)
    }
}

// Email database operations
pub mod emails {
    use super::*;

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_email: NewEmail,
    ) -> anyhow::Result<Email> {
        use crate::schema::emails::dsl::*;

        let email = diesel::insert_into(emails)
            .values(new_email)
            .get_result::<Email>(conn)
            .await?;

        Ok(email)
    }

    pub async fn list(
        conn: &mut AsyncPgConnection,
        status_filter: Option<&str>,
        campaign: Option<Uuid>,
        limit_val: i64,
        offset_val: i64,
    ) -> anyhow::Result<Vec<Email>> {
        use crate::schema::emails::dsl::*;

        let mut query = emails.order_by(created_at.desc()).into_boxed();

        if let Some(s) = status_filter {
            query = query.filter(status.eq(s.to_string()));
        }
        if let Some(c) = campaign {
            query = query.filter(campaign_id.eq(Some(c)));
        }

        let items = query
            .limit(limit_val)
            .offset(offset_val)
            .load::<Email>(conn)
            .await?;

        Ok(items)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        email_id: Uuid,
    ) -> anyhow::Result<Option<Email>> {
        use crate::schema::emails::dsl::*;

        let email = emails
            .filter(id.eq(email_id))
            .first::<Email>(conn)
            .await
            .optional()?;

        Ok(email)
    }

    pub async fn get_by_tracking_id(
        conn: &mut AsyncPgConnection,
        tracking: Uuid,
    ) -> anyhow::Result<Option<Email>> {
        use crate::schema::emails::dsl::*;

        let email = emails
            .filter(tracking_id.eq(tracking))
            .first::<Email>(conn)
            .await
            .optional()?;

        Ok(email)
    }

    /// Pending emails that are due, oldest scheduled first.
    pub async fn due_pending(
        conn: &mut AsyncPgConnection,
        now: DateTime<Utc>,
        limit_val: i64,
    ) -> anyhow::Result<Vec<Email>> {
        use crate::schema::emails::dsl::*;

        let items = emails
            .filter(status.eq(EmailStatus::Pending.as_str()))
            .filter(scheduled_for.le(now))
            .order_by(scheduled_for.asc())
            .limit(limit_val)
            .load::<Email>(conn)
            .await?;

        Ok(items)
    }

    pub async fn mark_sent(
        conn: &mut AsyncPgConnection,
        email_id: Uuid,
        gmail_message_id: Option<&str>,
    ) -> anyhow::Result<Email> {
        use crate::schema::emails::dsl::*;

        let updated = diesel::update(emails.filter(id.eq(email_id)))
            .set((
                status.eq(EmailStatus::Sent.as_str()),
                sent_at.eq(Some(Utc::now())),
                message_id.eq(gmail_message_id),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<Email>(conn)
            .await?;

        Ok(updated)
    }

    pub async fn mark_failed(
        conn: &mut AsyncPgConnection,
        email_id: Uuid,
        reason: &str,
    ) -> anyhow::Result<Email> {
        use crate::schema::emails::dsl::*;

        let updated = diesel::update(emails.filter(id.eq(email_id)))
            .set((
                status.eq(EmailStatus::Failed.as_str()),
                bounce_reason.eq(Some(reason)),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<Email>(conn)
            .await?;

        Ok(updated)
    }

    /// Record an open. Only the first open sets `opened_at`, and the
    /// status is only upgraded from SENT so later REPLIED/BOUNCED state
    /// is never clobbered by a pixel re-fetch.
    pub async fn mark_opened(
        conn: &mut AsyncPgConnection,
        email_id: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::emails::dsl::*;

        diesel::update(
            emails
                .filter(id.eq(email_id))
                .filter(opened_at.is_null()),
        )
        .set((opened_at.eq(Some(Utc::now())), updated_at.eq(Utc::now())))
        .execute(conn)
        .await?;

        diesel::update(
            emails
                .filter(id.eq(email_id))
                .filter(status.eq(EmailStatus::Sent.as_str())),
        )
        .set(status.eq(EmailStatus::Opened.as_str()))
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn mark_bounced(
        conn: &mut AsyncPgConnection,
        email_id: Uuid,
        reason: &str,
    ) -> anyhow::Result<Email> {
        use crate::schema::emails::dsl::*;

        let updated = diesel::update(emails.filter(id.eq(email_id)))
            .set((
                status.eq(EmailStatus::Bounced.as_str()),
                bounced_at.eq(Some(Utc::now())),
                bounce_reason.eq(Some(reason)),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<Email>(conn)
            .await?;

        Ok(updated)
    }

    pub async fn mark_replied(
        conn: &mut AsyncPgConnection,
        email_id: Uuid,
    ) -> anyhow::Result<Email> {
        use crate::schema::emails::dsl::*;

        let updated = diesel::update(emails.filter(id.eq(email_id)))
            .set((
                status.eq(EmailStatus::Replied.as_str()),
                replied_at.eq(Some(Utc::now())),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<Email>(conn)
            .await?;

        Ok(updated)
    }

    pub async fn queue_stats(conn: &mut AsyncPgConnection) -> anyhow::Result<QueueStats> {
        use crate::schema::emails::dsl::*;
        use diesel::dsl::count_star;

        let pending: i64 = emails
            .filter(status.eq(EmailStatus::Pending.as_str()))
            .select(count_star())
            .first(conn)
            .await?;

        let sent: i64 = emails
            .filter(status.ne_all(vec![
                EmailStatus::Pending.as_str(),
                EmailStatus::Failed.as_str(),
            ]))
            .select(count_star())
            .first(conn)
            .await?;

        let failed: i64 = emails
            .filter(status.eq(EmailStatus::Failed.as_str()))
            .select(count_star())
            .first(conn)
            .await?;

        Ok(QueueStats {
            pending,
            sent,
            failed,
        })
    }

    pub async fn campaign_stats(
        conn: &mut AsyncPgConnection,
        campaign: Uuid,
    ) -> anyhow::Result<CampaignStats> {
        use crate::schema::emails::dsl::*;
        use diesel::dsl::count_star;

        let total_leads = super::campaign_leads::count_for_campaign(conn, campaign).await?;

        // Counts are taken sequentially on the one connection
        let pending: i64 = emails
            .filter(campaign_id.eq(Some(campaign)))
            .filter(status.eq(EmailStatus::Pending.as_str()))
            .select(count_star())
            .first(conn)
            .await?;
        let sent: i64 = emails
            .filter(campaign_id.eq(Some(campaign)))
            .filter(status.eq(EmailStatus::Sent.as_str()))
            .select(count_star())
            .first(conn)
            .await?;
        let opened: i64 = emails
            .filter(campaign_id.eq(Some(campaign)))
            .filter(status.eq(EmailStatus::Opened.as_str()))
            .select(count_star())
            .first(conn)
            .await?;
        let replied: i64 = emails
            .filter(campaign_id.eq(Some(campaign)))
            .filter(status.eq(EmailStatus::Replied.as_str()))
            .select(count_star())
            .first(conn)
            .await?;
        let bounced: i64 = emails
            .filter(campaign_id.eq(Some(campaign)))
            .filter(status.eq(EmailStatus::Bounced.as_str()))
            .select(count_star())
            .first(conn)
            .await?;
        let failed: i64 = emails
            .filter(campaign_id.eq(Some(campaign)))
            .filter(status.eq(EmailStatus::Failed.as_str()))
            .select(count_star())
            .first(conn)
            .await?;

        Ok(CampaignStats {
            total_leads,
            pending,
            sent,
            opened,
            replied,
            bounced,
            failed,
        })
    }
}

// Email event audit log
pub mod email_events {
    use super::*;

    pub async fn insert(
        conn: &mut AsyncPgConnection,
        event: NewEmailEvent,
    ) -> anyhow::Result<()> {
        use crate::schema::email_events::dsl::*;

        diesel::insert_into(email_events)
            .values(event)
            .execute(conn)
            .await?;

        Ok(())
    }
}
