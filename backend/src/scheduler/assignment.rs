//! Round-robin assignment of pending campaign leads to sender accounts.

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveTime, Utc};
use dealpig_types::{Campaign, EmailStatus};
use diesel_async::AsyncPgConnection;
use rand::Rng;
use uuid::Uuid;

use crate::db;
use crate::models::NewEmail;

/// One sender's share of the day, snapshotted at the start of a cycle
#[derive(Debug, Clone)]
pub struct SenderSlot {
    pub sender_id: Uuid,
    pub capacity: i32,
}

/// Distribute `lead_count` leads over the slots in strict cyclic order:
/// every sender with remaining capacity gets k leads before any sender
/// gets k+1, and a sender at capacity is skipped. Returns one sender id
/// per assignable lead; leads beyond total capacity get nothing.
pub fn distribute_round_robin(lead_count: usize, slots: &[SenderSlot]) -> Vec<Uuid> {
    let mut remaining: Vec<i32> = slots.iter().map(|s| s.capacity.max(0)).collect();
    let mut total: i64 = remaining.iter().map(|&c| c as i64).sum();
    let mut plan = Vec::with_capacity(lead_count.min(total as usize));

    let mut idx = 0;
    while plan.len() < lead_count && total > 0 {
        if remaining[idx] > 0 {
            plan.push(slots[idx].sender_id);
            remaining[idx] -= 1;
            total -= 1;
        }
        idx = (idx + 1) % slots.len();
    }

    plan
}

/// Whether `now` falls inside the campaign's send window, bounds
/// inclusive. A window with end before start is treated as empty.
pub fn within_send_window(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if end < start {
        return false;
    }
    now >= start && now <= end
}

/// Minutes between consecutive sends: the remaining window split evenly
/// over the batch, clamped to the campaign's interval bounds.
pub fn stagger_interval_minutes(
    window_minutes: i64,
    batch_len: usize,
    min_interval: i32,
    max_interval: i32,
) -> i64 {
    if batch_len == 0 {
        return min_interval as i64;
    }
    (window_minutes / batch_len as i64).clamp(min_interval as i64, max_interval as i64)
}

/// Assign this campaign's pending leads for the cycle: claim each
/// campaign_lead row for a sender and queue a pending email with a
/// staggered send time. Returns the number of leads assigned.
pub async fn assign_campaign_leads(
    conn: &mut AsyncPgConnection,
    campaign: &Campaign,
    now: DateTime<Utc>,
) -> Result<usize> {
    let slots: Vec<SenderSlot> = db::campaign_senders::list_with_senders(conn, campaign.id)
        .await?
        .into_iter()
        .filter(|(_, sender)| sender.is_verified && sender.remaining_capacity() > 0)
        .map(|(_, sender)| SenderSlot {
            sender_id: sender.id,
            capacity: sender.remaining_capacity(),
        })
        .collect();

    if slots.is_empty() {
        tracing::debug!(campaign_id = %campaign.id, "No senders with capacity");
        return Ok(0);
    }

    let pending =
        db::campaign_leads::list_pending(conn, campaign.id, campaign.leads_per_day as i64).await?;
    if pending.is_empty() {
        return Ok(0);
    }

    // Resolve contacts before distributing so a lead without an email
    // fails here instead of consuming a sender's slot for the cycle
    let mut assignable = Vec::with_capacity(pending.len());
    for campaign_lead in pending {
        match db::contacts::primary_for_lead(conn, campaign_lead.lead_id).await? {
            Some(contact) => assignable.push((campaign_lead, contact)),
            None => {
                tracing::warn!(
                    campaign_id = %campaign.id,
                    lead_id = %campaign_lead.lead_id,
                    "Lead has no contact email"
                );
                db::campaign_leads::mark_failed(conn, campaign.id, campaign_lead.lead_id).await?;
            }
        }
    }
    if assignable.is_empty() {
        return Ok(0);
    }

    let plan = distribute_round_robin(assignable.len(), &slots);

    let (subject, body) = resolve_message_source(conn, campaign).await?;

    // The window check runs on the local clock, so the remainder must too
    let window_minutes =
        remaining_window_minutes(now.with_timezone(&Local).time(), campaign.end_time);
    let interval = stagger_interval_minutes(
        window_minutes,
        plan.len(),
        campaign.min_interval_minutes,
        campaign.max_interval_minutes,
    );

    let mut assigned = 0;
    for (i, ((campaign_lead, contact), sender_id)) in
        assignable.iter().zip(plan.iter()).enumerate()
    {
        let jitter_secs = rand::thread_rng().gen_range(0..60);
        let send_at = now
            + Duration::minutes(interval * i as i64)
            + Duration::seconds(jitter_secs);

        // The status guard makes repeated cycles safe: an already-claimed
        // row is left alone and no duplicate email is queued
        let claimed =
            db::campaign_leads::claim_for_sender(conn, campaign_lead.id, *sender_id, send_at)
                .await?;
        if !claimed {
            continue;
        }

        db::emails::create(
            conn,
            NewEmail {
                lead_id: campaign_lead.lead_id,
                sender_id: *sender_id,
                campaign_id: Some(campaign.id),
                to_address: contact.email.clone(),
                subject: subject.clone(),
                body: body.clone(),
                attachment_path: campaign.attachment_path.clone(),
                status: EmailStatus::Pending.as_str().to_string(),
                scheduled_for: send_at,
                tracking_id: Uuid::new_v4(),
            },
        )
        .await?;

        assigned += 1;
    }

    if assigned > 0 {
        tracing::info!(
            campaign_id = %campaign.id,
            assigned,
            interval_minutes = interval,
            "Assigned campaign leads"
        );
    }

    Ok(assigned)
}

/// Subject and body templates for the campaign's emails: inline campaign
/// copy wins, then the linked template, then a bare default.
async fn resolve_message_source(
    conn: &mut AsyncPgConnection,
    campaign: &Campaign,
) -> Result<(String, String)> {
    if let (Some(subject), Some(body)) = (&campaign.email_subject, &campaign.email_body) {
        return Ok((subject.clone(), body.clone()));
    }

    if let Some(template_id) = campaign.email_template_id {
        if let Some(template) = db::templates::get_by_id(conn, template_id).await? {
            let subject = campaign
                .email_subject
                .clone()
                .or(template.subject)
                .unwrap_or_else(|| "Regarding your property".to_string());
            let body = campaign.email_body.clone().unwrap_or(template.content);
            return Ok((subject, body));
        }
        tracing::warn!(
            campaign_id = %campaign.id,
            template_id = %template_id,
            "Campaign references a missing template"
        );
    }

    Ok((
        campaign
            .email_subject
            .clone()
            .unwrap_or_else(|| "Regarding your property".to_string()),
        campaign
            .email_body
            .clone()
            .unwrap_or_else(|| "<p>Hello {{contact_name}},</p>".to_string()),
    ))
}

fn remaining_window_minutes(now: NaiveTime, end: NaiveTime) -> i64 {
    if end <= now {
        return 1;
    }
    ((end - now).num_minutes()).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(capacities: &[i32]) -> Vec<SenderSlot> {
        capacities
            .iter()
            .map(|&capacity| SenderSlot {
                sender_id: Uuid::new_v4(),
                capacity,
            })
            .collect()
    }

    #[test]
    fn splits_evenly_across_senders() {
        let slots = slots(&[10, 10, 10]);
        let plan = distribute_round_robin(9, &slots);
        assert_eq!(plan.len(), 9);
        for slot in &slots {
            let share = plan.iter().filter(|&&id| id == slot.sender_id).count();
            assert_eq!(share, 3);
        }
    }

    #[test]
    fn hands_out_in_cyclic_order() {
        let slots = slots(&[5, 5]);
        let plan = distribute_round_robin(4, &slots);
        assert_eq!(plan[0], slots[0].sender_id);
        assert_eq!(plan[1], slots[1].sender_id);
        assert_eq!(plan[2], slots[0].sender_id);
        assert_eq!(plan[3], slots[1].sender_id);
    }

    #[test]
    fn no_sender_gets_second_lead_before_all_get_first() {
        let slots = slots(&[10, 10, 10, 10]);
        let plan = distribute_round_robin(10, &slots);
        for k in 0..plan.len() {
            let prefix = &plan[..=k];
            let mut counts = std::collections::HashMap::new();
            for id in prefix {
                *counts.entry(id).or_insert(0usize) += 1;
            }
            let max = counts.values().max().copied().unwrap_or(0);
            let min_over_all = slots
                .iter()
                .map(|s| counts.get(&s.sender_id).copied().unwrap_or(0))
                .min()
                .unwrap();
            assert!(max - min_over_all <= 1, "uneven at prefix {}", k);
        }
    }

    #[test]
    fn exhausted_sender_is_skipped() {
        let slots = slots(&[2, 0, 2]);
        let plan = distribute_round_robin(4, &slots);
        assert_eq!(plan.len(), 4);
        assert!(!plan.contains(&slots[1].sender_id));
        assert_eq!(
            plan.iter().filter(|&&id| id == slots[0].sender_id).count(),
            2
        );
    }

    #[test]
    fn overflow_leads_stay_unassigned() {
        let slots = slots(&[1, 1]);
        let plan = distribute_round_robin(10, &slots);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn no_capacity_means_empty_plan() {
        let slots = slots(&[0, 0]);
        assert!(distribute_round_robin(5, &slots).is_empty());
    }

    #[test]
    fn send_window_bounds_are_inclusive() {
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        assert!(within_send_window(start, start, end));
        assert!(within_send_window(end, start, end));
        assert!(within_send_window(
            NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
            start,
            end
        ));
        assert!(!within_send_window(
            NaiveTime::from_hms_opt(8, 59, 59).unwrap(),
            start,
            end
        ));
        assert!(!within_send_window(
            NaiveTime::from_hms_opt(17, 0, 1).unwrap(),
            start,
            end
        ));
    }

    #[test]
    fn inverted_window_is_empty() {
        let start = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert!(!within_send_window(
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            start,
            end
        ));
    }

    #[test]
    fn stagger_clamps_to_interval_bounds() {
        // Wide window, tiny batch: clamp to max
        assert_eq!(stagger_interval_minutes(480, 2, 5, 15), 15);
        // Tight window, big batch: clamp to min
        assert_eq!(stagger_interval_minutes(30, 30, 5, 15), 5);
        // In between: plain division
        assert_eq!(stagger_interval_minutes(100, 10, 5, 15), 10);
    }

    #[test]
    fn stagger_handles_empty_batch() {
        assert_eq!(stagger_interval_minutes(480, 0, 5, 15), 5);
    }

    #[test]
    fn window_remainder_is_measured_on_the_window_clock() {
        // 09:30 against a 17:00 close leaves 450 minutes, regardless of
        // what any other clock reads at that moment
        let now = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let end = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        assert_eq!(remaining_window_minutes(now, end), 450);
    }

    #[test]
    fn window_remainder_floors_at_one_minute() {
        let end = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let past_close = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        assert_eq!(remaining_window_minutes(past_close, end), 1);
        assert_eq!(remaining_window_minutes(end, end), 1);
    }

    #[test]
    fn plan_covers_only_leads_with_contacts() {
        // 5 pending leads, 2 without a contact email: the plan is drawn
        // for the 3 assignable ones, so no sender slot is spent on a
        // lead that can never be emailed
        let slots = slots(&[2, 2]);
        let plan = distribute_round_robin(3, &slots);
        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan.iter().filter(|&&id| id == slots[0].sender_id).count(),
            2
        );
        assert_eq!(
            plan.iter().filter(|&&id| id == slots[1].sender_id).count(),
            1
        );
    }
}
