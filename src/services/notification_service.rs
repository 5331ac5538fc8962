use crate::error::AppResult;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Outbound messaging channel (`send(recipientId, text)`).
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<()>;
}

/// Committed draw result to fan out
#[derive(Debug, Clone)]
pub struct DrawAnnouncement {
    pub lottery_id: i64,
    pub lottery_name: String,
    pub winner_id: i64,
    pub winner_name: String,
    pub ticket_number: i32,
    pub random_link: Option<String>,
    /// Distinct buyers of the lottery, winner included
    pub participants: Vec<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationService {
    transport: Option<Arc<dyn MessageTransport>>,
    admin_chat_id: Option<i64>,
    send_timeout: Duration,
}

impl NotificationService {
    pub fn new(
        transport: Option<Arc<dyn MessageTransport>>,
        admin_chat_id: Option<i64>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            admin_chat_id,
            send_timeout,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, None, Duration::from_secs(5))
    }

    /// Fire-and-forget: the fan-out runs detached from the caller.
    pub fn announce(&self, announcement: DrawAnnouncement) {
        if self.transport.is_none() {
            log::debug!(
                "Notifications disabled, skipping announcement for lottery {}",
                announcement.lottery_id
            );
            return;
        }

        let service = self.clone();
        tokio::spawn(async move {
            let report = service.dispatch(&announcement).await;
            log::info!(
                "Lottery {} announcement: {} delivered, {} failed",
                announcement.lottery_id,
                report.delivered,
                report.failed
            );
        });
    }

    /// One attempt per recipient, all concurrently; a failure only counts
    /// against that recipient.
    pub async fn dispatch(&self, announcement: &DrawAnnouncement) -> DeliveryReport {
        let Some(transport) = self.transport.as_ref() else {
            return DeliveryReport::default();
        };

        let messages = render_messages(announcement, self.admin_chat_id);
        let sends = messages.iter().map(|(chat_id, text)| {
            let transport = transport.clone();
            async move {
                match tokio::time::timeout(self.send_timeout, transport.send(*chat_id, text)).await
                {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        log::warn!("Failed to notify {chat_id}: {e}");
                        false
                    }
                    Err(_) => {
                        log::warn!("Timed out notifying {chat_id}");
                        false
                    }
                }
            }
        });

        let results = join_all(sends).await;
        let delivered = results.iter().filter(|ok| **ok).count();
        DeliveryReport {
            delivered,
            failed: results.len() - delivered,
        }
    }
}

/// Messages per recipient: winner, every other participant once, and the
/// operator channel unless the operator is the winner.
pub fn render_messages(a: &DrawAnnouncement, admin_chat_id: Option<i64>) -> Vec<(i64, String)> {
    let name = escape_html(&a.lottery_name);
    let winner_name = escape_html(&a.winner_name);
    let link_html = a
        .random_link
        .as_deref()
        .map(|link| format!("\n<a href=\"{}\">Verify on random.org</a>", escape_html(link)))
        .unwrap_or_default();

    let mut messages = Vec::with_capacity(a.participants.len() + 1);

    if let Some(admin) = admin_chat_id
        && admin != a.winner_id
    {
        let link_line = a
            .random_link
            .as_deref()
            .map(|link| format!("\nVerification link: {}", escape_html(link)))
            .unwrap_or_default();
        messages.push((
            admin,
            format!(
                "Lottery '{name}' finished. Winner: {winner_name} (ID {}) with ticket #{}.{link_line}",
                a.winner_id, a.ticket_number
            ),
        ));
    }

    let mut seen = HashSet::new();
    for &user_id in a.participants.iter().filter(|id| seen.insert(**id)) {
        let text = if user_id == a.winner_id {
            format!(
                "🎉 Congratulations! You won the lottery '{name}' with ticket #{}.{link_html}",
                a.ticket_number
            )
        } else {
            format!(
                "The lottery '{name}' is finished! Winner: {winner_name}, ticket #{}.{link_html}",
                a.ticket_number
            )
        };
        messages.push((user_id, text));
    }

    messages
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTransport;

    fn announcement() -> DrawAnnouncement {
        DrawAnnouncement {
            lottery_id: 1,
            lottery_name: "Lottery #1".into(),
            winner_id: 20,
            winner_name: "bob".into(),
            ticket_number: 4,
            random_link: Some("https://is.gd/x?a=1&b=2".into()),
            participants: vec![10, 20, 30, 20],
        }
    }

    #[test]
    fn test_render_one_message_per_participant_plus_admin() {
        let messages = render_messages(&announcement(), Some(99));
        let chats: Vec<i64> = messages.iter().map(|(c, _)| *c).collect();
        assert_eq!(chats, vec![99, 10, 20, 30]);

        let winner_text = &messages[2].1;
        assert!(winner_text.contains("Congratulations"));
        assert!(winner_text.contains("#4"));
        assert!(winner_text.contains("https://is.gd/x?a=1&amp;b=2"));
        assert!(messages[1].1.contains("Winner: bob"));
        assert!(messages[0].1.contains("(ID 20)"));
    }

    #[test]
    fn test_render_skips_admin_when_admin_won_and_omits_missing_link() {
        let mut a = announcement();
        a.random_link = None;
        let messages = render_messages(&a, Some(20));
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|(_, text)| !text.contains("href")));
    }

    #[test]
    fn test_names_are_escaped() {
        let mut a = announcement();
        a.lottery_name = "<b>Big</b> & co".into();
        let messages = render_messages(&a, None);
        assert!(messages[0].1.contains("&lt;b&gt;Big&lt;/b&gt; &amp; co"));
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_block_others() {
        let transport = Arc::new(RecordingTransport::failing_for([10]));
        let service = NotificationService::new(
            Some(transport.clone() as Arc<dyn MessageTransport>),
            Some(99),
            Duration::from_secs(1),
        );

        let report = service.dispatch(&announcement()).await;
        assert_eq!(
            report,
            DeliveryReport {
                delivered: 3,
                failed: 1
            }
        );

        let mut delivered = transport.recipients().await;
        delivered.sort_unstable();
        assert_eq!(delivered, vec![20, 30, 99]);
    }

    #[tokio::test]
    async fn test_slow_recipient_times_out() {
        let transport = Arc::new(RecordingTransport::hanging_for([30]));
        let service = NotificationService::new(
            Some(transport.clone() as Arc<dyn MessageTransport>),
            None,
            Duration::from_millis(100),
        );

        let report = service.dispatch(&announcement()).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_disabled_service_sends_nothing() {
        let report = NotificationService::disabled()
            .dispatch(&announcement())
            .await;
        assert_eq!(report, DeliveryReport::default());
    }
}
