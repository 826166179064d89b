//! Optional chat-notification sink (§6): posts every alert to a single chat
//! via HTTP. Failure is logged and never blocks the reducer (§7).

use std::time::Duration;
use tracing::warn;

use crate::types::{Alert, Severity};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Notifier {
    client: reqwest::Client,
    token: String,
    chat_id: String,
}

impl Notifier {
    pub fn new(token: String, chat_id: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            token,
            chat_id,
        }
    }

    /// Post a single alert. Errors are logged and swallowed — the notifier
    /// is never allowed to slow down or fail the reducer's write path.
    pub async fn notify(&self, alert: &Alert) {
        let text = format!(
            "[{}] {}: {}",
            severity_label(alert.severity),
            alert.container,
            alert.message
        );

        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        if let Err(e) = self.client.post(&url).json(&body).send().await {
            warn!(error = %e, container = %alert.container, "chat notification failed");
        }
    }
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Red => "RED",
        Severity::Green => "GREEN",
        Severity::Blue => "BLUE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn message_format_is_severity_container_message() {
        let alert = Alert {
            id: 1,
            container_pk: 1,
            container: "web".to_string(),
            container_id: "abc".to_string(),
            kind: "restart_loop".to_string(),
            message: "3 restarts in window".to_string(),
            timestamp: Utc::now(),
            severity: Severity::Red,
            details: None,
        };
        let text = format!(
            "[{}] {}: {}",
            severity_label(alert.severity),
            alert.container,
            alert.message
        );
        assert_eq!(text, "[RED] web: 3 restarts in window");
    }
}
