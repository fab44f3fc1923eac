//! `/usage` command listener.
//!
//! Long-polls the Bot API for new messages and replies to `/usage` in the
//! chat it came from. Everything else is acknowledged and ignored.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    config::CommandSource,
    notify::{Notifier, TelegramClient, Update},
    report::escape_html,
    services::UsageReportService,
};

const USAGE_COMMAND: &str = "/usage";
/// Pause after a failed `getUpdates` call.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Starts the command listener. Returns once `cancel` fires.
pub async fn start_command_listener(
    service: Arc<UsageReportService>,
    client: Arc<TelegramClient>,
    source: CommandSource,
    cancel: CancellationToken,
) {
    tracing::info!(source = ?source, "Starting command listener");

    let mut offset: Option<i64> = None;

    loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => break,
            polled = client.get_updates(offset) => polled,
        };

        let updates = match polled {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "Polling for chat updates failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(ERROR_BACKOFF) => continue,
                }
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);

            let Some(chat_id) = usage_command_chat(&update) else {
                continue;
            };
            handle_usage_command(&service, client.as_ref(), &chat_id, source).await;
        }
    }

    tracing::info!("Command listener stopped");
}

/// The chat to answer if `update` is a `/usage` command.
fn usage_command_chat(update: &Update) -> Option<String> {
    let message = update.message.as_ref()?;
    let text = message.text.as_deref()?;
    is_usage_command(text).then(|| message.chat.id.to_string())
}

/// Matches `/usage`, `/usage@SomeBot` and either followed by arguments.
pub fn is_usage_command(text: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    let command = first.split_once('@').map_or(first, |(cmd, _)| cmd);
    command == USAGE_COMMAND
}

/// Answer one `/usage` command. Failures are sent back as an `Error:` reply.
pub async fn handle_usage_command(
    service: &UsageReportService,
    notifier: &dyn Notifier,
    chat_id: &str,
    source: CommandSource,
) {
    let reply = match service.answer_usage_command(source).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(chat_id, error = %e, "Failed to answer /usage");
            format!("Error: {}", escape_html(&e.to_string()))
        }
    };

    if let Err(e) = notifier.send_message(chat_id, &reply).await {
        tracing::error!(chat_id, error = %e, "Failed to send /usage reply");
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::{
        services::test_support::{RecordingNotifier, fetcher_for, mount_usage},
        upstream::ApiTimezone,
    };

    #[rstest]
    #[case("/usage", true)]
    #[case("/usage@zquota_bot", true)]
    #[case("/usage now", true)]
    #[case("  /usage", true)]
    #[case("/usages", false)]
    #[case("usage", false)]
    #[case("/start", false)]
    #[case("", false)]
    fn test_is_usage_command(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(is_usage_command(text), expected);
    }

    #[tokio::test]
    async fn test_live_command_replies_with_report() {
        let server = MockServer::start().await;
        mount_usage(&server).await;
        let service = UsageReportService::new(fetcher_for(&server), Some(ApiTimezone::utc()), None);
        let notifier = RecordingNotifier::default();

        handle_usage_command(&service, &notifier, "42", CommandSource::Live).await;

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "42");
        assert!(messages[0].1.starts_with("<b>📊 Usage Report</b>"));
    }

    #[tokio::test]
    async fn test_failure_becomes_error_reply() {
        let server = MockServer::start().await;
        let service = UsageReportService::new(fetcher_for(&server), Some(ApiTimezone::utc()), None);
        let notifier = RecordingNotifier::default();

        handle_usage_command(&service, &notifier, "42", CommandSource::Stored).await;

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, "Error: Database not configured");
    }

    #[tokio::test]
    async fn test_listener_answers_and_advances_offset() {
        let upstream = MockServer::start().await;
        mount_usage(&upstream).await;
        let service = Arc::new(UsageReportService::new(
            fetcher_for(&upstream),
            Some(ApiTimezone::utc()),
            None,
        ));

        let bot = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bott/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 42}, "text": "hello"}},
                    {"update_id": 11, "message": {"message_id": 2, "chat": {"id": 42}, "text": "/usage"}}
                ]
            })))
            .up_to_n_times(1)
            .mount(&bot)
            .await;
        Mock::given(method("POST"))
            .and(path("/bott/getUpdates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": []}))
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&bot)
            .await;
        Mock::given(method("POST"))
            .and(path("/bott/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 3, "chat": {"id": 42}}
            })))
            .mount(&bot)
            .await;

        let client = Arc::new(TelegramClient::new(&bot.uri(), "t", Duration::from_secs(1)).unwrap());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start_command_listener(
            service,
            client,
            CommandSource::Live,
            cancel.clone(),
        ));

        let sends = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let requests = bot.received_requests().await.unwrap_or_default();
                let sends: Vec<_> = requests
                    .into_iter()
                    .filter(|r| r.url.path().ends_with("/sendMessage"))
                    .collect();
                if !sends.is_empty() {
                    break sends;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("listener should reply to /usage");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("listener should stop after cancel")
            .unwrap();

        assert_eq!(sends.len(), 1);
        let body: serde_json::Value = sends[0].body_json().unwrap();
        assert_eq!(body["chat_id"], "42");
        assert_eq!(body["parse_mode"], "HTML");

        let polls: Vec<serde_json::Value> = bot
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().ends_with("/getUpdates"))
            .map(|r| r.body_json().unwrap())
            .collect();
        assert!(polls.len() >= 2);
        assert!(polls[0].get("offset").is_none());
        assert_eq!(polls[1]["offset"], 12);
    }
}
