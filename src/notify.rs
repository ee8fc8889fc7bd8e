use crate::config::SlackConfig;
use crate::error::Error;
use log::{error, info};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Posts a text message, which may contain `<url|label>` links, to the configured channel.
    async fn send(&self, message: &str) -> Result<(), Error>;
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackNotifier {
    client: Client,
    api_url: String,
    token: String,
    channel: String,
}

impl SlackNotifier {
    pub fn new(client: Client, config: &SlackConfig) -> Self {
        SlackNotifier {
            client,
            api_url: config.slack_api_url.clone(),
            token: config.slack_token.clone(),
            channel: config.slack_channel.clone(),
        }
    }

    fn post_message_url(&self) -> Result<Url, Error> {
        let mut url = Url::parse(&self.api_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .pop_if_empty()
            .push("chat.postMessage");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, message: &str) -> Result<(), Error> {
        let resp = self
            .client
            .post(self.post_message_url()?)
            .bearer_auth(&self.token)
            .json(&json!({
                "channel": self.channel,
                "text": message,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Notify {
                message: format!("{}, {}", status, body),
            });
        }

        delivery_result(resp.json().await?)
    }
}

/// Slack reports most failures with a 200 and `ok: false`.
fn delivery_result(body: PostMessageResponse) -> Result<(), Error> {
    if body.ok {
        return Ok(());
    }
    Err(Error::Notify {
        message: body.error.unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Sends `message`, logging instead of failing when delivery does not work out.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: &str) -> bool {
    match notifier.send(message).await {
        Ok(()) => {
            info!("Message sent successfully to Slack");
            true
        }
        Err(err) => {
            error!("Failed to send message: {}", err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_message_url() {
        let config = SlackConfig {
            slack_api_url: "https://slack.com/api".to_string(),
            slack_token: "xoxb".to_string(),
            slack_channel: "C123".to_string(),
        };
        let notifier = SlackNotifier::new(Client::new(), &config);

        assert_eq!(
            notifier.post_message_url().unwrap().as_str(),
            "https://slack.com/api/chat.postMessage"
        );
    }

    #[test]
    fn test_ok_false_is_notify_error() {
        let body: PostMessageResponse =
            serde_json::from_value(json!({"ok": false, "error": "channel_not_found"})).unwrap();

        match delivery_result(body) {
            Err(Error::Notify { message }) => assert_eq!(message, "channel_not_found"),
            other => panic!("expected notify error, got {:?}", other),
        }

        let body: PostMessageResponse = serde_json::from_value(json!({"ok": false})).unwrap();
        assert!(matches!(delivery_result(body), Err(Error::Notify { .. })));

        let body: PostMessageResponse =
            serde_json::from_value(json!({"ok": true, "ts": "1714608000.000100"})).unwrap();
        assert!(delivery_result(body).is_ok());
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failures() {
        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(1).returning(|_| {
            Err(Error::Notify {
                message: "channel_not_found".to_string(),
            })
        });

        assert!(!notify_best_effort(&notifier, "hello").await);
    }

    #[tokio::test]
    async fn test_best_effort_passes_message_through() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|message| message.contains("|Performance>"))
            .times(1)
            .returning(|_| Ok(()));

        assert!(notify_best_effort(&notifier, "<https://x|Performance>").await);
    }
}
