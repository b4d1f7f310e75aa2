use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;
use tracing::debug;

use trackbert_config::MatrixConfig;
use trackbert_domain::ports::Notifier;
use trackbert_errors::{TrackerError, TrackerResult};

const NOTIFIER_NAME: &str = "matrix";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 向Matrix聊天室发送文本消息
pub struct MatrixNotifier {
    client: reqwest::Client,
    homeserver: String,
    room_id: String,
    token: String,
}

impl MatrixNotifier {
    pub fn new(config: &MatrixConfig) -> TrackerResult<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let notifier = Self {
            client,
            homeserver: config.homeserver.clone(),
            room_id: config.room_id.clone(),
            token: config.token.clone(),
        };
        notifier.message_url()?;
        Ok(notifier)
    }

    /// `{homeserver}/_matrix/client/r0/rooms/{room_id}/send/m.room.message?access_token=...`
    pub fn message_url(&self) -> TrackerResult<Url> {
        let invalid = |detail: String| TrackerError::notifier_error(NOTIFIER_NAME, detail);

        let mut url = Url::parse(&self.homeserver)
            .map_err(|e| invalid(format!("无效的homeserver地址 {}: {e}", self.homeserver)))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("homeserver地址不能作为基础路径: {}", self.homeserver)))?
            .pop_if_empty()
            .extend([
                "_matrix",
                "client",
                "r0",
                "rooms",
                self.room_id.as_str(),
                "send",
                "m.room.message",
            ]);
        url.query_pairs_mut()
            .append_pair("access_token", &self.token);
        Ok(url)
    }
}

#[async_trait]
impl Notifier for MatrixNotifier {
    fn name(&self) -> &str {
        NOTIFIER_NAME
    }

    async fn enabled(&self) -> bool {
        !self.homeserver.is_empty() && !self.room_id.is_empty()
    }

    async fn notify(&self, title: &str, message: &str, _urgent: bool) -> TrackerResult<()> {
        let url = self.message_url()?;
        let payload = json!({
            "msgtype": "m.text",
            "body": format!("{title}\n\n{message}"),
        });

        debug!("发送Matrix消息到房间 {}", self.room_id);
        let response = self.client.post(url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TrackerError::notifier_error(
                NOTIFIER_NAME,
                format!("HTTP {}: {}", status.as_u16(), text),
            ));
        }
        Ok(())
    }
}
