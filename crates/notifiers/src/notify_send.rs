use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use trackbert_config::NotifySendConfig;
use trackbert_domain::ports::Notifier;
use trackbert_errors::{TrackerError, TrackerResult};

const NOTIFIER_NAME: &str = "notify-send";
const APP_NAME: &str = "trackbert";
/// 等待 `notify-send` 退出的上限
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// 通过 `notify-send` 发送桌面通知
pub struct NotifySendNotifier {
    program: String,
    configured: bool,
    timeout_ms: u64,
    icon: Option<String>,
    command_timeout: Duration,
}

impl NotifySendNotifier {
    pub fn new(config: &NotifySendConfig) -> Self {
        Self {
            program: "notify-send".to_string(),
            configured: config.enabled,
            timeout_ms: config.timeout_ms,
            icon: config.icon.clone(),
            command_timeout: COMMAND_TIMEOUT,
        }
    }

    /// 替换可执行文件路径
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// 紧急通知使用 `critical` 级别且不设超时
    pub fn build_args(&self, title: &str, message: &str, urgent: bool) -> Vec<String> {
        let mut args = vec![
            "-a".to_string(),
            APP_NAME.to_string(),
            "-u".to_string(),
            if urgent { "critical" } else { "normal" }.to_string(),
        ];

        if let Some(icon) = &self.icon {
            args.push("-i".to_string());
            args.push(icon.clone());
        }

        if !urgent && self.timeout_ms > 0 {
            args.push("-t".to_string());
            args.push(self.timeout_ms.to_string());
        }

        args.push(title.to_string());
        args.push(message.to_string());
        args
    }
}

#[async_trait]
impl Notifier for NotifySendNotifier {
    fn name(&self) -> &str {
        NOTIFIER_NAME
    }

    async fn enabled(&self) -> bool {
        if !self.configured {
            return false;
        }

        match Command::new(&self.program)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("无法执行 {}，桌面通知已禁用: {}", self.program, e);
                false
            }
        }
    }

    async fn notify(&self, title: &str, message: &str, urgent: bool) -> TrackerResult<()> {
        debug!("发送桌面通知: {} - {}", title, message);

        let mut child = Command::new(&self.program)
            .args(self.build_args(title, message, urgent))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TrackerError::notifier_error(NOTIFIER_NAME, format!("启动 {} 失败: {e}", self.program))
            })?;

        let status = match tokio::time::timeout(self.command_timeout, child.wait()).await {
            Ok(result) => result.map_err(|e| {
                TrackerError::notifier_error(NOTIFIER_NAME, format!("等待 {} 失败: {e}", self.program))
            })?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("结束超时的 {} 进程失败: {}", self.program, e);
                }
                return Err(TrackerError::notifier_error(
                    NOTIFIER_NAME,
                    format!("{} 超时 ({:?})", self.program, self.command_timeout),
                ));
            }
        };

        if !status.success() {
            return Err(TrackerError::notifier_error(
                NOTIFIER_NAME,
                format!("{} 退出码: {:?}", self.program, status.code()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(icon: Option<&str>) -> NotifySendNotifier {
        NotifySendNotifier::new(&NotifySendConfig {
            enabled: true,
            timeout_ms: 5000,
            icon: icon.map(str::to_string),
        })
    }

    #[test]
    fn test_normal_notification_args() {
        let args = notifier(None).build_args("标题", "内容", false);
        assert_eq!(
            args,
            vec!["-a", "trackbert", "-u", "normal", "-t", "5000", "标题", "内容"]
        );
    }

    #[test]
    fn test_urgent_notification_has_no_timeout() {
        let args = notifier(Some("/tmp/parcel.png")).build_args("标题", "内容", true);
        assert_eq!(
            args,
            vec!["-a", "trackbert", "-u", "critical", "-i", "/tmp/parcel.png", "标题", "内容"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_disables_notifier() {
        let notifier = notifier(None).with_program("/nonexistent/notify-send-binary");
        assert!(!notifier.enabled().await);
        assert!(notifier.notify("t", "m", false).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_in_config() {
        let notifier = NotifySendNotifier::new(&NotifySendConfig {
            enabled: false,
            ..Default::default()
        })
        .with_program("true");
        assert!(!notifier.enabled().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_checked() {
        assert!(notifier(None).with_program("true").notify("t", "m", true).await.is_ok());
        assert!(notifier(None).with_program("false").notify("t", "m", true).await.is_err());
    }
}
