use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trackbert::cli::{
    build_cli, explicit_config_path, parse_command, write_default_config, CliCommand,
};
use trackbert::{Application, ShipmentAction, ShutdownManager};
use trackbert_config::{AppConfig, LogFormat, LoggingConfig};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let command = parse_command(&matches)?;

    if let CliCommand::GenerateConfig { path } = &command {
        write_default_config(path)?;
        println!("已生成配置文件 {}", path.display());
        return Ok(());
    }

    let mut config = AppConfig::load(explicit_config_path(&matches))
        .context("加载配置失败")?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.parse().map_err(anyhow::Error::msg)?;
    }

    init_logging(&config.logging)?;

    let app = Application::new(config).await?;

    let result = match command {
        CliCommand::Shipment(action) => run_shipment_action(&app, action).await,
        CliCommand::ListCarriers => print_carriers(&app).await,
        CliCommand::Daemon => run_daemon(app).await,
        CliCommand::GenerateConfig { .. } => Ok(()),
    };

    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

async fn run_shipment_action(app: &Application, action: ShipmentAction) -> Result<()> {
    let verb = match &action {
        ShipmentAction::Create { .. } => "已创建",
        ShipmentAction::Update { .. } => "已更新",
        ShipmentAction::Disable { .. } => "已停止追踪",
    };
    let shipment = app.apply(action).await?;
    println!(
        "{verb}包裹 {} (承运商: {})",
        shipment.tracking_number,
        shipment.carrier.as_deref().unwrap_or("-")
    );
    app.close().await;
    Ok(())
}

async fn print_carriers(app: &Application) -> Result<()> {
    let carriers = app.list_carriers().await?;
    println!("支持的承运商:\n");
    println!("{:<24} {:<32} {}", "代码", "名称", "追踪服务");
    for (code, name, provider) in carriers {
        println!("{:<24} {:<32} {}", code, name.as_deref().unwrap_or("-"), provider);
    }
    app.close().await;
    Ok(())
}

async fn run_daemon(app: Application) -> Result<()> {
    info!("启动Trackbert守护进程");

    let shutdown_manager = ShutdownManager::new();
    let app = Arc::new(app);

    let mut app_handle = {
        let app = Arc::clone(&app);
        let shutdown = shutdown_manager.subscribe();
        tokio::spawn(async move { app.run(shutdown).await })
    };

    let outcome = tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown();

            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut app_handle).await {
                Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
                Ok(Ok(Err(e))) => error!("应用关闭时发生错误: {e:#}"),
                Ok(Err(e)) => error!("应用任务异常结束: {e}"),
                Err(_) => {
                    warn!("应用关闭超时，强制退出");
                    app_handle.abort();
                }
            }
            Ok(())
        }
        joined = &mut app_handle => {
            // 未收到关闭信号时引擎只会因致命错误退出
            match joined {
                Ok(result) => result,
                Err(e) => Err(anyhow::Error::new(e).context("应用任务异常结束")),
            }
        }
    };

    app.close().await;
    info!("Trackbert已退出");
    outcome
}

/// 初始化日志系统，`RUST_LOG` 优先于配置
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = config.effective_level().to_string();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
            .context("初始化Compact日志格式失败")?,
    }

    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到Ctrl+C信号"),
        _ = terminate => info!("收到SIGTERM信号"),
    }
}
