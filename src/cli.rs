use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use trackbert_config::AppConfig;

use crate::app::ShipmentAction;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// 命令行解析后的操作
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    GenerateConfig { path: PathBuf },
    Shipment(ShipmentAction),
    ListCarriers,
    Daemon,
}

pub fn build_cli() -> Command {
    Command::new("trackbert")
        .version(env!("CARGO_PKG_VERSION"))
        .about("快递包裹追踪与通知守护进程")
        .arg(
            Arg::new("tracking-number")
                .short('n')
                .long("tracking-number")
                .value_name("NUMBER")
                .help("包裹单号"),
        )
        .arg(
            Arg::new("carrier")
                .short('c')
                .long("carrier")
                .value_name("CODE")
                .help("承运商代码，使用 --list-carriers 查看"),
        )
        .arg(
            Arg::new("description")
                .short('d')
                .long("description")
                .value_name("TEXT")
                .help("包裹描述"),
        )
        .arg(
            Arg::new("update")
                .short('u')
                .long("update")
                .action(ArgAction::SetTrue)
                .requires("tracking-number")
                .help("更新已有包裹"),
        )
        .arg(
            Arg::new("disable")
                .short('D')
                .long("disable")
                .action(ArgAction::SetTrue)
                .requires("tracking-number")
                .conflicts_with("update")
                .help("停止追踪包裹"),
        )
        .arg(
            Arg::new("list-carriers")
                .short('l')
                .long("list-carriers")
                .action(ArgAction::SetTrue)
                .help("列出支持的承运商"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .action(ArgAction::SetTrue)
                .help("生成默认配置文件"),
        )
        .arg(
            Arg::new("config-file")
                .short('C')
                .long("config-file")
                .value_name("FILE")
                .help("配置文件路径")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["pretty", "json", "compact"]),
        )
}

/// 只有显式指定的配置文件才要求存在
pub fn explicit_config_path(matches: &ArgMatches) -> Option<&str> {
    match matches.value_source("config-file") {
        Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable) => matches
            .get_one::<String>("config-file")
            .map(String::as_str),
        _ => None,
    }
}

pub fn parse_command(matches: &ArgMatches) -> Result<CliCommand> {
    if matches.get_flag("generate-config") {
        let path = matches
            .get_one::<String>("config-file")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONFIG_FILE);
        return Ok(CliCommand::GenerateConfig {
            path: PathBuf::from(path),
        });
    }

    if matches.get_flag("list-carriers") {
        return Ok(CliCommand::ListCarriers);
    }

    let Some(tracking_number) = matches.get_one::<String>("tracking-number").cloned() else {
        return Ok(CliCommand::Daemon);
    };
    let carrier = matches.get_one::<String>("carrier").cloned();
    let description = matches.get_one::<String>("description").cloned();

    if matches.get_flag("disable") {
        return Ok(CliCommand::Shipment(ShipmentAction::Disable { tracking_number }));
    }

    if matches.get_flag("update") {
        if carrier.is_none() && description.is_none() {
            bail!("更新包裹需要指定 -c 或 -d");
        }
        return Ok(CliCommand::Shipment(ShipmentAction::Update {
            tracking_number,
            carrier,
            description,
        }));
    }

    match carrier {
        Some(carrier) => Ok(CliCommand::Shipment(ShipmentAction::Create {
            tracking_number,
            carrier,
            description,
        })),
        None => bail!("必须使用 -c 指定承运商"),
    }
}

/// 写出默认配置，不覆盖已有文件
pub fn write_default_config(path: &Path) -> Result<()> {
    let content = AppConfig::default_toml()?;

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            bail!("配置文件 {} 已存在", path.display())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("创建配置文件失败: {}", path.display()))
        }
    };

    file.write_all(content.as_bytes())
        .with_context(|| format!("写入配置文件失败: {}", path.display()))
}
