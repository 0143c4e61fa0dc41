use std::path::PathBuf;

use dxfscene_config::{AppConfig, ConfigError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod import;

use import::{Summary, import_file};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut emit_json = false;
    let mut input: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => emit_json = true,
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            other if other.starts_with("--") => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
            other => {
                if input.is_some() {
                    eprintln!("只能指定一个 DXF 文件：{other}");
                    std::process::exit(1);
                }
                input = Some(PathBuf::from(other));
            }
        }
    }

    let Some(input) = input else {
        eprintln!("用法：dxfscene [--config PATH] [--json] FILE.dxf");
        std::process::exit(1);
    };

    let config = load_configuration(config_override);
    init_logging(&config);
    info!(path = %input.display(), "开始导入 DXF");

    let outcome = match import_file(&input, &config) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "导入失败");
            std::process::exit(1);
        }
    };

    if outcome.drawing.is_empty() {
        warn!(path = %input.display(), "文档中没有可显示的图元");
    }

    if emit_json {
        match serde_json::to_string_pretty(&outcome.drawing) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!(error = %err, "序列化结果失败");
                std::process::exit(1);
            }
        }
    } else {
        print!("{}", Summary(&outcome));
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    // 日志写到 stderr，stdout 只输出导入结果
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
