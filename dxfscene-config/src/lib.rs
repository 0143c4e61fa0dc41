use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指向配置文件的环境变量。
pub const CONFIG_ENV: &str = "DXFSCENE_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tessellation: TessellationConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFSCENE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 曲线离散化段数。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TessellationConfig {
    #[serde(default = "TessellationConfig::default_circle_segments")]
    pub circle_segments: usize,
    #[serde(default = "TessellationConfig::default_arc_segments")]
    pub arc_segments: usize,
}

impl TessellationConfig {
    fn default_circle_segments() -> usize {
        32
    }

    fn default_arc_segments() -> usize {
        16
    }
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            circle_segments: Self::default_circle_segments(),
            arc_segments: Self::default_arc_segments(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SceneConfig {
    #[serde(default = "SceneConfig::default_target_envelope_size")]
    pub target_envelope_size: f64,
    #[serde(default = "SceneConfig::default_plane_offset")]
    pub plane_offset: f64,
}

impl SceneConfig {
    fn default_target_envelope_size() -> f64 {
        20.0
    }

    fn default_plane_offset() -> f64 {
        0.01
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            target_envelope_size: Self::default_target_envelope_size(),
            plane_offset: Self::default_plane_offset(),
        }
    }
}

/// 导入限制。`max_file_bytes = 0` 表示不限制。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "ImportConfig::default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl ImportConfig {
    fn default_max_file_bytes() -> u64 {
        50 * 1024 * 1024
    }

    pub fn size_limit(&self) -> Option<u64> {
        (self.max_file_bytes > 0).then_some(self.max_file_bytes)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: Self::default_max_file_bytes(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.tessellation.circle_segments, 32);
        assert_eq!(cfg.tessellation.arc_segments, 16);
        assert_eq!(cfg.scene.target_envelope_size, 20.0);
        assert_eq!(cfg.scene.plane_offset, 0.01);
        assert_eq!(cfg.import.size_limit(), Some(52_428_800));
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [tessellation]
            circle_segments = 64

            [scene]
            target_envelope_size = 50.0
            plane_offset = 0.0

            [import]
            max_file_bytes = 0
            "#
        )
        .expect("write temp file");

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.tessellation.circle_segments, 64);
        assert_eq!(cfg.tessellation.arc_segments, 16);
        assert_eq!(cfg.scene.target_envelope_size, 50.0);
        assert_eq!(cfg.scene.plane_offset, 0.0);
        assert_eq!(cfg.import.size_limit(), None);
    }

    #[test]
    fn repository_default_file_matches_builtin_defaults() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../config/default.toml");
        let cfg = AppConfig::from_file(&path).expect("load repository config");
        let builtin = AppConfig::default();
        assert_eq!(cfg.logging.level, builtin.logging.level);
        assert_eq!(
            cfg.tessellation.circle_segments,
            builtin.tessellation.circle_segments
        );
        assert_eq!(cfg.scene.target_envelope_size, builtin.scene.target_envelope_size);
        assert_eq!(cfg.import.max_file_bytes, builtin.import.max_file_bytes);
    }

    #[test]
    fn invalid_toml_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[tessellation]\ncircle_segments = \"many\"").expect("write temp file");

        let err = AppConfig::from_file(file.path()).expect_err("parse should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));

        let missing = AppConfig::from_file("/nonexistent/dxfscene.toml").expect_err("io should fail");
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
