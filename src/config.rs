//! 应用配置模块 - 从 JSON 配置文件加载，缺失字段取默认值

use crate::core::{CompareConfig, ScanConfig};
use crate::logging::LogConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

fn default_listen() -> String {
    "0.0.0.0:8787".to_string()
}

fn default_data_root() -> PathBuf {
    PathBuf::from("./data")
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP 监听地址
    #[serde(default = "default_listen")]
    pub listen: String,
    /// 数据根目录，设备根为其下的 phone/ 与 pc/
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub compare: CompareConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_root: default_data_root(),
            log: LogConfig::default(),
            scan: ScanConfig::default(),
            compare: CompareConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件加载；文件缺失或解析失败时回退到默认配置
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("配置文件解析失败，使用默认配置: {:?} - {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("读取配置文件失败，使用默认配置: {:?} - {}", path, e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load(Path::new("does-not-exist.json"));
        assert_eq!(config.listen, "0.0.0.0:8787");
        assert_eq!(config.data_root, PathBuf::from("./data"));
        assert!(!config.compare.use_checksum);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"listen":"127.0.0.1:9000","compare":{"use_checksum":true}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert!(config.compare.use_checksum);
        // 未给出的段落取默认值
        assert_eq!(config.data_root, PathBuf::from("./data"));
        assert!(config.scan.exclude_patterns.is_empty());
    }
}
