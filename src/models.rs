//! 数据模型 - 设备、文件记录与同步计划的线上格式

use serde::{Deserialize, Serialize};
use std::fmt;

/// 设备标识（同步的两端）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Phone,
    Pc,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Phone => "phone",
            Device::Pc => "pc",
        }
    }

    /// 另一端设备
    pub fn peer(&self) -> Device {
        match self {
            Device::Phone => Device::Pc,
            Device::Pc => Device::Phone,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次扫描中的单个文件或目录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    /// 相对设备根目录的路径，统一使用 / 分隔符
    pub path: String,
    pub is_dir: bool,
    /// 目录固定为 0
    pub size_bytes: u64,
    /// 文件系统修改时间（毫秒时间戳）
    pub modified_ms: i64,
    /// 内容校验和（仅在开启 checksum 比较时填充）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// 同步方向
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    PhoneToPc,
    PcToPhone,
    Bidirectional,
}

/// 文件操作类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Upload,
    Delete,
    Mkdir,
    Move,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Upload => "upload",
            OperationKind::Delete => "delete",
            OperationKind::Mkdir => "mkdir",
            OperationKind::Move => "move",
        };
        f.write_str(s)
    }
}

/// 计划中的单个操作
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedOperation {
    pub operation: OperationKind,
    pub device_src: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_dst: Option<Device>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_path: Option<String>,
    /// 选择该操作的原因（例如 "missing on pc"）
    pub reason: String,
}

/// 计划统计
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanSummary {
    /// 计划的操作总数
    pub total: usize,
    /// 比较时手机端的文件数（不含目录）
    pub phone_files: usize,
    /// 比较时 PC 端的文件数（不含目录）
    pub pc_files: usize,
}

/// 同步计划：有序、确定性的复制操作列表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    pub direction: SyncDirection,
    pub operations: Vec<PlannedOperation>,
    pub summary: PlanSummary,
}

/// /op 请求体
#[derive(Debug, Clone, Deserialize)]
pub struct FileOperationRequest {
    pub device: Device,
    pub operation: OperationKind,
    pub path: String,
    #[serde(default)]
    pub dest_path: Option<String>,
    #[serde(default)]
    pub recursive: bool,
}

/// /sync/plan 与 /sync/execute 请求体
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SyncRequest {
    pub direction: SyncDirection,
}

/// /files 响应
#[derive(Debug, Clone, Serialize)]
pub struct FileListResponse {
    pub device: Device,
    pub root: String,
    pub files: Vec<FileRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Device::Phone).unwrap(), "\"phone\"");
        assert_eq!(
            serde_json::to_string(&SyncDirection::PhoneToPc).unwrap(),
            "\"phone_to_pc\""
        );
        assert_eq!(
            serde_json::to_string(&OperationKind::Move).unwrap(),
            "\"move\""
        );
    }

    #[test]
    fn test_operation_request_defaults() {
        let req: FileOperationRequest = serde_json::from_str(
            r#"{"device":"pc","operation":"delete","path":"a/b.txt"}"#,
        )
        .unwrap();
        assert_eq!(req.device, Device::Pc);
        assert!(req.dest_path.is_none());
        assert!(!req.recursive);
    }

    #[test]
    fn test_file_record_omits_empty_checksum() {
        let rec = FileRecord {
            path: "a.txt".to_string(),
            is_dir: false,
            size_bytes: 3,
            modified_ms: 1000,
            checksum: None,
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("checksum"));
    }
}
