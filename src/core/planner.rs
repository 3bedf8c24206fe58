//! 同步规划器 - 由差异分类和方向策略生成确定性的操作列表
//!
//! 规划只产生复制操作，从不删除：自动 diff 的结果不应造成不可逆的数据丢失。

use crate::core::differ::{DiffEntry, DiffResult};
use crate::models::{Device, OperationKind, PlanSummary, PlannedOperation, SyncDirection, SyncPlan};

/// 同步规划器（纯函数，无 I/O）
///
/// 左侧清单固定对应 phone，右侧对应 pc。
#[derive(Debug, Clone, Copy, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    fn copy_op(src: Device, path: &str, reason: String) -> PlannedOperation {
        PlannedOperation {
            operation: OperationKind::Upload,
            device_src: src,
            device_dst: Some(src.peer()),
            path: path.to_string(),
            dest_path: Some(path.to_string()),
            reason,
        }
    }

    /// 按路径字典序遍历差异分类，套用方向策略
    pub fn plan(&self, diff: &DiffResult, direction: SyncDirection) -> SyncPlan {
        let mut operations = Vec::new();

        for (path, entry) in &diff.entries {
            let op = match entry {
                DiffEntry::OnlyLeft(_) => match direction {
                    SyncDirection::PhoneToPc | SyncDirection::Bidirectional => Some(
                        Self::copy_op(Device::Phone, path, "missing on pc".to_string()),
                    ),
                    SyncDirection::PcToPhone => None,
                },
                DiffEntry::OnlyRight(_) => match direction {
                    SyncDirection::PcToPhone | SyncDirection::Bidirectional => Some(
                        Self::copy_op(Device::Pc, path, "missing on phone".to_string()),
                    ),
                    SyncDirection::PhoneToPc => None,
                },
                DiffEntry::Equal { .. } => None,
                DiffEntry::Conflicting { left, right } => match direction {
                    SyncDirection::PhoneToPc => Some(Self::copy_op(
                        Device::Phone,
                        path,
                        "overwrite from phone".to_string(),
                    )),
                    SyncDirection::PcToPhone => Some(Self::copy_op(
                        Device::Pc,
                        path,
                        "overwrite from pc".to_string(),
                    )),
                    SyncDirection::Bidirectional => {
                        // 双向时较新的一侧获胜；mtime 相同偏向 phone
                        if left.modified_ms >= right.modified_ms {
                            Some(Self::copy_op(
                                Device::Phone,
                                path,
                                "newer on phone".to_string(),
                            ))
                        } else {
                            Some(Self::copy_op(Device::Pc, path, "newer on pc".to_string()))
                        }
                    }
                },
            };

            if let Some(op) = op {
                operations.push(op);
            }
        }

        let summary = PlanSummary {
            total: operations.len(),
            phone_files: diff.left_files,
            pc_files: diff.right_files,
        };

        SyncPlan {
            direction,
            operations,
            summary,
        }
    }
}
