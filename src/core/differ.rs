//! 差异比较器 - 将两份清单中的每个路径归入唯一分类
//!
//! 只比较普通文件；目录不参与分类，目录结构由文件路径隐含。

use crate::models::FileRecord;
use std::collections::BTreeMap;

/// 比较配置
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct CompareConfig {
    /// 是否优先使用 checksum 判等（两侧都有校验和时生效）
    ///
    /// 默认关闭：按 size_bytes + modified_ms 精确匹配判等。
    #[serde(default)]
    pub use_checksum: bool,
}

/// 单个路径的分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEntry {
    /// 仅左侧存在
    OnlyLeft(FileRecord),
    /// 仅右侧存在
    OnlyRight(FileRecord),
    /// 两侧都存在且内容签名一致
    Equal {
        left: FileRecord,
        right: FileRecord,
    },
    /// 两侧都存在但内容签名不一致（冲突）
    Conflicting {
        left: FileRecord,
        right: FileRecord,
    },
}

/// 差异结果：按路径字典序排列的分类表
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub entries: BTreeMap<String, DiffEntry>,
    /// 比较时左侧的文件数（不含目录）
    pub left_files: usize,
    /// 比较时右侧的文件数（不含目录）
    pub right_files: usize,
}

impl DiffResult {
    pub fn only_left(&self) -> Vec<&FileRecord> {
        self.entries
            .values()
            .filter_map(|e| match e {
                DiffEntry::OnlyLeft(rec) => Some(rec),
                _ => None,
            })
            .collect()
    }

    pub fn only_right(&self) -> Vec<&FileRecord> {
        self.entries
            .values()
            .filter_map(|e| match e {
                DiffEntry::OnlyRight(rec) => Some(rec),
                _ => None,
            })
            .collect()
    }

    pub fn both_equal(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|(p, e)| matches!(e, DiffEntry::Equal { .. }).then_some(p.as_str()))
            .collect()
    }

    pub fn both_conflicting(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|(p, e)| matches!(e, DiffEntry::Conflicting { .. }).then_some(p.as_str()))
            .collect()
    }
}

/// 文件差异比较器
#[derive(Debug, Clone, Copy, Default)]
pub struct Differ {
    config: CompareConfig,
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompareConfig) -> Self {
        Self { config }
    }

    /// 内容签名判等
    fn records_equal(&self, left: &FileRecord, right: &FileRecord) -> bool {
        if self.config.use_checksum {
            if let (Some(l), Some(r)) = (&left.checksum, &right.checksum) {
                return l == r;
            }
        }
        // 元数据启发式：size 与 mtime 都精确一致才视为相同
        left.size_bytes == right.size_bytes && left.modified_ms == right.modified_ms
    }

    /// 比较两份清单，纯函数，无副作用
    pub fn diff(&self, left: &[FileRecord], right: &[FileRecord]) -> DiffResult {
        let left_map: BTreeMap<&str, &FileRecord> = left
            .iter()
            .filter(|r| !r.is_dir)
            .map(|r| (r.path.as_str(), r))
            .collect();
        let right_map: BTreeMap<&str, &FileRecord> = right
            .iter()
            .filter(|r| !r.is_dir)
            .map(|r| (r.path.as_str(), r))
            .collect();

        let mut entries = BTreeMap::new();
        let all_paths: std::collections::BTreeSet<&str> =
            left_map.keys().chain(right_map.keys()).copied().collect();

        for path in all_paths {
            let entry = match (left_map.get(path), right_map.get(path)) {
                (Some(l), None) => DiffEntry::OnlyLeft((*l).clone()),
                (None, Some(r)) => DiffEntry::OnlyRight((*r).clone()),
                (Some(l), Some(r)) => {
                    if self.records_equal(l, r) {
                        DiffEntry::Equal {
                            left: (*l).clone(),
                            right: (*r).clone(),
                        }
                    } else {
                        DiffEntry::Conflicting {
                            left: (*l).clone(),
                            right: (*r).clone(),
                        }
                    }
                }
                (None, None) => unreachable!(),
            };
            entries.insert(path.to_string(), entry);
        }

        DiffResult {
            entries,
            left_files: left_map.len(),
            right_files: right_map.len(),
        }
    }
}
