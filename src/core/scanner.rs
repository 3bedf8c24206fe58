//! 目录树扫描器 - 枚举设备根目录下的全部文件与目录

use crate::error::Result;
use crate::models::FileRecord;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info};

/// 扫描配置
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ScanConfig {
    /// 排除规则（glob patterns），默认为空即扫描所有条目
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// 是否为普通文件计算 blake3 校验和
    #[serde(default)]
    pub compute_checksum: bool,
}

/// 目录树扫描器
#[derive(Debug, Clone, Default)]
pub struct TreeScanner {
    config: ScanConfig,
}

impl TreeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// 检查路径是否命中排除规则
    fn should_exclude(&self, path: &str) -> bool {
        self.config
            .exclude_patterns
            .iter()
            .any(|pattern| Self::matches_pattern(path, pattern))
    }

    /// 简单的 glob 模式匹配
    fn matches_pattern(path: &str, pattern: &str) -> bool {
        let path = path.to_lowercase();
        let pattern = pattern.to_lowercase();
        let name = path.rsplit('/').next().unwrap_or(&path);

        if pattern.contains('*') {
            let regex_pattern = pattern.replace('.', "\\.").replace('*', ".*");
            if let Ok(re) = regex::Regex::new(&format!("^{}$", regex_pattern)) {
                // 对完整路径和最后一段文件名都尝试匹配
                return re.is_match(&path) || re.is_match(name);
            }
            return false;
        }

        path == pattern || name == pattern
    }

    /// 规范化路径分隔符（统一使用 /）
    fn normalize_path(path: &str) -> String {
        path.replace('\\', "/")
    }

    /// 扫描设备根目录，返回按路径排序的清单
    ///
    /// 只读操作；扫描期间外部修改目录树时结果是尽力而为的快照。
    pub async fn scan(&self, root: &Path) -> Result<Vec<FileRecord>> {
        // 根目录不存在或不可读视为该请求的致命错误
        tokio::fs::read_dir(root).await?;

        let base: PathBuf = root.to_path_buf();
        let scanner = self.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let mut records: Vec<FileRecord> = tokio::task::spawn_blocking(move || {
            walkdir::WalkDir::new(&base)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|entry| {
                    let path = entry.path();
                    let metadata = entry.metadata().ok()?;

                    let relative_path = path.strip_prefix(&base).ok()?.to_str()?.to_string();

                    // 跳过根目录本身
                    if relative_path.is_empty() {
                        return None;
                    }

                    let relative_path = Self::normalize_path(&relative_path);
                    if scanner.should_exclude(&relative_path) {
                        debug!("排除条目: {}", relative_path);
                        return None;
                    }

                    let modified_ms = metadata
                        .modified()
                        .ok()?
                        .duration_since(UNIX_EPOCH)
                        .ok()?
                        .as_millis() as i64;

                    let checksum = if scanner.config.compute_checksum && !metadata.is_dir() {
                        std::fs::read(path)
                            .ok()
                            .map(|data| blake3::hash(&data).to_hex().to_string())
                    } else {
                        None
                    };

                    Some(FileRecord {
                        path: relative_path,
                        is_dir: metadata.is_dir(),
                        size_bytes: if metadata.is_dir() { 0 } else { metadata.len() },
                        modified_ms,
                        checksum,
                    })
                })
                .collect()
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        records.sort_by(|a, b| a.path.cmp(&b.path));

        info!("扫描完成: {:?}, {} 个条目", root, records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_scan_lists_files_and_dirs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "b/nested.txt", b"hello");
        write_file(dir.path(), "a.txt", b"hi");
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let records = TreeScanner::new().scan(dir.path()).await.unwrap();
        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b", "b/nested.txt", "empty"]);

        let a = &records[0];
        assert!(!a.is_dir);
        assert_eq!(a.size_bytes, 2);
        assert!(a.modified_ms > 0);

        // 空目录也出现在清单中，且 size 为 0
        let empty = records.iter().find(|r| r.path == "empty").unwrap();
        assert!(empty.is_dir);
        assert_eq!(empty.size_bytes, 0);
    }

    #[tokio::test]
    async fn test_scan_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "x.txt", b"x");
        write_file(dir.path(), "y/z.txt", b"z");

        let scanner = TreeScanner::new();
        let first = scanner.scan(dir.path()).await.unwrap();
        let second = scanner.scan(dir.path()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_scan_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(TreeScanner::new().scan(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "keep.txt", b"k");
        write_file(dir.path(), "junk.tmp", b"j");
        write_file(dir.path(), "sub/.DS_Store", b"d");

        let scanner = TreeScanner::with_config(ScanConfig {
            exclude_patterns: vec!["*.tmp".to_string(), ".DS_Store".to_string()],
            compute_checksum: false,
        });
        let records = scanner.scan(dir.path()).await.unwrap();
        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["keep.txt", "sub"]);
    }

    #[tokio::test]
    async fn test_checksum_filled_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", b"content");

        let scanner = TreeScanner::with_config(ScanConfig {
            exclude_patterns: vec![],
            compute_checksum: true,
        });
        let records = scanner.scan(dir.path()).await.unwrap();
        let a = records.iter().find(|r| r.path == "a.txt").unwrap();
        assert_eq!(
            a.checksum.as_deref(),
            Some(blake3::hash(b"content").to_hex().as_str())
        );
    }
}
