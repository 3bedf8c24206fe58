//! 计划执行器 - 按计划顺序逐个应用复制操作
//!
//! 单个操作失败只记入报告，不中断剩余操作。复制是幂等的，
//! 崩溃后重新规划再执行即可（至少一次语义）。

use crate::error::{Result, SyncError};
use crate::models::{Device, OperationKind, PlannedOperation, SyncPlan};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// 单个操作的失败记录
#[derive(Debug, Clone, Serialize)]
pub struct OperationFailure {
    pub path: String,
    pub device_src: Device,
    pub error: String,
}

/// 执行报告
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// 尝试执行的复制操作数
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 失败明细（含计划过期后源文件消失的情况）
    pub failures: Vec<OperationFailure>,
    pub started_at: i64,
    pub finished_at: i64,
    pub duration_ms: u64,
}

/// 计划执行器
pub struct Executor {
    phone_root: PathBuf,
    pc_root: PathBuf,
}

impl Executor {
    pub fn new(phone_root: PathBuf, pc_root: PathBuf) -> Self {
        Self {
            phone_root,
            pc_root,
        }
    }

    fn root_for(&self, device: Device) -> &Path {
        match device {
            Device::Phone => &self.phone_root,
            Device::Pc => &self.pc_root,
        }
    }

    /// 按计划给定顺序同步执行所有操作
    pub async fn execute(&self, plan: &SyncPlan) -> ExecutionReport {
        let started_at = chrono::Utc::now().timestamp_millis();
        let mut attempted = 0usize;
        let mut succeeded = 0usize;
        let mut failures = Vec::new();

        for op in &plan.operations {
            // 批量执行只应用复制；delete/mkdir/move 走单操作 API
            if op.operation != OperationKind::Upload {
                debug!("跳过非复制操作: {} {}", op.operation, op.path);
                continue;
            }

            attempted += 1;
            match self.apply_copy(op).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    warn!("复制失败: {} - {}", op.path, e);
                    failures.push(OperationFailure {
                        path: op.path.clone(),
                        device_src: op.device_src,
                        error: e.to_string(),
                    });
                }
            }
        }

        let finished_at = chrono::Utc::now().timestamp_millis();
        let report = ExecutionReport {
            attempted,
            succeeded,
            failed: failures.len(),
            failures,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).max(0) as u64,
        };

        info!(
            "计划执行完成: {} 成功, {} 失败 / {} 个操作",
            report.succeeded, report.failed, report.attempted
        );
        report
    }

    /// 应用单个复制操作：读取源、创建父目录、原子写入、保留 mtime
    async fn apply_copy(&self, op: &PlannedOperation) -> Result<()> {
        let dst_device = op
            .device_dst
            .ok_or_else(|| SyncError::Validation(format!("copy without device_dst: {}", op.path)))?;

        let src_path = self.root_for(op.device_src).join(&op.path);
        let dst_path = self
            .root_for(dst_device)
            .join(op.dest_path.as_deref().unwrap_or(&op.path));

        // 计划可能已过期：源文件消失时该操作失败，继续执行后续操作
        let src_meta = match tokio::fs::metadata(&src_path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => {
                return Err(SyncError::NotFound(format!(
                    "source is not a file: {}",
                    op.path
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::NotFound(format!(
                    "source vanished before apply: {}",
                    op.path
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let data = tokio::fs::read(&src_path).await?;

        if let Some(parent) = dst_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 临时文件写入后原子重命名，避免读到半个文件；失败时清理临时文件
        let temp_path = temp_path_for(&dst_path);
        if let Err(e) = tokio::fs::write(&temp_path, &data).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &dst_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        // 保留源文件的修改时间；失败不影响操作结果
        if let Ok(mtime) = src_meta.modified() {
            let set = std::fs::OpenOptions::new()
                .write(true)
                .open(&dst_path)
                .and_then(|f| f.set_modified(mtime));
            if let Err(e) = set {
                debug!("设置 mtime 失败: {} - {}", op.path, e);
            }
        }

        debug!(
            "复制完成: {}:{} -> {}:{} ({} 字节)",
            op.device_src,
            op.path,
            dst_device,
            dst_path.display(),
            data.len()
        );
        Ok(())
    }
}

/// 把毫秒时间戳还原为文件系统时间
pub fn system_time_from_ms(ms: i64) -> std::time::SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64)
}

/// 临时文件路径：在完整文件名后追加后缀
///
/// 不能用 `with_extension`：那会覆盖真实扩展名，复制 `a.txt` 时
/// 临时文件会顶掉同目录中真实存在的 `a.tmp`。
pub(crate) fn temp_path_for(dest: &Path) -> PathBuf {
    let mut raw = dest.as_os_str().to_os_string();
    raw.push(".syncbridge-tmp");
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::differ::Differ;
    use crate::core::planner::Planner;
    use crate::core::scanner::TreeScanner;
    use crate::models::SyncDirection;
    use std::fs;

    struct Roots {
        _dir: tempfile::TempDir,
        phone: PathBuf,
        pc: PathBuf,
    }

    fn roots() -> Roots {
        let dir = tempfile::tempdir().unwrap();
        let phone = dir.path().join("phone");
        let pc = dir.path().join("pc");
        fs::create_dir_all(&phone).unwrap();
        fs::create_dir_all(&pc).unwrap();
        Roots {
            _dir: dir,
            phone,
            pc,
        }
    }

    async fn plan(roots: &Roots, direction: SyncDirection) -> SyncPlan {
        let scanner = TreeScanner::new();
        let phone = scanner.scan(&roots.phone).await.unwrap();
        let pc = scanner.scan(&roots.pc).await.unwrap();
        let diff = Differ::new().diff(&phone, &pc);
        Planner::new().plan(&diff, direction)
    }

    #[tokio::test]
    async fn test_copy_creates_parents_and_preserves_mtime() {
        let r = roots();
        let src = r.phone.join("album/pics/a.jpg");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"jpegdata").unwrap();
        let mtime = system_time_from_ms(1_600_000_000_000);
        fs::OpenOptions::new()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let plan = plan(&r, SyncDirection::PhoneToPc).await;
        let executor = Executor::new(r.phone.clone(), r.pc.clone());
        let report = executor.execute(&plan).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);

        let dst = r.pc.join("album/pics/a.jpg");
        assert_eq!(fs::read(&dst).unwrap(), b"jpegdata");
        let dst_mtime = fs::metadata(&dst).unwrap().modified().unwrap();
        assert_eq!(dst_mtime, mtime);
    }

    #[tokio::test]
    async fn test_execution_is_idempotent() {
        let r = roots();
        fs::write(r.phone.join("a.txt"), b"one").unwrap();
        fs::write(r.phone.join("b.txt"), b"two").unwrap();

        let executor = Executor::new(r.phone.clone(), r.pc.clone());
        let first_plan = plan(&r, SyncDirection::Bidirectional).await;
        executor.execute(&first_plan).await;

        let after_first = TreeScanner::new().scan(&r.pc).await.unwrap();

        // 第二次执行同一计划后两侧不再有净变化
        executor.execute(&first_plan).await;
        let after_second = TreeScanner::new().scan(&r.pc).await.unwrap();
        assert_eq!(after_first, after_second);

        let replan = plan(&r, SyncDirection::Bidirectional).await;
        assert_eq!(replan.summary.total, 0);
    }

    #[tokio::test]
    async fn test_stale_source_recorded_and_execution_continues() {
        let r = roots();
        fs::write(r.phone.join("gone.txt"), b"x").unwrap();
        fs::write(r.phone.join("stays.txt"), b"y").unwrap();

        let plan = plan(&r, SyncDirection::PhoneToPc).await;
        assert_eq!(plan.operations.len(), 2);

        // 规划后、执行前源文件消失
        fs::remove_file(r.phone.join("gone.txt")).unwrap();

        let executor = Executor::new(r.phone.clone(), r.pc.clone());
        let report = executor.execute(&plan).await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].path, "gone.txt");
        assert!(report.failures[0].error.contains("vanished"));
        // 后续操作仍然执行
        assert!(r.pc.join("stays.txt").exists());
        assert!(!r.pc.join("gone.txt").exists());
    }

    #[tokio::test]
    async fn test_tmp_sibling_survives_copy() {
        let r = roots();
        fs::write(r.phone.join("a.txt"), b"text").unwrap();
        fs::write(r.phone.join("a.tmp"), b"tempdata").unwrap();

        let plan = plan(&r, SyncDirection::PhoneToPc).await;
        let report = Executor::new(r.phone.clone(), r.pc.clone())
            .execute(&plan)
            .await;
        assert_eq!(report.failed, 0);

        // .tmp 是普通的同步对象，复制 a.txt 不得影响同目录的 a.tmp
        assert_eq!(fs::read(r.pc.join("a.tmp")).unwrap(), b"tempdata");
        assert_eq!(fs::read(r.pc.join("a.txt")).unwrap(), b"text");

        // 两侧收敛，重新规划不再有操作
        let replan = self::plan(&r, SyncDirection::Bidirectional).await;
        assert_eq!(replan.summary.total, 0);
    }

    #[tokio::test]
    async fn test_bidirectional_convergence() {
        let r = roots();
        fs::write(r.phone.join("phone.txt"), b"p").unwrap();
        fs::write(r.pc.join("pc.txt"), b"c").unwrap();

        let plan = plan(&r, SyncDirection::Bidirectional).await;
        let executor = Executor::new(r.phone.clone(), r.pc.clone());
        let report = executor.execute(&plan).await;
        assert_eq!(report.failed, 0);

        let scanner = TreeScanner::new();
        let phone_paths: Vec<_> = scanner
            .scan(&r.phone)
            .await
            .unwrap()
            .into_iter()
            .map(|rec| rec.path)
            .collect();
        let pc_paths: Vec<_> = scanner
            .scan(&r.pc)
            .await
            .unwrap()
            .into_iter()
            .map(|rec| rec.path)
            .collect();
        assert_eq!(phone_paths, vec!["pc.txt", "phone.txt"]);
        assert_eq!(phone_paths, pc_paths);
    }

    #[tokio::test]
    async fn test_conflict_copy_overwrites_destination() {
        let r = roots();
        fs::write(r.phone.join("b.txt"), b"newer-content").unwrap();
        fs::write(r.pc.join("b.txt"), b"old").unwrap();
        let newer = system_time_from_ms(2_000_000);
        let older = system_time_from_ms(1_000_000);
        fs::OpenOptions::new()
            .write(true)
            .open(r.phone.join("b.txt"))
            .unwrap()
            .set_modified(newer)
            .unwrap();
        fs::OpenOptions::new()
            .write(true)
            .open(r.pc.join("b.txt"))
            .unwrap()
            .set_modified(older)
            .unwrap();

        let plan = plan(&r, SyncDirection::Bidirectional).await;
        assert_eq!(plan.operations[0].reason, "newer on phone");

        Executor::new(r.phone.clone(), r.pc.clone())
            .execute(&plan)
            .await;
        assert_eq!(fs::read(r.pc.join("b.txt")).unwrap(), b"newer-content");
        assert_eq!(
            fs::metadata(r.pc.join("b.txt")).unwrap().modified().unwrap(),
            newer
        );
    }
}
