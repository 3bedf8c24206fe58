//! 同步服务 - 组合根，持有设备根目录配置并对外提供全部操作
//!
//! 不依赖任何全局单例：服务实例构造一次，所有请求处理器共享引用。

use crate::core::executor::temp_path_for;
use crate::core::{
    CompareConfig, Differ, Event, EventHub, ExecutionReport, Executor, Planner, ScanConfig,
    TreeScanner,
};
use crate::error::{Result, SyncError};
use crate::models::{
    Device, FileOperationRequest, FileRecord, OperationKind, PlanSummary, SyncDirection, SyncPlan,
};
use bytes::Bytes;
use futures::Stream;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// 上传内容流
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// 同步服务
pub struct SyncService {
    data_root: PathBuf,
    scanner: TreeScanner,
    differ: Differ,
    planner: Planner,
    events: EventHub,
}

impl SyncService {
    /// 创建服务并确保两个设备根目录存在
    pub fn new(data_root: PathBuf, mut scan: ScanConfig, compare: CompareConfig) -> Result<Self> {
        // checksum 判等依赖扫描时填充校验和，开启比较开关即开启扫描计算
        if compare.use_checksum {
            scan.compute_checksum = true;
        }
        for device in [Device::Phone, Device::Pc] {
            std::fs::create_dir_all(data_root.join(device.as_str()))?;
        }
        info!("数据根目录: {:?}", data_root);

        Ok(Self {
            data_root,
            scanner: TreeScanner::with_config(scan),
            differ: Differ::with_config(compare),
            planner: Planner::new(),
            events: EventHub::new(),
        })
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// 设备根目录的绝对路径
    pub fn device_root(&self, device: Device) -> PathBuf {
        self.data_root.join(device.as_str())
    }

    /// 校验相对路径并解析为设备根目录下的绝对路径
    ///
    /// 拒绝空路径、绝对路径和包含 `..` 的路径，防止越出设备根目录。
    fn resolve_path(&self, device: Device, rel: &str) -> Result<PathBuf> {
        let rel = rel.replace('\\', "/");
        if rel.starts_with('/') {
            return Err(SyncError::Validation(format!(
                "path must be relative: {}",
                rel
            )));
        }
        let trimmed = rel.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(SyncError::Validation("path must not be empty".to_string()));
        }
        let candidate = Path::new(trimmed);
        if candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(SyncError::Validation(format!(
                "path escapes device root: {}",
                rel
            )));
        }
        Ok(self.device_root(device).join(candidate))
    }

    /// 列出设备清单（每次调用都重新扫描）
    pub async fn list_files(&self, device: Device) -> Result<Vec<FileRecord>> {
        self.scanner.scan(&self.device_root(device)).await
    }

    /// 流式写入上传内容并广播 file_uploaded
    pub async fn save_upload(
        &self,
        device: Device,
        path: &str,
        stream: ByteStream,
    ) -> Result<u64> {
        let dest = self.resolve_path(device, path)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 临时文件写入后原子重命名；失败时清理临时文件
        let temp_path = temp_path_for(&dest);
        let mut reader = tokio_util::io::StreamReader::new(stream);
        let write = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            drop(file);
            tokio::fs::rename(&temp_path, &dest).await?;
            Ok::<u64, std::io::Error>(written)
        };
        let written = match write.await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
        };

        info!("上传完成: {}:{} ({} 字节)", device, path, written);
        self.events
            .broadcast(Event::FileUploaded {
                device,
                path: path.to_string(),
            })
            .await;
        Ok(written)
    }

    /// 删除文件或目录；非递归删除非空目录是校验错误
    pub async fn delete_path(&self, device: Device, path: &str, recursive: bool) -> Result<()> {
        let target = self.resolve_path(device, path)?;
        let meta = match tokio::fs::metadata(&target).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::NotFound(format!("{}:{}", device, path)))
            }
            Err(e) => return Err(e.into()),
        };

        if meta.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(&target).await?;
            } else {
                let mut entries = tokio::fs::read_dir(&target).await?;
                if entries.next_entry().await?.is_some() {
                    return Err(SyncError::Validation(format!(
                        "directory not empty (use recursive): {}",
                        path
                    )));
                }
                tokio::fs::remove_dir(&target).await?;
            }
        } else {
            tokio::fs::remove_file(&target).await?;
        }

        debug!("删除完成: {}:{} (recursive={})", device, path, recursive);
        Ok(())
    }

    /// 创建目录（含父目录）
    pub async fn make_dir(&self, device: Device, path: &str) -> Result<()> {
        let target = self.resolve_path(device, path)?;
        tokio::fs::create_dir_all(&target).await?;
        debug!("创建目录: {}:{}", device, path);
        Ok(())
    }

    /// 同一设备内重命名，先创建目标父目录
    pub async fn move_path(&self, device: Device, src: &str, dest: &str) -> Result<()> {
        let src_path = self.resolve_path(device, src)?;
        let dest_path = self.resolve_path(device, dest)?;

        if tokio::fs::metadata(&src_path).await.is_err() {
            return Err(SyncError::NotFound(format!("{}:{}", device, src)));
        }
        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&src_path, &dest_path).await?;

        debug!("移动完成: {}:{} -> {}", device, src, dest);
        Ok(())
    }

    /// /op 请求的统一入口：分发单文件操作并广播 file_operation
    pub async fn apply_operation(&self, req: &FileOperationRequest) -> Result<()> {
        match req.operation {
            OperationKind::Delete => {
                self.delete_path(req.device, &req.path, req.recursive).await?
            }
            OperationKind::Mkdir => self.make_dir(req.device, &req.path).await?,
            OperationKind::Move => {
                let dest = req.dest_path.as_deref().ok_or_else(|| {
                    SyncError::Validation("dest_path required for move".to_string())
                })?;
                self.move_path(req.device, &req.path, dest).await?
            }
            other => {
                return Err(SyncError::Validation(format!(
                    "unsupported operation: {}",
                    other
                )))
            }
        }

        self.events
            .broadcast(Event::FileOperation {
                operation: req.operation,
                device: req.device,
                path: req.path.clone(),
                dest_path: req.dest_path.clone(),
                recursive: req.recursive,
            })
            .await;
        Ok(())
    }

    /// 扫描两侧并生成同步计划（不执行）
    pub async fn compute_plan(&self, direction: SyncDirection) -> Result<SyncPlan> {
        let phone_root = self.device_root(Device::Phone);
        let pc_root = self.device_root(Device::Pc);
        let (phone, pc) = tokio::join!(
            self.scanner.scan(&phone_root),
            self.scanner.scan(&pc_root),
        );
        let diff = self.differ.diff(&phone?, &pc?);
        let plan = self.planner.plan(&diff, direction);
        debug!(
            "计划生成: {} 个操作 (phone {} / pc {} 个文件)",
            plan.summary.total, plan.summary.phone_files, plan.summary.pc_files
        );
        Ok(plan)
    }

    /// 现场重新规划并执行，广播 sync_executed
    ///
    /// 不接受外部传入的计划：两侧目录可能在规划后发生变化，
    /// 执行时总是以新鲜扫描为准。
    pub async fn execute_plan(
        &self,
        direction: SyncDirection,
    ) -> Result<(PlanSummary, ExecutionReport)> {
        let plan = self.compute_plan(direction).await?;
        let executor = Executor::new(
            self.device_root(Device::Phone),
            self.device_root(Device::Pc),
        );
        let report = executor.execute(&plan).await;

        self.events
            .broadcast(Event::SyncExecuted {
                direction,
                summary: plan.summary,
            })
            .await;
        Ok((plan.summary, report))
    }
}
