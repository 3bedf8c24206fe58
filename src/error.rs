//! 错误类型 - 按请求语义分类，便于映射到 HTTP 状态码

use thiserror::Error;

/// 同步服务错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 设备根目录或引用的路径不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// 请求格式错误（缺少字段、不支持的操作、路径越界等）
    #[error("validation error: {0}")]
    Validation(String),

    /// 扫描、上传或复制过程中的读写失败
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// 机器可读的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::NotFound(_) => "not_found",
            SyncError::Validation(_) => "validation",
            SyncError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
