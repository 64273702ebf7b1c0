//! 错误类型（单文件粒度，不会中断批量扫描）
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// 扫描/校验/预览过程中的错误
#[derive(Debug, Error)]
pub enum ScanError {
    /// 扩展名不在任何文件类型描述中
    #[error("unsupported file type: {path}")]
    UnsupportedFileType { path: PathBuf },

    /// 格式校验失败；Display 即诊断信息本身
    #[error("{0}")]
    FormatValidation(String),

    /// 该类型尚未实现预览
    #[error("unimplemented")]
    PreviewUnavailable,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file size {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    /// 格式校验超时（工作线程仍在后台运行，结果被丢弃）
    #[error("format check timed out after {elapsed:?}: {path}")]
    Timeout { path: PathBuf, elapsed: Duration },

    /// 存活的限时校验线程已达上限
    #[error("too many pending format checks (limit {limit})")]
    TooManyPendingChecks { limit: usize },

    /// 格式校验异常退出（例如解码器 panic）
    #[error("format check aborted: {path}")]
    Aborted { path: PathBuf },
}

impl ScanError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ScanError::Io { path: path.to_path_buf(), source }
    }

    /// 是否为“文件内容不合格”（区别于读取失败、超时等运行时问题）
    pub fn is_format_error(&self) -> bool {
        matches!(self, ScanError::FormatValidation(_))
    }
}
