//! 扫描选项与统计信息（模块）
use std::time::Duration;

use crate::types::ScanRecord;

/// 扫描选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// 是否在扫描时执行格式校验（默认关闭，仅按扩展名分级）
    pub check_format: bool,
    /// 最大校验文件大小（字节）；超过则校验失败
    pub max_file_size: Option<u64>,
    /// 单文件格式校验超时；None 表示不限时
    /// 超时的校验线程不会被强制终止，会在后台跑完；同时存活的线程数
    /// 受 `MAX_PENDING_CHECKS` 限制，超出时校验直接失败
    pub format_timeout: Option<Duration>,
    /// 线程数：None 表示自动（等于 CPU 核数）；Some(1) 走串行
    pub threads: Option<usize>,
    /// 目录参数是否递归展开为其中的文件
    pub recursive: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            check_format: false,
            max_file_size: None,
            format_timeout: None,
            threads: None,
            recursive: false,
        }
    }
}

/// 扫描统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub supported: usize,
    pub unsupported: usize,
    /// 开启格式校验时未通过的文件数
    pub invalid: usize,
}

impl ScanStats {
    pub(crate) fn record(&mut self, rec: &ScanRecord) {
        self.files_scanned += 1;
        if rec.is_supported() { self.supported += 1; } else { self.unsupported += 1; }
        if rec.valid == Some(false) { self.invalid += 1; }
    }
}
