//! 扫描管理器：路径 → 类型描述 → 危险等级
use crossbeam_channel::RecvTimeoutError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::filetypes::{builtin_types, FileTypeDescriptor, FormatCheckFn};
use crate::options::ScanOptions;
use crate::types::{Preview, ScanRecord};

/// 同时存活的限时校验线程上限（含已超时但尚未结束的线程）
pub const MAX_PENDING_CHECKS: usize = 32;

/// 持有类型表（构造后只读），可跨线程共享
#[derive(Debug, Clone)]
pub struct ScanManager {
    types: Vec<FileTypeDescriptor>,
    options: ScanOptions,
    pending_checks: Arc<AtomicUsize>,
    pending_limit: usize,
}

impl Default for ScanManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanManager {
    pub fn new() -> Self {
        Self::with_options(ScanOptions::default())
    }

    pub fn with_options(options: ScanOptions) -> Self {
        Self::with_registry(builtin_types(), options)
    }

    pub(crate) fn with_registry(types: Vec<FileTypeDescriptor>, options: ScanOptions) -> Self {
        Self { types, options, pending_checks: Arc::new(AtomicUsize::new(0)), pending_limit: MAX_PENDING_CHECKS }
    }

    /// 类型表（按匹配优先级排列）
    pub fn registry(&self) -> &[FileTypeDescriptor] {
        &self.types
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// 按扩展名（大小写不敏感）查找类型，先登记者优先
    pub fn resolve(&self, path: &Path) -> Option<&FileTypeDescriptor> {
        let ext = file_extension(path)?;
        let found = self.types.iter().find(|ft| ft.matches_extension(&ext));
        debug!(path = %path.display(), ext = %ext, file_type = found.map(|ft| ft.name), "resolve");
        found
    }

    /// 严格模式：未识别的扩展名返回 `UnsupportedFileType`
    pub fn try_scan(&self, path: &Path) -> Result<ScanRecord, ScanError> {
        let ft = self
            .resolve(path)
            .ok_or_else(|| ScanError::UnsupportedFileType { path: path.to_path_buf() })?;

        let mut rec = ScanRecord {
            name: display_name(path),
            supported: Some(true),
            description: Some(ft.name.to_string()),
            danger: ft.danger(),
            valid: None,
            error: None,
        };

        // 校验结果只作为附加字段，不影响危险等级
        if self.options.check_format {
            match self.check_with_limits(ft, path) {
                Ok(()) => rec.valid = Some(true),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "format check failed");
                    rec.valid = Some(false);
                    rec.error = Some(e.to_string());
                }
            }
        }

        Ok(rec)
    }

    /// 默认模式：未识别的扩展名得到只含 name 与 danger = None 的记录
    pub fn scan(&self, path: &Path) -> ScanRecord {
        match self.try_scan(path) {
            Ok(rec) => rec,
            Err(_) => ScanRecord::unsupported(display_name(path)),
        }
    }

    /// 独立的格式校验入口（不依赖 `check_format` 开关）
    pub fn validate(&self, path: &Path) -> Result<(), ScanError> {
        let ft = self
            .resolve(path)
            .ok_or_else(|| ScanError::UnsupportedFileType { path: path.to_path_buf() })?;
        self.check_with_limits(ft, path)
    }

    /// 生成预览；`Preview::Generated` 由调用方负责 `discard`
    pub fn preview(&self, path: &Path) -> Result<Preview, ScanError> {
        let ft = self
            .resolve(path)
            .ok_or_else(|| ScanError::UnsupportedFileType { path: path.to_path_buf() })?;
        ft.generate_preview(path)
    }

    fn check_with_limits(&self, ft: &FileTypeDescriptor, path: &Path) -> Result<(), ScanError> {
        // 未实现校验的类型不读文件，也不受大小限制
        let check = match ft.check { Some(c) => c, None => return Ok(()) };

        if let Some(max) = self.options.max_file_size {
            let size = std::fs::metadata(path).map_err(|e| ScanError::io(path, e))?.len();
            if size > max {
                return Err(ScanError::FileTooLarge { size, max });
            }
        }
        match self.options.format_timeout {
            Some(limit) => self.check_with_timeout(check, path, limit),
            // 钩子 panic 只影响当前文件
            None => catch_unwind(AssertUnwindSafe(|| check(path)))
                .unwrap_or_else(|_| Err(ScanError::Aborted { path: path.to_path_buf() })),
        }
    }

    /// 在独立线程中执行校验，超时则放弃等待（线程自行结束，结果丢弃）
    /// 存活线程数达到上限时直接拒绝，不再新开线程
    fn check_with_timeout(&self, check: FormatCheckFn, path: &Path, limit: Duration) -> Result<(), ScanError> {
        if self.pending_checks.fetch_add(1, Ordering::SeqCst) >= self.pending_limit {
            self.pending_checks.fetch_sub(1, Ordering::SeqCst);
            warn!(path = %path.display(), limit = self.pending_limit, "too many pending format checks");
            return Err(ScanError::TooManyPendingChecks { limit: self.pending_limit });
        }
        // spawn 失败时闭包被丢弃，guard 随之归还计数
        let guard = PendingGuard(Arc::clone(&self.pending_checks));
        let (tx, rx) = crossbeam_channel::bounded(1);
        let owned = path.to_path_buf();

        std::thread::Builder::new()
            .name("phfs-check".to_string())
            .spawn(move || {
                let _guard = guard;
                let _ = tx.send(check(&owned));
            })
            .map_err(|e| ScanError::io(path, e))?;

        match rx.recv_timeout(limit) {
            Ok(res) => res,
            Err(RecvTimeoutError::Timeout) => Err(ScanError::Timeout { path: path.to_path_buf(), elapsed: limit }),
            Err(RecvTimeoutError::Disconnected) => Err(ScanError::Aborted { path: path.to_path_buf() }),
        }
    }
}

/// 校验线程退出（含 panic）时归还计数
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 取最后一个点之后的部分并转小写；无扩展名或空扩展名返回 None
/// 以点开头且无其他点的文件名（如 `.bashrc`）视为无扩展名
pub fn file_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    if ext.is_empty() { None } else { Some(ext) }
}

fn display_name(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attribute, DangerLevel};
    use std::path::PathBuf;

    fn slow_check(_: &Path) -> Result<(), ScanError> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(())
    }

    fn panicking_check(_: &Path) -> Result<(), ScanError> {
        panic!("decoder blew up");
    }

    fn fake_type(name: &'static str, extensions: &'static [&'static str], check: fn(&Path) -> Result<(), ScanError>) -> FileTypeDescriptor {
        FileTypeDescriptor {
            name,
            extensions,
            threat_base: 25,
            attributes: &[Attribute::Container],
            platform: Some("linux"),
            check: Some(check),
            preview: None,
        }
    }

    #[test]
    fn extension_extraction() {
        assert_eq!(file_extension(Path::new("a/b/notes.TXT")).as_deref(), Some("txt"));
        assert_eq!(file_extension(Path::new("backup.tar.gz")).as_deref(), Some("gz"));
        assert_eq!(file_extension(Path::new("Makefile")), None);
        assert_eq!(file_extension(Path::new(".bashrc")), None);
        assert_eq!(file_extension(Path::new("trailing.")), None);
        assert_eq!(file_extension(Path::new("dir.d/README")), None);
    }

    #[test]
    fn resolve_builtin_names() {
        let m = ScanManager::new();
        let name = |p: &str| m.resolve(Path::new(p)).map(|ft| ft.name);
        assert_eq!(name("a.md"), Some("Plain text"));
        assert_eq!(name("a.PS1"), Some("Programming script"));
        assert_eq!(name("a.JpEg"), Some("JPEG Photo"));
        assert_eq!(name("a.pdf"), Some("Adobe PDF Document"));
        assert_eq!(name("a.docx"), Some("Microsoft Word Document"));
        assert_eq!(name("a.exe"), None);
        assert_eq!(name("noext"), None);
    }

    #[test]
    fn first_registered_type_wins() {
        let m = ScanManager::with_registry(
            vec![fake_type("first", &["dat"], slow_check), fake_type("second", &["dat", "bin"], slow_check)],
            ScanOptions::default(),
        );
        assert_eq!(m.resolve(Path::new("x.dat")).unwrap().name, "first");
        assert_eq!(m.resolve(Path::new("x.bin")).unwrap().name, "second");
    }

    #[test]
    fn type_without_extensions_matches_nothing() {
        let m = ScanManager::with_registry(vec![fake_type("empty", &[], slow_check)], ScanOptions::default());
        assert!(m.resolve(Path::new("x.dat")).is_none());
        assert!(m.resolve(Path::new("x.")).is_none());
    }

    #[test]
    fn unsupported_policies() {
        let m = ScanManager::new();
        let rec = m.scan(Path::new("setup.exe"));
        assert_eq!(rec.name, "setup.exe");
        assert_eq!(rec.supported, None);
        assert_eq!(rec.description, None);
        assert_eq!(rec.danger, DangerLevel::None);

        match m.try_scan(Path::new("setup.exe")) {
            Err(ScanError::UnsupportedFileType { path }) => assert_eq!(path, PathBuf::from("setup.exe")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(m.validate(Path::new("setup.exe")), Err(ScanError::UnsupportedFileType { .. })));
        assert!(matches!(m.preview(Path::new("setup.exe")), Err(ScanError::UnsupportedFileType { .. })));
    }

    #[test]
    fn scan_without_check_does_not_touch_disk() {
        let m = ScanManager::new();
        let rec = m.scan(Path::new("/definitely/missing/file.py"));
        assert_eq!(rec.supported, Some(true));
        assert_eq!(rec.danger, DangerLevel::Minimal);
        assert_eq!(rec.valid, None);
        assert_eq!(rec.error, None);
    }

    #[test]
    fn danger_comes_from_threat_base() {
        let m = ScanManager::with_registry(vec![fake_type("archive", &["zip"], slow_check)], ScanOptions::default());
        assert_eq!(m.scan(Path::new("a.zip")).danger, DangerLevel::Moderate);
    }

    #[test]
    fn timeout_bounds_slow_checks() {
        let opts = ScanOptions { format_timeout: Some(Duration::from_millis(20)), ..ScanOptions::default() };
        let m = ScanManager::with_registry(vec![fake_type("slow", &["slow"], slow_check)], opts);
        match m.validate(Path::new("x.slow")) {
            Err(ScanError::Timeout { elapsed, .. }) => assert_eq!(elapsed, Duration::from_millis(20)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn timeout_allows_fast_checks() {
        let opts = ScanOptions { format_timeout: Some(Duration::from_secs(5)), ..ScanOptions::default() };
        let m = ScanManager::with_registry(vec![fake_type("slow", &["slow"], slow_check)], opts);
        assert!(m.validate(Path::new("x.slow")).is_ok());
    }

    #[test]
    fn panicking_check_is_isolated() {
        let opts = ScanOptions { format_timeout: Some(Duration::from_secs(5)), check_format: true, ..ScanOptions::default() };
        let m = ScanManager::with_registry(vec![fake_type("boom", &["boom"], panicking_check)], opts);
        assert!(matches!(m.validate(Path::new("x.boom")), Err(ScanError::Aborted { .. })));
        let rec = m.scan(Path::new("x.boom"));
        assert_eq!(rec.valid, Some(false));
        assert!(rec.error.unwrap().contains("aborted"));
    }

    #[test]
    fn panicking_check_without_timeout_is_isolated() {
        let opts = ScanOptions { check_format: true, ..ScanOptions::default() };
        let m = ScanManager::with_registry(vec![fake_type("boom", &["boom"], panicking_check)], opts);
        assert!(matches!(m.validate(Path::new("x.boom")), Err(ScanError::Aborted { .. })));
        assert_eq!(m.scan(Path::new("x.boom")).valid, Some(false));
    }

    #[test]
    fn stalled_checks_are_capped() {
        let opts = ScanOptions { format_timeout: Some(Duration::from_millis(20)), ..ScanOptions::default() };
        let mut m = ScanManager::with_registry(vec![fake_type("slow", &["slow"], slow_check)], opts);
        m.pending_limit = 1;

        assert!(matches!(m.validate(Path::new("a.slow")), Err(ScanError::Timeout { .. })));
        // 上一个线程仍在 sleep
        assert!(matches!(m.validate(Path::new("b.slow")), Err(ScanError::TooManyPendingChecks { limit: 1 })));

        std::thread::sleep(Duration::from_millis(900));
        assert_eq!(m.pending_checks.load(Ordering::SeqCst), 0);
        assert!(matches!(m.validate(Path::new("c.slow")), Err(ScanError::Timeout { .. })));
    }

    #[test]
    fn size_limit_skips_types_without_checks() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("big.pdf");
        std::fs::write(&pdf, vec![b'%'; 64]).unwrap();
        let m = ScanManager::with_options(ScanOptions { max_file_size: Some(16), ..ScanOptions::default() });
        assert!(m.validate(&pdf).is_ok());
        assert!(m.validate(&dir.path().join("missing.docx")).is_ok());
    }

    #[test]
    fn max_file_size_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("big.txt");
        std::fs::write(&p, vec![b'a'; 64]).unwrap();
        let opts = ScanOptions { max_file_size: Some(16), ..ScanOptions::default() };
        let m = ScanManager::with_options(opts);
        assert!(matches!(m.validate(&p), Err(ScanError::FileTooLarge { size: 64, max: 16 })));
    }

    #[test]
    fn check_failure_keeps_danger() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bad.py");
        std::fs::write(&p, [0xFF, 0xFE, 0x00]).unwrap();
        let m = ScanManager::with_options(ScanOptions { check_format: true, ..ScanOptions::default() });
        let rec = m.scan(&p);
        assert_eq!(rec.danger, DangerLevel::Minimal);
        assert_eq!(rec.valid, Some(false));
        assert_eq!(rec.error.as_deref(), Some("File contains unrecognized characters"));
    }

    #[test]
    fn missing_file_with_check_is_record_level_error() {
        let m = ScanManager::with_options(ScanOptions { check_format: true, ..ScanOptions::default() });
        let rec = m.scan(Path::new("/definitely/missing/notes.txt"));
        assert_eq!(rec.supported, Some(true));
        assert_eq!(rec.valid, Some(false));
        assert!(rec.error.unwrap().starts_with("failed to read"));
    }
}
