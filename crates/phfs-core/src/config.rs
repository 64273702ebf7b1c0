//! 选项文件加载（TOML）
//!
//! 文件格式示例：
//! ```toml
//! [scan]
//! check_format = true
//! max_file_size = 5242880
//! format_timeout_ms = 2000
//! threads = 4
//! recursive = false
//! ```
//! 缺省的键保持 `ScanOptions::default()` 的取值。类型表本身不可配置。
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::options::ScanOptions;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScanSection {
    #[serde(default)]
    check_format: Option<bool>,
    #[serde(default)]
    max_file_size: Option<u64>,
    #[serde(default)]
    format_timeout_ms: Option<u64>,
    #[serde(default)]
    threads: Option<usize>,
    #[serde(default)]
    recursive: Option<bool>,
}

/// 顶层文件结构
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    scan: ScanSection,
}

/// 从 TOML 文件加载扫描选项
pub fn load_options(path: &Path) -> Result<ScanOptions> {
    let txt = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    parse_options(&txt).with_context(|| format!("parse config {}", path.display()))
}

/// 从 TOML 文本解析扫描选项
pub fn parse_options(txt: &str) -> Result<ScanOptions> {
    let parsed: ConfigFile = toml::from_str(txt)?;
    let s = parsed.scan;
    let mut opts = ScanOptions::default();

    if let Some(v) = s.check_format { opts.check_format = v; }
    if let Some(v) = s.recursive { opts.recursive = v; }
    opts.max_file_size = s.max_file_size;
    opts.format_timeout = s.format_timeout_ms.map(Duration::from_millis);
    // threads = 0 视同自动
    opts.threads = s.threads.filter(|&n| n >= 1);

    Ok(opts)
}
