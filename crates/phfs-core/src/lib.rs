//! 文件钓鱼/恶意威胁等级评估核心库
//!
//! 设计要点：
//! - 类型表（filetypes）为编译期固定的有序描述项；按扩展名（大小写不敏感）先到先得匹配。
//! - 危险等级仅由基础威胁分换算，格式校验结果只作为附加字段输出。
//! - 单文件错误只体现在该文件的记录中，批量扫描不中断；输出顺序与输入一致。

mod config;
mod error;
mod filetypes;
mod formats;
mod manager;
mod options;
mod scan;
mod types;

pub use config::{load_options, parse_options};
pub use error::ScanError;
pub use filetypes::FileTypeDescriptor;
pub use manager::{file_extension, ScanManager, MAX_PENDING_CHECKS};
pub use options::{ScanOptions, ScanStats};
pub use scan::{collect_inputs, scan_all, scan_and_write, write_json};
pub use types::{Attribute, DangerLevel, Preview, ScanRecord};
