//! 文件类型描述表（固定顺序，编译期确定）
//!
//! 每个描述项包含：名称、扩展名集合、基础威胁分、属性、平台限制，
//! 以及两个行为钩子（格式校验 / 预览生成）。钩子为空时使用默认行为：
//! - 格式校验：总是通过（即“尚未实现”，与“已校验无误”不可区分）
//! - 预览：返回 `ScanError::PreviewUnavailable`
use serde::Serialize;
use std::path::Path;

use crate::error::ScanError;
use crate::formats;
use crate::types::{Attribute, DangerLevel, Preview};

pub(crate) type FormatCheckFn = fn(&Path) -> Result<(), ScanError>;
pub(crate) type PreviewFn = fn(&Path) -> Result<Preview, ScanError>;

/// 单个文件类型的描述
#[derive(Debug, Clone, Serialize)]
pub struct FileTypeDescriptor {
    pub name: &'static str,
    /// 小写、不带点
    pub extensions: &'static [&'static str],
    /// 基础威胁分，取值 [0, 40]
    pub threat_base: u32,
    pub attributes: &'static [Attribute],
    /// 平台限制，None 表示与平台无关
    pub platform: Option<&'static str>,
    #[serde(skip)]
    pub(crate) check: Option<FormatCheckFn>,
    #[serde(skip)]
    pub(crate) preview: Option<PreviewFn>,
}

impl FileTypeDescriptor {
    /// `ext` 需已小写、去掉前导点；空扩展名永不匹配
    pub fn matches_extension(&self, ext: &str) -> bool {
        !ext.is_empty() && self.extensions.iter().any(|e| *e == ext)
    }

    pub fn danger(&self) -> DangerLevel {
        DangerLevel::from_threat(self.threat_base)
    }

    pub fn has_attribute(&self, attr: Attribute) -> bool {
        self.attributes.contains(&attr)
    }

    /// 校验文件格式；Err(FormatValidation) 携带可读诊断信息
    pub fn check_format(&self, path: &Path) -> Result<(), ScanError> {
        match self.check {
            Some(check) => check(path),
            None => Ok(()),
        }
    }

    /// 生成预览；返回的 `Preview::Generated` 由调用方负责删除
    pub fn generate_preview(&self, path: &Path) -> Result<Preview, ScanError> {
        match self.preview {
            Some(preview) => preview(path),
            None => Err(ScanError::PreviewUnavailable),
        }
    }
}

const PLAIN_TEXT: FileTypeDescriptor = FileTypeDescriptor {
    name: "Plain text",
    extensions: &["adoc", "config", "ini", "md", "txt"],
    threat_base: 0,
    attributes: &[],
    platform: None,
    check: Some(formats::check_utf8_text),
    preview: None,
};

const SCRIPT: FileTypeDescriptor = FileTypeDescriptor {
    name: "Programming script",
    extensions: &["c", "cpp", "css", "h", "hpp", "js", "php", "ps1", "py", "rb", "rs", "sh"],
    threat_base: 1,
    attributes: &[Attribute::Script],
    platform: None,
    check: Some(formats::check_utf8_text),
    preview: None,
};

const JPEG: FileTypeDescriptor = FileTypeDescriptor {
    name: "JPEG Photo",
    extensions: &["jpg", "jpeg"],
    threat_base: 1,
    attributes: &[Attribute::HiddenInfo],
    platform: None,
    check: Some(formats::check_jpeg),
    preview: Some(formats::preview_original),
};

// PDF / Word 目前只有元数据，格式校验与预览均未实现
const PDF: FileTypeDescriptor = FileTypeDescriptor {
    name: "Adobe PDF Document",
    extensions: &["pdf"],
    threat_base: 3,
    attributes: &[Attribute::Macros, Attribute::HiddenInfo],
    platform: None,
    check: None,
    preview: None,
};

const WORD: FileTypeDescriptor = FileTypeDescriptor {
    name: "Microsoft Word Document",
    extensions: &["doc", "docx"],
    threat_base: 3,
    attributes: &[Attribute::Macros, Attribute::HiddenInfo],
    platform: None,
    check: None,
    preview: None,
};

/// 内置类型表；顺序即匹配优先级（先到先得）
pub(crate) fn builtin_types() -> Vec<FileTypeDescriptor> {
    vec![PLAIN_TEXT, SCRIPT, JPEG, PDF, WORD]
}
