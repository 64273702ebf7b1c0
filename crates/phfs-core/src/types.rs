//! 公共类型（对外暴露）
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// 文件类型属性（描述性元数据，当前不参与打分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Attribute {
    /// 容器类（如压缩包）
    Container,
    /// 文件名可带多重扩展名，如 tar.gz
    MultipleExtensions,
    /// 含可执行代码的二进制
    Executable,
    /// 可用于安装软件（隐含 container）
    Installer,
    /// 不允许生成预览
    DisablePreviews,
    /// 数据文件可内嵌宏
    Macros,
    /// 程序脚本源码
    Script,
    /// 可藏匿数据（如元数据段）
    HiddenInfo,
}

impl Attribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Container => "container",
            Attribute::MultipleExtensions => "multiple-extensions",
            Attribute::Executable => "executable",
            Attribute::Installer => "installer",
            Attribute::DisablePreviews => "disable-previews",
            Attribute::Macros => "macros",
            Attribute::Script => "script",
            Attribute::HiddenInfo => "hidden-info",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 危险等级（由 threat_base 按固定阈值换算）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DangerLevel {
    None,
    Minimal,
    Low,
    Moderate,
    High,
}

impl DangerLevel {
    /// 阈值：0 → None；1-10 → Minimal；11-20 → Low；21-30 → Moderate；31+ → High
    pub fn from_threat(threat: u32) -> Self {
        match threat {
            t if t > 30 => DangerLevel::High,
            t if t > 20 => DangerLevel::Moderate,
            t if t > 10 => DangerLevel::Low,
            t if t > 0 => DangerLevel::Minimal,
            _ => DangerLevel::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DangerLevel::None => "None",
            DangerLevel::Minimal => "Minimal",
            DangerLevel::Low => "Low",
            DangerLevel::Moderate => "Moderate",
            DangerLevel::High => "High",
        }
    }
}

impl fmt::Display for DangerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个文件的扫描结果（对应输出 JSON 数组的单个元素）
/// - `supported`/`description` 仅在识别出类型时出现
/// - `valid`/`error` 仅在开启格式校验时出现
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub danger: DangerLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanRecord {
    /// 未识别类型的记录：只有 name 与 danger = None
    pub(crate) fn unsupported(name: String) -> Self {
        Self {
            name,
            supported: None,
            description: None,
            danger: DangerLevel::None,
            valid: None,
            error: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported == Some(true)
    }
}

/// 预览结果
/// - Original：预览就是被扫描文件本身，调用方不得删除
/// - Generated：新生成的临时文件，归调用方所有，用完需 `discard`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Original(PathBuf),
    Generated(PathBuf),
}

impl Preview {
    pub fn path(&self) -> &Path {
        match self {
            Preview::Original(p) | Preview::Generated(p) => p,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Preview::Generated(_))
    }

    /// 释放预览：仅删除调用方持有的生成文件，原文件保持不动
    pub fn discard(self) -> std::io::Result<()> {
        match self {
            Preview::Generated(p) => std::fs::remove_file(p),
            Preview::Original(_) => Ok(()),
        }
    }
}
