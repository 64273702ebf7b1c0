//! 格式校验与预览钩子（由 filetypes 中的描述表引用）
use image::{ImageFormat, ImageReader};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use crate::error::ScanError;
use crate::types::Preview;

pub(crate) const MSG_BAD_TEXT: &str = "File contains unrecognized characters";
pub(crate) const MSG_CORRUPTED: &str = "Corrupted file contents";
pub(crate) const MSG_NOT_JPEG: &str = "File is not a JPEG photo";

/// 文本类校验：整文件必须能按 UTF-8（含 ASCII）解码
pub(crate) fn check_utf8_text(path: &Path) -> Result<(), ScanError> {
    let file = File::open(path).map_err(|e| ScanError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(|e| ScanError::io(path, e))?;

    if std::str::from_utf8(&buf).is_err() {
        return Err(ScanError::FormatValidation(MSG_BAD_TEXT.to_string()));
    }
    Ok(())
}

/// JPEG 结束标记 EOI
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// JPEG 校验：
/// - 先按文件头识别格式，非 JPEG 直接判定
/// - 必须以 EOI 结尾（允许尾部填充 NUL/空白）；解码器会静默补齐缺失的扫描数据，截断只能靠这里发现
/// - 最后完整解码一次，头部/段结构损坏在这里暴露
pub(crate) fn check_jpeg(path: &Path) -> Result<(), ScanError> {
    let file = File::open(path).map_err(|e| ScanError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(|e| ScanError::io(path, e))?;

    let reader = ImageReader::new(Cursor::new(buf.as_slice()))
        .with_guessed_format()
        .map_err(|e| ScanError::io(path, e))?;

    match reader.format() {
        Some(ImageFormat::Jpeg) => {}
        Some(_) => return Err(ScanError::FormatValidation(MSG_NOT_JPEG.to_string())),
        None => return Err(ScanError::FormatValidation(MSG_CORRUPTED.to_string())),
    }

    if !ends_with_eoi(&buf) {
        return Err(ScanError::FormatValidation(MSG_CORRUPTED.to_string()));
    }

    // 解码出的图像在此作用域结束即释放
    reader
        .decode()
        .map(|_| ())
        .map_err(|_| ScanError::FormatValidation(MSG_CORRUPTED.to_string()))
}

fn ends_with_eoi(buf: &[u8]) -> bool {
    let end = buf
        .iter()
        .rposition(|&b| !(b == 0 || b.is_ascii_whitespace()))
        .map_or(0, |i| i + 1);
    buf[..end].ends_with(&JPEG_EOI)
}

/// 图片的预览就是其本身
pub(crate) fn preview_original(path: &Path) -> Result<Preview, ScanError> {
    Ok(Preview::Original(path.to_path_buf()))
}
