//! 批量扫描主流程与并行调度
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::manager::ScanManager;
use crate::options::{ScanOptions, ScanStats};
use crate::types::ScanRecord;

/// 展开输入路径：
/// - 普通参数原样保留（不存在的路径也保留，交由扫描记录体现）
/// - `recursive` 时目录参数替换为其下所有文件，按路径排序
pub fn collect_inputs(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        if !(recursive && p.is_dir()) {
            out.push(p.clone());
            continue;
        }
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(p).min_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => { warn!(error = %e, "skip unreadable entry"); continue; }
            };
            if entry.file_type().is_file() { files.push(entry.into_path()); }
        }
        // 排序，确保输出顺序可复现
        files.sort();
        out.extend(files);
    }
    out
}

/// 扫描全部路径，结果顺序与输入一致
/// 线程数 > 1 且路径多于 1 个时并行，否则串行
pub fn scan_all(manager: &Arc<ScanManager>, paths: &[PathBuf]) -> Result<(Vec<ScanRecord>, ScanStats)> {
    let threads = manager.options().threads.unwrap_or_else(num_cpus::get);
    let mut stats = ScanStats::default();

    if threads > 1 && paths.len() > 1 {
        let records = scan_parallel(manager, paths, threads)?;
        for rec in &records { stats.record(rec); }
        return Ok((records, stats));
    }

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let rec = manager.scan(path);
        stats.record(&rec);
        records.push(rec);
    }
    Ok((records, stats))
}

/// 并行调度：
/// - 后台线程内用 Rayon 线程池并行扫描，经通道回传 (idx, record)
/// - 当前线程按 idx 重排，保证与输入顺序一致
fn scan_parallel(manager: &Arc<ScanManager>, paths: &[PathBuf], threads: usize) -> Result<Vec<ScanRecord>> {
    use crossbeam_channel as channel;
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("build rayon pool")?;

    type Msg = (usize /*idx*/, ScanRecord);
    let (tx, rx) = channel::bounded::<Msg>(256);

    let manager = Arc::clone(manager);
    let files_vec: Vec<(usize, PathBuf)> = paths.iter().cloned().enumerate().collect();

    let scan_thread = std::thread::spawn(move || {
        pool.install(|| {
            files_vec.par_iter().for_each(|(idx, path)| {
                let _ = tx.send((*idx, manager.scan(path)));
            });
        });
        // 结束后 Sender 全部被丢弃，Receiver 将收到关闭信号
    });

    let mut next_idx: usize = 0;
    let mut buffer: BTreeMap<usize, ScanRecord> = BTreeMap::new();
    let mut records: Vec<ScanRecord> = Vec::with_capacity(paths.len());

    while let Ok((idx, rec)) = rx.recv() {
        buffer.insert(idx, rec);
        while let Some(rec) = buffer.remove(&next_idx) {
            records.push(rec);
            next_idx += 1;
        }
    }

    if scan_thread.join().is_err() {
        anyhow::bail!("scan worker panicked");
    }
    if records.len() != paths.len() {
        anyhow::bail!("scan produced {} records for {} paths", records.len(), paths.len());
    }
    Ok(records)
}

/// 以 JSON 写出（制表符缩进），用于扫描记录与类型表
pub fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut *out, formatter);
    value.serialize(&mut ser).context("serialize json")?;
    writeln!(out)?;
    Ok(())
}

/// 扫描路径列表并将结果写入 `out`
pub fn scan_and_write(paths: &[PathBuf], out: &mut dyn Write, opts: &ScanOptions) -> Result<ScanStats> {
    let manager = Arc::new(ScanManager::with_options(opts.clone()));
    let inputs = collect_inputs(paths, opts.recursive);
    info!(inputs = inputs.len(), check_format = opts.check_format, "starting scan");

    let (records, stats) = scan_all(&manager, &inputs)?;
    write_json(out, records.as_slice())?;
    Ok(stats)
}
