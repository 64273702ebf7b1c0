use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use phfs_core::{load_options, scan_and_write, write_json, ScanManager, ScanOptions};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(
    name = "phfs",
    version,
    about = "Prints phishing threat level for one or more files. Use -j for JSON output.",
    override_usage = "phfs [-j] <file1> [<file2>...]"
)]
struct Cli {
    /// 待评估的文件（或配合 -r 的目录）
    files: Vec<PathBuf>,

    /// JSON 输出（目前唯一的输出模式）
    #[arg(short = 'j', long)]
    json: bool,

    /// 同时执行格式校验，结果以 valid/error 字段输出
    #[arg(long)]
    check_format: bool,

    /// 递归展开目录参数
    #[arg(short, long)]
    recursive: bool,

    /// 线程数（"auto"=CPU 核心数）
    #[arg(long)]
    threads: Option<String>,

    /// 最大校验文件大小（单位字节）
    #[arg(long)]
    max_file_size: Option<u64>,

    /// 单文件格式校验超时（毫秒）
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// 选项文件路径（TOML）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 输出文件；缺省写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 打印内置文件类型表
    #[arg(long)]
    list_types: bool,
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    // 无参数时打印用法并以 0 退出（先于创建输出文件）
    if cli.files.is_empty() && !cli.list_types {
        Cli::command().print_help()?;
        return Ok(());
    }

    let mut out: Box<dyn Write> = match &cli.output {
        Some(p) => Box::new(BufWriter::new(File::create(p).context("create output file")?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    if cli.list_types {
        let manager = ScanManager::new();
        write_json(&mut out, manager.registry())?;
        out.flush()?;
        return Ok(());
    }

    // JSON 为目前唯一的输出模式，-j 仅为兼容保留
    debug!(json = cli.json, "output mode: json");
    let opts = build_options(&cli)?;
    let stats = scan_and_write(&cli.files, &mut out, &opts).context("scan and write failed")?;
    out.flush()?;

    info!(
        files_scanned = stats.files_scanned,
        supported = stats.supported,
        unsupported = stats.unsupported,
        invalid = stats.invalid,
        "scan finished"
    );
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 日志写到 stderr，保证 stdout 只有 JSON
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 合并选项：先读选项文件，再用命令行参数覆盖
fn build_options(cli: &Cli) -> Result<ScanOptions> {
    let mut opts = match &cli.config {
        Some(p) => load_options(p)?,
        None => ScanOptions::default(),
    };
    if cli.check_format { opts.check_format = true; }
    if cli.recursive { opts.recursive = true; }
    if let Some(t) = &cli.threads { opts.threads = parse_threads(t); }
    if let Some(max) = cli.max_file_size { opts.max_file_size = Some(max); }
    if let Some(ms) = cli.timeout_ms { opts.format_timeout = Some(Duration::from_millis(ms)); }
    Ok(opts)
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}
