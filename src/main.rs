// Wed Oct 21 2026 - Alex

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use memprobe::{
    config::Config,
    memory::{MemoryError, ProcessHandle},
    pointer_scan::{PointerScanFile, PointerScanRecord, PointerScanSettings},
    scan::{Scan, Scanner},
    utils::{
        self,
        logging::{self, LoggingUtils},
    },
};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Process memory reader, scanner and pointer-scan file tool", long_about = None)]
struct Args {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List running processes
    Processes {
        /// Only names containing this text
        filter: Option<String>,
    },
    /// List modules loaded in a process (pid or name)
    Modules { target: String },
    /// List committed regions of a process
    Regions { target: String },
    /// Hex dump target memory
    Read {
        target: String,
        address: String,
        #[arg(default_value_t = 64)]
        len: usize,
    },
    /// Write a value into target memory
    #[command(group(ArgGroup::new("value").required(true).args(["as_u32", "as_i32", "string", "bytes"])))]
    Write {
        target: String,
        address: String,
        #[arg(long = "u32")]
        as_u32: Option<u32>,
        #[arg(long = "i32")]
        as_i32: Option<i32>,
        /// Written with a null terminator
        #[arg(long)]
        string: Option<String>,
        /// Hex bytes, e.g. "90 90 C3"
        #[arg(long)]
        bytes: Option<String>,
    },
    /// Search target memory for a value
    #[command(group(ArgGroup::new("value").required(true).args(["as_u32", "as_i32", "string", "regex"])))]
    Scan {
        target: String,
        #[arg(long = "u32")]
        as_u32: Option<u32>,
        #[arg(long = "i32")]
        as_i32: Option<i32>,
        #[arg(long)]
        string: Option<String>,
        #[arg(long)]
        regex: Option<String>,
        #[arg(long)]
        begin: Option<String>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long, default_value_t = 100)]
        max_results: usize,
        /// Only regions that grant write access
        #[arg(long)]
        writable: bool,
        /// After the first scan, keep narrowing the results with values read from stdin
        #[arg(long, conflicts_with_all = ["string", "regex"])]
        refine: bool,
    },
    /// Summarize a pointer-scan file and its result files
    PtrscanInfo {
        file: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        single_threaded: bool,
    },
    /// Rewrite a pointer-scan file, optionally uncompressed or with a new result-file count
    PtrscanConvert {
        input: PathBuf,
        output: PathBuf,
        /// Store plain records instead of packed ones
        #[arg(long)]
        uncompressed: bool,
        /// Exact number of result files to write
        #[arg(long, conflicts_with = "single")]
        files: Option<usize>,
        /// Write every record to one result file
        #[arg(long)]
        single: bool,
    },
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {:#}", "[!]".red(), e);
            std::process::exit(1);
        }
    };

    let verbosity = if config.enable_verbose_output {
        args.verbose.max(2)
    } else {
        args.verbose
    };
    if std::env::var_os("RUST_LOG").is_some() {
        logging::init_from_env();
    } else {
        LoggingUtils::init_logger(LoggingUtils::level_from_verbosity(verbosity));
    }

    let start_time = Instant::now();
    if let Err(e) = run(&args, &config) {
        eprintln!("{} {:#}", "[!]".red(), e);
        std::process::exit(1);
    }
    log::debug!("Finished in {:.2}s", start_time.elapsed().as_secs_f64());
}

fn load_config(args: &Args) -> Result<Config> {
    match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn run(args: &Args, config: &Config) -> Result<()> {
    match &args.command {
        Command::Processes { filter } => list_processes(filter.as_deref()),
        Command::Modules { target } => list_modules(target),
        Command::Regions { target } => list_regions(target),
        Command::Read { target, address, len } => dump(target, address, *len),
        Command::Write {
            target,
            address,
            as_u32,
            as_i32,
            string,
            bytes,
        } => {
            let process = open_target(target)?;
            let address = parse_addr(address)?;
            let (ok, len) = match (as_u32, as_i32, string, bytes) {
                (Some(v), _, _, _) => (process.write_value(address, *v), 4),
                (_, Some(v), _, _) => (process.write_value(address, *v), 4),
                (_, _, Some(s), _) => (process.write_string(address, s), s.len() + 1),
                (_, _, _, Some(hex)) => {
                    let data = parse_hex_bytes(hex)?;
                    (process.write(address, &data), data.len())
                }
                _ => bail!("no value to write given"),
            };
            if !ok {
                bail!("could not write {} bytes at {:#x}", len, address);
            }
            println!("{} Wrote {} bytes at {:#x}", "[+]".green(), len, address);
            Ok(())
        }
        Command::Scan {
            target,
            as_u32,
            as_i32,
            string,
            regex,
            begin,
            size,
            max_results,
            writable,
            refine,
        } => {
            let process = open_target(target)?;
            let begin = begin.as_deref().map(parse_addr).transpose()?.unwrap_or(0);
            let size = match size.as_deref() {
                Some(s) => parse_addr(s)?,
                None => process.max_pointer().saturating_sub(begin),
            };
            let scan = match (as_u32, as_i32, string, regex) {
                (Some(v), _, _, _) => Scan::value(*v, begin, size),
                (_, Some(v), _, _) => Scan::value(*v, begin, size),
                (_, _, Some(s), _) => Scan::string(s, begin, size)?,
                (_, _, _, Some(r)) => Scan::regex(r, begin, size)?,
                _ => bail!("no scan value given"),
            };
            let scan = scan.with_max_results(*max_results);
            let scan = if *writable { scan.with_access(false, true, false)? } else { scan };
            let refine = refine.then_some(as_i32.is_some());
            run_scan(&process, config, scan, refine, !args.no_progress && config.enable_progress_bars)
        }
        Command::PtrscanInfo {
            file,
            limit,
            single_threaded,
        } => pointer_scan_info(file, *limit, !*single_threaded),
        Command::PtrscanConvert {
            input,
            output,
            uncompressed,
            files,
            single,
        } => convert_pointer_scan(config, input, output, *uncompressed, *files, *single),
    }
}

fn parse_addr(s: &str) -> Result<u64> {
    utils::parse_address(s).ok_or_else(|| anyhow!("invalid address or size: {}", s))
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        bail!("expected an even number of hex digits: {}", s);
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16).with_context(|| format!("invalid hex byte in {}", s))
        })
        .collect()
}

#[cfg(target_os = "linux")]
fn native_handle() -> Result<ProcessHandle> {
    Ok(ProcessHandle::native())
}

#[cfg(not(target_os = "linux"))]
fn native_handle() -> Result<ProcessHandle> {
    Err(MemoryError::NotSupported("no process backend for this platform".to_string()).into())
}

fn open_target(target: &str) -> Result<ProcessHandle> {
    let mut process = native_handle()?;
    let attached = match target.parse::<u32>() {
        Ok(pid) => process.attach(pid)?,
        Err(_) => process.attach_by_name(target)?,
    };
    if !attached {
        return Err(MemoryError::AttachFailed(target.parse().unwrap_or(0)))
            .with_context(|| format!("opening {} (are you allowed to ptrace it?)", target));
    }
    println!(
        "{} Attached to {} (pid {}, {})",
        "[+]".green(),
        process.name(),
        process.pid(),
        process.arch()
    );
    Ok(process)
}

fn list_processes(filter: Option<&str>) -> Result<()> {
    let process = native_handle()?;
    let procs = process
        .processes()
        .into_iter()
        .filter(|p| filter.map_or(true, |f| p.name.contains(f)))
        .sorted_by_key(|p| p.id)
        .collect_vec();

    println!("{:>8} {:>8} {:>8}  {}", "PID".bold(), "PPID".bold(), "THREADS".bold(), "NAME".bold());
    for p in &procs {
        println!("{:>8} {:>8} {:>8}  {}", p.id, p.parent_id, p.thread_count, p.name);
    }
    println!("{} {} processes", "[+]".green(), procs.len());
    Ok(())
}

fn list_modules(target: &str) -> Result<()> {
    let process = open_target(target)?;
    let modules = process.modules();
    for module in &modules {
        println!(
            "  {:#014x} {:>10}  {}",
            module.base,
            utils::format_bytes(module.size),
            module.name.cyan()
        );
    }
    println!("{} {} modules", "[+]".green(), modules.len());
    Ok(())
}

fn list_regions(target: &str) -> Result<()> {
    let process = open_target(target)?;
    let regions = process.regions();
    let total: u64 = regions.iter().map(|r| r.range().size()).sum();
    for region in &regions {
        println!("  {}", region);
    }
    println!(
        "{} {} regions, {} committed",
        "[+]".green(),
        regions.len(),
        utils::format_bytes(total)
    );
    Ok(())
}

fn dump(target: &str, address: &str, len: usize) -> Result<()> {
    let process = open_target(target)?;
    let address = parse_addr(address)?;
    let mut data = vec![0u8; len];
    if !process.read(address, &mut data) {
        bail!("could not read {} bytes at {:#x}", len, address);
    }
    for (row, chunk) in data.chunks(16).enumerate() {
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!(
            "{:#014x}  {:<47}  {}",
            address + row as u64 * 16,
            utils::hex_string_spaced(chunk),
            ascii.dimmed()
        );
    }
    Ok(())
}

fn run_scan(process: &ProcessHandle, config: &Config, mut scan: Scan, refine: Option<bool>, progress: bool) -> Result<()> {
    println!("{} Scanning for {} ({} bytes)", "[*]".blue(), scan.type_name(), scan.value_size());

    let spinner = progress.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Scanning regions...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let scanner = Scanner::with_config(process, config);
    let mut results = match refine {
        Some(signed) => {
            if let Some(pb) = &spinner {
                pb.finish_and_clear();
            }
            refine_scan(&scanner, &mut scan, signed)?
        }
        None => scanner.scan(&scan),
    };
    results.sort_unstable();

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    for addr in &results {
        println!("  {:#014x}", addr);
    }
    println!("{} {} results", "[+]".green(), results.len());
    Ok(())
}

/// Narrows a value scan with one value per stdin line until an empty line.
fn refine_scan(scanner: &Scanner<'_>, scan: &mut Scan, signed: bool) -> Result<Vec<u64>> {
    let mut bad_input = None;
    let results = scanner.scan_modify(scan, |scan| {
        print!("{} Next value (empty to stop): ", "[*]".blue());
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            return false;
        }
        let text = line.trim();
        if text.is_empty() {
            return false;
        }
        let set = if signed {
            text.parse::<i32>().map_err(anyhow::Error::from).and_then(|v| Ok(scan.set_value(v)?))
        } else {
            text.parse::<u32>().map_err(anyhow::Error::from).and_then(|v| Ok(scan.set_value(v)?))
        };
        match set {
            Ok(()) => true,
            Err(e) => {
                bad_input = Some(e.context(format!("parsing {:?}", text)));
                false
            }
        }
    })?;
    match bad_input {
        Some(e) => Err(e),
        None => Ok(results),
    }
}

fn format_record(file: &PointerScanFile, record: &PointerScanRecord) -> String {
    let module = file.module_name(record.module_index).unwrap_or("?");
    let chain = record.offsets.iter().map(|o| format!("{:#x}", o)).join(" -> ");
    if chain.is_empty() {
        format!("\"{}\"+{:#x}", module, record.module_offset)
    } else {
        format!("\"{}\"+{:#x} -> {}", module, record.module_offset, chain)
    }
}

fn pointer_scan_info(path: &Path, limit: usize, threaded: bool) -> Result<()> {
    println!("{} Loading {}", "[*]".blue(), path.display());
    let file = PointerScanFile::load(path, threaded).with_context(|| format!("reading {}", path.display()))?;
    let settings = file.settings();

    println!("{}", "Pointer scan".cyan().bold());
    println!("{}", "-".repeat(40).cyan());
    println!("  Version:     {}", file.header().version);
    println!("  Max level:   {}", settings.max_level);
    println!("  Max offset:  {:#x}", settings.max_offset);
    println!("  Compressed:  {}", settings.compressed);
    println!("  Aligned:     {}", settings.aligned);
    if !settings.ends_with.is_empty() {
        println!(
            "  Ends with:   {}",
            settings.ends_with.iter().map(|o| format!("{:#x}", o)).join(", ")
        );
    }
    println!("  Modules:     {}", file.module_names().join(", "));
    println!("  Entry size:  {} bytes", file.header().entry_size());
    println!();

    for record in file.records().iter().take(limit) {
        println!("  {}", format_record(&file, record));
    }
    if file.len() > limit {
        println!("  {}", format!("... {} more", file.len() - limit).dimmed());
    }
    println!("{} {} pointer paths", "[+]".green(), file.len());
    Ok(())
}

fn convert_pointer_scan(
    config: &Config,
    input: &Path,
    output: &Path,
    uncompressed: bool,
    files: Option<usize>,
    single: bool,
) -> Result<()> {
    println!("{} Loading {}", "[*]".blue(), input.display());
    let source = PointerScanFile::load(input, true).with_context(|| format!("reading {}", input.display()))?;

    let settings = if uncompressed {
        PointerScanSettings {
            compressed: false,
            aligned: false,
            max_offset: u32::MAX as u64,
            ends_with: Vec::new(),
            ..source.settings()
        }
    } else {
        source.settings()
    };

    let mut converted = PointerScanFile::new(&settings)?;
    for name in source.module_names() {
        converted.add_module(name);
    }
    for record in source.records() {
        converted
            .push(record.clone())
            .with_context(|| format!("converting {}", format_record(&source, record)))?;
    }

    let file_count = match files {
        Some(n) => {
            converted.save_sharded(output, n)?;
            n.max(1)
        }
        None => converted.save_with_config(output, single, config)?,
    };
    println!(
        "{} Wrote {} pointer paths to {} ({} result files)",
        "[+]".green(),
        converted.len(),
        output.display(),
        file_count
    );
    Ok(())
}
