//! memslab command-line tool
//!
//! Inspect the size-class table and drive an allocator with a synthetic
//! cache workload:
//!
//! ```bash
//! # Which class serves a 100 byte item?
//! memslab resolve 100
//!
//! # Churn 100k items under a 64 MiB ceiling and print the STAT report
//! memslab --memory-limit 67108864 simulate --items 100000 --free-ratio 0.3
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use memslab::metrics::{export_metrics, init_metrics};
use memslab::slab::{resolve, ChunkHandle, SizeClass, NO_CLASS, POWER_LARGEST, POWER_SMALLEST};
use memslab::{AllocatorConfig, SharedAllocator, Strategy};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// memslab - power-of-two slab allocator
#[derive(Parser, Debug)]
#[command(name = "memslab")]
#[command(version = memslab::VERSION)]
#[command(about = "Power-of-two slab allocator for cache entries", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "MEMSLAB_CONFIG")]
    config: Option<PathBuf>,

    /// Memory ceiling in bytes, 0 for unbounded (overrides the config file)
    #[arg(long, global = true)]
    memory_limit: Option<usize>,

    /// Allocator strategy (overrides the config file)
    #[arg(long, global = true)]
    strategy: Option<Strategy>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "MEMSLAB_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the size-class table
    Classes,

    /// Show the size class serving each size
    Resolve {
        /// Request sizes in bytes
        #[arg(required = true)]
        sizes: Vec<usize>,
    },

    /// Run a synthetic allocate/free workload and print the report
    Simulate {
        /// Number of allocations
        #[arg(long, default_value = "10000")]
        items: usize,

        /// Smallest item size
        #[arg(long, default_value = "16")]
        min_size: usize,

        /// Largest item size
        #[arg(long, default_value = "4096")]
        max_size: usize,

        /// Fraction of live items freed after each allocation round
        #[arg(long, default_value = "0.25")]
        free_ratio: f64,

        /// Workload seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,

        /// Also print Prometheus metrics
        #[arg(long)]
        metrics: bool,
    },

    /// Show version
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let _guard = setup_logging(&cli)?;

    match cli.command {
        Commands::Classes => classes_command(),
        Commands::Resolve { ref sizes } => resolve_command(sizes),
        Commands::Simulate {
            items,
            min_size,
            max_size,
            free_ratio,
            seed,
            format,
            metrics,
        } => {
            let config = load_config(&cli)?;
            let workload = Workload {
                items,
                min_size,
                max_size,
                free_ratio,
                seed,
            };
            simulate_command(&config, &workload, format, metrics)
        }
        Commands::Version => {
            println!("memslab {}", memslab::VERSION);
            Ok(())
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "memslab.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(guard)
}

/// Config file and environment, then command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<AllocatorConfig> {
    let mut config = AllocatorConfig::load(cli.config.as_deref())?;
    if let Some(limit) = cli.memory_limit {
        config.memory_limit = limit;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    info!(
        memory_limit = config.memory_limit,
        strategy = %config.strategy,
        "Loaded configuration"
    );
    Ok(config)
}

fn classes_command() -> anyhow::Result<()> {
    println!("{:>5} {:>10} {:>12}", "class", "chunk_size", "per_slab");
    for id in POWER_SMALLEST..=POWER_LARGEST {
        let sc = SizeClass::new(id);
        println!("{:>5} {:>10} {:>12}", id, sc.chunk_size, sc.chunks_per_slab);
    }
    Ok(())
}

fn resolve_command(sizes: &[usize]) -> anyhow::Result<()> {
    for &size in sizes {
        match resolve(size) {
            NO_CLASS => println!("{} -> unsupported", size),
            id => println!("{} -> class {} ({} byte chunks)", size, id, 1usize << id),
        }
    }
    Ok(())
}

/// Synthetic cache churn
#[derive(Debug, Clone)]
struct Workload {
    items: usize,
    min_size: usize,
    max_size: usize,
    free_ratio: f64,
    seed: u64,
}

/// Deterministic xorshift64 generator for reproducible workloads
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform-ish value in `lo..=hi`; requires `lo <= hi`
    fn range(&mut self, lo: usize, hi: usize) -> usize {
        let x = self.next();
        match ((hi - lo) as u64).checked_add(1) {
            Some(span) => lo + (x % span) as usize,
            // Span covers every u64, so lo is 0 and any value fits
            None => lo.wrapping_add(x as usize),
        }
    }
}

fn simulate_command(
    config: &AllocatorConfig,
    workload: &Workload,
    format: ReportFormat,
    with_metrics: bool,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        workload.min_size <= workload.max_size,
        "--min-size must not exceed --max-size"
    );
    anyhow::ensure!(
        (0.0..=1.0).contains(&workload.free_ratio),
        "--free-ratio must be between 0 and 1"
    );

    init_metrics();
    let allocator = SharedAllocator::from_config(config);
    let mut rng = XorShift::new(workload.seed);
    let mut live: Vec<(ChunkHandle, usize)> = Vec::new();
    let mut refused = 0usize;

    for _ in 0..workload.items {
        let size = rng.range(workload.min_size, workload.max_size);
        match allocator.allocate(size) {
            Ok(chunk) => live.push((chunk, size)),
            Err(e) => {
                refused += 1;
                warn!(size, error = %e, "Allocation refused");
            }
        }

        if !live.is_empty() && (rng.next() % 1000) < (workload.free_ratio * 1000.0) as u64 {
            let victim = rng.range(0, live.len() - 1);
            let (chunk, size) = live.swap_remove(victim);
            // SAFETY: chunk was allocated above with this size.
            unsafe { allocator.free(chunk, size) };
        }
    }

    info!(
        live = live.len(),
        refused,
        committed = allocator.memory_committed(),
        "Workload finished"
    );

    match format {
        ReportFormat::Text => print!("{}", allocator.report()),
        ReportFormat::Json => {
            let stats = allocator.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    if refused > 0 {
        eprintln!("{} allocations refused", refused);
    }
    if with_metrics {
        print!("{}", export_metrics());
    }
    Ok(())
}
