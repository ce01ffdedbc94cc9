use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use memmap2::Mmap;
use strata_core::{ChunkPipeline, EncodeStats, EncoderOptions, ParallelEncoder, CHUNK_SIZE};

#[derive(Parser)]
#[command(
    name = "strata",
    version,
    about = "Chunked parallel compression harness",
    long_about = "Compresses a file with the strata two-stage pipeline \
                  (optional error-bounded quantization, then bit-packing)."
)]
struct Cli {
    /// Source file to compress.
    input: PathBuf,

    /// Destination file for the compressed stream.
    output: PathBuf,

    /// Pass `y` to print a performance analysis after compressing.
    #[arg(value_parser = parse_performance_flag)]
    performance: Option<bool>,

    /// Absolute error bound; enables the lossy f32 quantization stage.
    #[arg(long)]
    error_bound: Option<f32>,

    /// Number of worker threads (defaults to CPU count).
    #[arg(long, default_value_t = num_cpus::get())]
    workers: usize,
}

fn parse_performance_flag(value: &str) -> Result<bool, String> {
    if value == "y" {
        Ok(true)
    } else {
        Err(format!("invalid argument '{value}': use 'y' or nothing"))
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.error_bound {
        Some(bound) => println!("strata pipeline: quantize ({bound}) -> bitpack"),
        None => println!("strata pipeline: bitpack"),
    }

    let input_file = open_input(&cli.input)?;
    // SAFETY: the mapping is read-only and lives only for this call;
    // concurrent truncation of the input is outside our contract.
    let input = unsafe { Mmap::map(&input_file)? };
    println!("original size: {} bytes", input.len());

    let pipeline = match cli.error_bound {
        Some(bound) => ChunkPipeline::quantizing(bound)?,
        None => ChunkPipeline::bit_packing(),
    };
    let encoder = ParallelEncoder::with_options(
        pipeline,
        EncoderOptions {
            workers: cli.workers.max(1),
        },
    );

    let (stream, stats) = encoder.encode(&input)?;
    fs::write(&cli.output, &stream)?;

    println!("compressed size: {} bytes", stats.output_bytes);
    println!("ratio: {:.3}x", stats.ratio());

    if cli.performance.unwrap_or(false) {
        print_performance(&stats);
    }

    Ok(())
}

/// Opens the input and rejects empty files up front; mapping a
/// zero-length file fails with an unhelpful OS error otherwise.
fn open_input(path: &Path) -> Result<File, String> {
    let file = File::open(path)
        .map_err(|error| format!("cannot open {}: {error}", path.display()))?;
    let metadata = file
        .metadata()
        .map_err(|error| format!("cannot stat {}: {error}", path.display()))?;
    if metadata.len() == 0 {
        return Err(format!("input file {} is empty", path.display()));
    }
    Ok(file)
}

fn print_performance(stats: &EncodeStats) {
    let elapsed_secs = stats.elapsed.as_secs_f64().max(1e-9);
    let throughput = stats.input_bytes as f64 / elapsed_secs;

    println!("performance analysis");
    println!("  elapsed: {}", format_duration(stats.elapsed));
    println!("  throughput: {}/s", format_bytes(throughput as u64));
    println!(
        "  chunks: {} total ({} packed, {} raw, {} bytes each)",
        stats.chunks_total, stats.chunks_packed, stats.chunks_raw, CHUNK_SIZE
    );

    let max_tasks = stats.worker_tasks.iter().copied().max().unwrap_or(0);
    let min_tasks = stats.worker_tasks.iter().copied().min().unwrap_or(0);
    println!(
        "  scheduler: {} workers | task balance min/max {min_tasks}/{max_tasks}",
        stats.worker_tasks.len()
    );
    for (worker_id, tasks) in stats.worker_tasks.iter().enumerate() {
        println!("    w{worker_id:02} chunks {tasks:>6}");
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let millis = duration.subsec_millis();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;

    if minutes > 0 {
        format!("{minutes:02}:{seconds:02}")
    } else {
        format!("{seconds}.{millis:03}s")
    }
}
