use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use crossbeam_channel::bounded;
use indicatif::{ProgressBar, ProgressStyle};

use cartage::common::DEFAULT_BUFFER_SIZE;
use cartage::offload::{format_bytes, list_volumes};
use cartage::{
    logging, Config, HashAlgorithm, Job, JobStatus, JobUpdate, MetadataMode, Offloader, Queue,
};

#[derive(Parser)]
#[command(
    name = "cartage",
    version,
    about = "Professional media offload - verified fan-out copy with MHL and PDF reports",
    disable_version_flag = true
)]
struct Cli {
    /// Source directory or file (camera card root)
    source: Option<PathBuf>,

    /// Destination directory
    dest: Option<PathBuf>,

    /// Source (flag form)
    #[arg(short = 's', long = "source", value_name = "PATH")]
    source_flag: Option<PathBuf>,

    /// Destination; repeat for fan-out to multiple destinations
    #[arg(short = 'd', long = "dest", value_name = "PATH")]
    dest_flags: Vec<PathBuf>,

    /// Hash algorithm
    #[arg(long, value_enum, default_value_t = HashAlgorithm::Xxhash64)]
    algorithm: HashAlgorithm,

    /// Use MD5 (wins over --algorithm)
    #[arg(long)]
    md5: bool,

    /// Use SHA-256 (wins over --algorithm)
    #[arg(long)]
    sha256: bool,

    /// Use xxHash64 (wins over --algorithm)
    #[arg(long)]
    xxhash64: bool,

    /// Record both xxHash64 and MD5 in one pass
    #[arg(long)]
    dual_hash: bool,

    /// Skip verification after copy
    #[arg(long)]
    no_verify: bool,

    /// Copy buffer size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Number of parallel file copies
    #[arg(short = 'c', long, default_value_t = 4)]
    concurrency: usize,

    /// Skip files that already exist at the destination (alias: --resume)
    #[arg(long, alias = "resume")]
    skip_existing: bool,

    /// Simulate the offload without copying
    #[arg(long)]
    dry_run: bool,

    /// Emit the job result as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Suppress all output except errors
    #[arg(long)]
    quiet: bool,

    /// Verbose logging
    #[arg(long)]
    verbose: bool,

    /// Metadata extraction mode
    #[arg(long, value_enum, default_value_t = MetadataMode::Hybrid)]
    metadata_mode: MetadataMode,

    /// Job name for report metadata
    #[arg(long, default_value = "")]
    job_name: String,

    /// Camera identifier (e.g. 'A', 'B')
    #[arg(long, default_value = "")]
    camera: String,

    /// Reel identifier (e.g. '001', 'A002')
    #[arg(long, default_value = "")]
    reel: String,

    /// List mounted volumes and exit
    #[arg(long)]
    volumes: bool,

    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,
}

impl Cli {
    fn algorithm(&self) -> HashAlgorithm {
        // Convenience booleans win over --algorithm
        if self.md5 {
            HashAlgorithm::Md5
        } else if self.sha256 {
            HashAlgorithm::Sha256
        } else if self.xxhash64 {
            HashAlgorithm::Xxhash64
        } else {
            self.algorithm
        }
    }

    fn into_config(self) -> Result<Config, String> {
        let algorithm = self.algorithm();
        let source = self
            .source_flag
            .or(self.source)
            .ok_or("source is required (positional or --source)")?;
        let destinations = if !self.dest_flags.is_empty() {
            self.dest_flags
        } else if let Some(dest) = self.dest {
            vec![dest]
        } else {
            return Err("destination is required (positional or --dest)".into());
        };

        Ok(Config {
            source,
            destinations,
            algorithm,
            dual_hash: self.dual_hash,
            no_verify: self.no_verify,
            skip_existing: self.skip_existing,
            buffer_size: self.buffer_size,
            concurrency: self.concurrency,
            metadata_mode: self.metadata_mode,
            dry_run: self.dry_run,
            job_name: self.job_name,
            camera: self.camera,
            reel: self.reel,
            json_output: self.json,
            quiet: self.quiet,
            verbose: self.verbose,
        })
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version are not errors
            use clap::error::ErrorKind;
            let kind = err.kind();
            let _ = err.print();
            return if matches!(kind, ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };
    logging::init(cli.verbose, cli.quiet);

    if cli.volumes {
        print_volumes();
        return ExitCode::SUCCESS;
    }

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = config.validate() {
        eprintln!("Error: {}", err);
        return ExitCode::FAILURE;
    }

    if config.dry_run {
        return run_dry(config);
    }
    run_offload(config)
}

fn print_volumes() {
    println!("{:<28} {:>10} {:>10} {:>10}  Path", "Volume", "Total", "Free", "Used");
    for vol in list_volumes() {
        println!(
            "{:<28} {:>10} {:>10} {:>10}  {}",
            vol.name,
            format_bytes(vol.total),
            format_bytes(vol.free),
            format_bytes(vol.used),
            vol.path.display()
        );
    }
}

fn run_dry(config: Config) -> ExitCode {
    let offloader = Offloader::new(config.clone());
    let report = match offloader.dry_run() {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Error during dry run: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if config.json_output {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("Error: {}", err);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("=== DRY RUN SUMMARY ===");
    println!("Source: {}", report.source.display());
    println!("Files found: {}", report.files.len());
    println!("Total size: {}", format_bytes(report.total_size));
    println!("\nDestinations:");
    for dest in &report.destinations {
        println!("  - {}", dest.path.display());
        println!("    Free space: {}", format_bytes(dest.free_space));
        println!(
            "    Status: {}",
            if dest.can_fit { "OK" } else { "INSUFFICIENT SPACE" }
        );
    }
    ExitCode::SUCCESS
}

fn run_offload(config: Config) -> ExitCode {
    let json = config.json_output;
    let quiet = config.quiet;

    let queue = Queue::new();
    let job = Job::new(config);
    let job_id = job.id.clone();
    queue.add(job.clone());

    let (update_tx, update_rx) = bounded::<JobUpdate>(1024);
    queue.start(update_tx);

    let bar = if json || quiet {
        None
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} {bytes_per_sec} | {msg}",
            )
            .expect("valid progress template"),
        );
        Some(bar)
    };

    for update in update_rx.iter() {
        if update.job_id != job_id {
            continue;
        }
        if let Some(bar) = &bar {
            if let Some(progress) = &update.progress {
                bar.set_length(progress.total_bytes.max(1));
                bar.set_position(progress.copied_bytes);
            }
            bar.set_message(update.message.clone());
        }
        if update.finished {
            break;
        }
    }
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    queue.stop();

    let Some(result) = job.result() else {
        eprintln!("Error: job produced no result");
        return ExitCode::FAILURE;
    };

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(out) => println!("{}", out),
            Err(err) => {
                eprintln!("Error: {}", err);
                return ExitCode::FAILURE;
            }
        }
    } else if !quiet {
        println!();
        println!("Source: {}", result.source.display());
        println!("Destinations:");
        for dest in &result.destinations {
            println!("  - {}", dest.display());
        }
        println!();
        if job.status() == JobStatus::Completed {
            println!("Verification successful!");
            println!(
                "Processed {} files ({}) in {}",
                result.total_files,
                format_bytes(result.total_bytes),
                result.duration
            );
            println!("Average speed: {:.2} MB/s", result.speed_mbps);
        } else {
            println!("Job {}: {}", job.status(), result.error);
        }
    }

    if job.status() == JobStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
