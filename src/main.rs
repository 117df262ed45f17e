use clap::{Parser, Subcommand};
use fitzip::compress::{self, CompressError, CompressOptions};
use fitzip::config::{self, FitzipConfig};
use fitzip::{output, scan};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fitzip")]
#[command(about = "Shrink a ZIP of photos until it fits under a target size")]
#[command(long_about = "\
Shrink a ZIP of photos until it fits under a target size

Every round resizes and re-encodes all images at one ratio, packages them,
and measures the archive. The ratio is steered from the measured size until
the archive lands between 80% and 100% of the target, or the round budget
runs out and the best result so far is kept.

Input is a .zip archive or a directory:

  photos.zip
  ├── album/001-dawn.jpg       # jpg, jpeg, gif, bmp, webp → re-encoded as JPEG
  ├── album/logo.png           # png → resized, stays lossless
  ├── album/notes.txt          # ignored
  └── __MACOSX/...             # ignored, as are dot-files

Images that fail to decode or take too long are stored unchanged.

Run 'fitzip gen-config' to generate a documented fitzip.toml.")]
#[command(version)]
struct Cli {
    /// Config file [default: ./fitzip.toml if present]
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log search diagnostics to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Flags for the compress command. Each overrides the config file.
#[derive(clap::Args)]
struct CompressArgs {
    /// Input .zip archive or directory of images
    input: PathBuf,

    /// Output archive
    #[arg(short, long, default_value = "compressed_images.zip")]
    output: PathBuf,

    /// Target archive size in MB
    #[arg(long, value_name = "MB")]
    max_size: Option<f64>,

    /// Maximum number of search rounds
    #[arg(long, value_name = "N")]
    max_rounds: Option<u32>,

    /// Share of the target reserved for ZIP structure
    #[arg(long, value_name = "FRACTION")]
    overhead: Option<f64>,

    /// Per-image transform timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Print run statistics as JSON instead of the summary
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compress images into an archive under the target size
    Compress(CompressArgs),
    /// List the images an input would contribute, without compressing
    Inspect {
        /// Input .zip archive or directory of images
        input: PathBuf,
    },
    /// Print a stock fitzip.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Compress(args) => {
            let config = load_config(cli.config.as_deref(), &args)?;
            init_thread_pool(&config.processing);

            let scanned = scan::scan(&args.input)?;
            if scanned.images.is_empty() {
                return Err(CompressError::NoImages.into());
            }

            let json = args.json;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_progress_event(&event) {
                        // Keep stdout clean for the JSON document
                        if json {
                            eprintln!("{}", line);
                        } else {
                            println!("{}", line);
                        }
                    }
                }
            });
            let result = compress::compress(
                &scanned.images,
                config.target.target_bytes(),
                &CompressOptions::from_config(&config),
                Some(tx),
            );
            printer
                .join()
                .map_err(|_| "progress printer panicked")?;
            let compressed = result?;

            std::fs::write(&args.output, &compressed.bytes)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&compressed.stats)?);
            } else {
                output::print_stats(&compressed.stats, &args.output);
            }
        }
        Command::Inspect { input } => {
            let scanned = scan::scan(&input)?;
            output::print_scan_output(&scanned);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Resolve config: stock defaults → config file → command-line flags.
///
/// An explicit `--config` must exist; the implicit `./fitzip.toml` is optional.
fn load_config(
    explicit: Option<&Path>,
    args: &CompressArgs,
) -> Result<FitzipConfig, Box<dyn std::error::Error>> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(format!("config file not found: {}", path.display()).into());
        }
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(config::CONFIG_FILE_NAME),
    };

    let mut overlays: Vec<toml::Value> = config::load_raw_config(&path)?.into_iter().collect();
    if let Some(mb) = args.max_size {
        overlays.push(config::override_value("target", "max_size_mb", mb));
    }
    if let Some(rounds) = args.max_rounds {
        overlays.push(config::override_value("target", "max_rounds", i64::from(rounds)));
    }
    if let Some(fraction) = args.overhead {
        overlays.push(config::override_value("target", "overhead_fraction", fraction));
    }
    if let Some(secs) = args.timeout {
        overlays.push(config::override_value("transform", "timeout_secs", secs));
    }

    Ok(config::resolve_config(config::stock_defaults_value(), overlays)?)
}

/// Diagnostics go to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "fitzip=info",
        _ => "fitzip=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. The config can lower the count, never raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
