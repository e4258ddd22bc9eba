//! geodiff CLI - change detection between two co-registered rasters

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geodiff_algorithms::imagery::DegeneratePolicy;
use geodiff_algorithms::morphology::{CleanParams, Connectivity};
use geodiff_algorithms::pipeline::{
    detect_changes, load_pair, write_outputs, ChangeDetectionParams, OutputPaths,
};
use geodiff_core::io::read_geotiff;
use geodiff_core::{Error, ErrorKind, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geodiff")]
#[command(author, version, about = "Raster change detection with automatic thresholding", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Detect changes between a before and an after raster
    Detect {
        /// Raster of the earlier date
        before: PathBuf,
        /// Raster of the later date
        after: PathBuf,
        /// Directory receiving changes_mask.tif and changes_polygons.geojson
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Changed regions with fewer pixels are discarded
        #[arg(long, default_value = "500", allow_negative_numbers = true)]
        min_object_size: i64,
        /// Enclosed unchanged regions with fewer pixels are filled
        #[arg(long, default_value = "250", allow_negative_numbers = true)]
        hole_area_threshold: i64,
        /// Pixel connectivity: four, eight
        #[arg(short, long, default_value = "four")]
        connectivity: String,
        /// Identical inputs: zero-fill (report no change) or fail
        #[arg(long, default_value = "zero-fill")]
        on_degenerate: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path).context("Failed to read raster")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn invalid(name: &'static str, value: &str, reason: &str) -> anyhow::Error {
    Error::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn parse_connectivity(s: &str) -> Result<Connectivity> {
    match s.to_lowercase().as_str() {
        "four" | "4" | "rook" => Ok(Connectivity::Four),
        "eight" | "8" | "queen" => Ok(Connectivity::Eight),
        _ => Err(invalid("connectivity", s, "use: four, eight")),
    }
}

fn parse_degenerate_policy(s: &str) -> Result<DegeneratePolicy> {
    match s.to_lowercase().as_str() {
        "zero-fill" | "zero_fill" | "zero" | "no-change" => Ok(DegeneratePolicy::ZeroFill),
        "fail" | "error" => Ok(DegeneratePolicy::Fail),
        _ => Err(invalid("on_degenerate", s, "use: zero-fill, fail")),
    }
}

/// Process exit status for a failed run, keyed on the underlying error kind
fn exit_code(err: &anyhow::Error) -> u8 {
    let kind = err
        .chain()
        .find_map(|e| e.downcast_ref::<Error>())
        .map(Error::kind);

    match kind {
        Some(ErrorKind::InputNotFound) => 2,
        Some(ErrorKind::GeometryMismatch) => 3,
        Some(ErrorKind::DegenerateInput) => 4,
        Some(ErrorKind::InvalidParameter) => 5,
        Some(ErrorKind::OutputWrite) => 6,
        _ => 1,
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn info_command(input: &Path) -> Result<()> {
    let raster = read_raster(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    match raster.crs() {
        Some(crs) => println!("CRS: {}", crs),
        None => println!("CRS: none"),
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    if !raster.is_empty() {
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid_count,
            100.0 * stats.valid_count as f64 / raster.len() as f64
        );
    }
    Ok(())
}

fn detect_command(
    before: &Path,
    after: &Path,
    output_dir: &Path,
    params: &ChangeDetectionParams,
) -> Result<()> {
    let start = Instant::now();

    std::fs::create_dir_all(output_dir)
        .map_err(|e| Error::output_write(output_dir, Error::Io(e)))
        .context("Failed to create output directory")?;

    let pb = spinner("Reading rasters...");
    let pair = load_pair(before, after).context("Failed to load input pair")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", pair.metadata.cols, pair.metadata.rows);

    let detection = detect_changes(&pair.before, &pair.after, params)
        .context("Change detection failed")?;

    for existing in OutputPaths::in_dir(output_dir).existing() {
        warn!("Overwriting {}", existing.display());
    }

    let pb = spinner("Writing outputs...");
    let paths = write_outputs(&detection, output_dir).context("Failed to write outputs")?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    println!(
        "Threshold automatically determined: {}",
        detection.threshold.threshold
    );
    println!(
        "Changed pixels: {} of {} ({} region(s))",
        detection.stats.changed_pixels, detection.stats.total_pixels, detection.stats.region_count
    );
    done("Change mask", &paths.mask, elapsed);
    done("Change polygons", &paths.polygons, elapsed);
    Ok(())
}

fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Info { input } => info_command(&input),
        Commands::Detect {
            before,
            after,
            output_dir,
            min_object_size,
            hole_area_threshold,
            connectivity,
            on_degenerate,
        } => {
            let params = ChangeDetectionParams {
                clean: CleanParams::try_new(
                    min_object_size,
                    hole_area_threshold,
                    parse_connectivity(&connectivity)?,
                )?,
                degenerate_policy: parse_degenerate_policy(&on_degenerate)?,
            };
            detect_command(&before, &after, &output_dir, &params)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = setup_logging(cli.verbose) {
        eprintln!("Warning: {:#}", e);
    }

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connectivity() {
        assert_eq!(parse_connectivity("four").unwrap(), Connectivity::Four);
        assert_eq!(parse_connectivity("EIGHT").unwrap(), Connectivity::Eight);
        assert_eq!(parse_connectivity("8").unwrap(), Connectivity::Eight);
        let err = parse_connectivity("six").unwrap_err();
        assert_eq!(exit_code(&err), 5);
    }

    #[test]
    fn test_parse_degenerate_policy() {
        assert_eq!(parse_degenerate_policy("zero-fill").unwrap(), DegeneratePolicy::ZeroFill);
        assert_eq!(parse_degenerate_policy("fail").unwrap(), DegeneratePolicy::Fail);
        assert!(parse_degenerate_policy("ignore").is_err());
    }

    #[test]
    fn test_exit_codes_through_context() {
        let err = anyhow::Error::from(Error::InputNotFound(PathBuf::from("missing.tif")))
            .context("Failed to load input pair");
        assert_eq!(exit_code(&err), 2);

        let err = anyhow::Error::from(Error::InputUnreadable {
            path: PathBuf::from("before.tif"),
            reason: "not a TIFF".into(),
        })
        .context("Failed to load input pair");
        assert_eq!(exit_code(&err), 2);

        let err = anyhow::Error::from(Error::CrsMismatch("a".into(), "b".into()));
        assert_eq!(exit_code(&err), 3);

        let err = anyhow::Error::from(Error::DegenerateInput("flat".into()));
        assert_eq!(exit_code(&err), 4);

        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn test_negative_sizes_rejected() {
        let err: anyhow::Error = CleanParams::try_new(-1, 250, Connectivity::Four)
            .unwrap_err()
            .into();
        assert_eq!(exit_code(&err), 5);
    }

    #[test]
    fn test_cli_parses_detect() {
        let cli = Cli::try_parse_from([
            "geodiff", "detect", "a.tif", "b.tif", "-o", "out",
            "--min-object-size", "-3", "--connectivity", "eight",
        ])
        .unwrap();
        match cli.command {
            Commands::Detect { min_object_size, connectivity, hole_area_threshold, .. } => {
                assert_eq!(min_object_size, -3);
                assert_eq!(connectivity, "eight");
                assert_eq!(hole_area_threshold, 250);
            }
            _ => panic!("expected detect"),
        }
    }
}
