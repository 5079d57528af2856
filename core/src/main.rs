//! CPI: preintegrate a window of a recorded IMU log and print the summary.
//!
//! The summary (relative rotation and quaternion, velocity/position increments, bias Jacobians
//! and the 15×15 error-state covariance) is written as JSON to stdout or to `--output`.

use std::error::Error;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::{LevelFilter, error, info};

use cpi::config::{NoiseConfig, PreintegrationConfig};
use cpi::noise::IMUQuality;
use cpi::replay::{ImuRecord, preintegrate_records};
use cpi::Preintegrator;

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Closed-form preintegration of recorded IMU samples.")]
struct Cli {
    /// IMU log (CSV: time,gyro_x,gyro_y,gyro_z,accel_x,accel_y,accel_z)
    #[arg(short, long, value_parser)]
    input: PathBuf,

    /// Configuration file (JSON/YAML/TOML). Overrides --quality, --average and the bias flags
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Window start time in seconds (defaults to the first sample)
    #[arg(long)]
    start: Option<f64>,

    /// Window end time in seconds (defaults to the last sample)
    #[arg(long)]
    end: Option<f64>,

    /// Sensor grade used for the noise model
    #[arg(long, value_enum, default_value_t = IMUQuality::Consumer)]
    quality: IMUQuality,

    /// Average the start and end sample of each step
    #[arg(long)]
    average: bool,

    /// Gyroscope bias linearization point in rad/s
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    gyro_bias: Option<Vec<f64>>,

    /// Accelerometer bias linearization point in m/s^2
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    accel_bias: Option<Vec<f64>>,

    /// Output file for the JSON summary (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Route `log` records to stderr, or append them to `log_file`, with a millisecond timestamp
/// and the emitting module.
///
/// # Errors
/// Returns an error if the log file cannot be opened or a logger is already installed.
fn init_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    use std::fs::{OpenOptions, create_dir_all};

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.module_path().unwrap_or("cpi"),
            record.args()
        )
    });

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

fn bias_from_args(values: &Option<Vec<f64>>) -> [f64; 3] {
    match values.as_deref() {
        Some([x, y, z]) => [*x, *y, *z],
        _ => [0.0; 3],
    }
}

fn resolve_config(cli: &Cli) -> Result<PreintegrationConfig, Box<dyn Error>> {
    if let Some(ref path) = cli.config {
        info!("Loading configuration from {}", path.display());
        return Ok(PreintegrationConfig::from_file(path)?);
    }
    let config = PreintegrationConfig {
        gyro_bias: bias_from_args(&cli.gyro_bias),
        accel_bias: bias_from_args(&cli.accel_bias),
        average_samples: cli.average,
        noise: NoiseConfig::Preset(cli.quality),
    };
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(cli)?;
    let records = ImuRecord::from_csv(&cli.input)?;
    info!("Read {} IMU samples from {}", records.len(), cli.input.display());

    let start = cli
        .start
        .or_else(|| records.first().map(|r| r.time))
        .unwrap_or(0.0);
    let end = cli
        .end
        .or_else(|| records.last().map(|r| r.time))
        .unwrap_or(0.0);

    let mut preintegrator = Preintegrator::from_config(&config)?;
    preintegrate_records(&mut preintegrator, &records, start, end)?;
    let summary = preintegrator.summary();

    match cli.output {
        Some(ref path) => {
            serde_json::to_writer_pretty(File::create(path)?, &summary)?;
            info!("Summary written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, &summary)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(cli.log_level, cli.log_file.as_deref())?;
    // failures go through the logger so they also land in --log-file
    if let Err(e) = run(&cli) {
        error!("Preintegration failed: {}", e);
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cpi_main_{}_{}", process::id(), name))
    }

    #[test]
    fn cli_parses_levels_and_biases() {
        let cli = Cli::try_parse_from([
            "cpi",
            "--input",
            "imu.csv",
            "--log-level",
            "debug",
            "--gyro-bias",
            "0.1",
            "-0.2",
            "0.3",
            "--quality",
            "navigation",
        ])
        .unwrap();
        assert_eq!(cli.log_level, LevelFilter::Debug);
        assert_eq!(bias_from_args(&cli.gyro_bias), [0.1, -0.2, 0.3]);
        assert_eq!(bias_from_args(&cli.accel_bias), [0.0; 3]);

        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.gyro_bias, [0.1, -0.2, 0.3]);
        assert_eq!(config.noise, NoiseConfig::Preset(IMUQuality::Navigation));
        assert!(!config.average_samples);
    }

    #[test]
    fn cli_rejects_unknown_log_level() {
        let result = Cli::try_parse_from(["cpi", "--input", "imu.csv", "--log-level", "loud"]);
        assert!(result.is_err());
    }

    #[test]
    fn run_reports_missing_input() {
        let cli = Cli::try_parse_from([
            "cpi",
            "--input",
            temp_path("missing.csv").to_str().unwrap(),
        ])
        .unwrap();
        assert!(run(&cli).is_err());
    }

    #[test]
    fn run_writes_summary_and_log_file() {
        let input = temp_path("imu.csv");
        let output = temp_path("summary.json");
        let log_file = temp_path("logs/cpi.log");
        let gyro = nalgebra::Vector3::new(0.0, 0.0, 0.2);
        let accel = nalgebra::Vector3::new(0.0, 0.0, 9.81);
        let records: Vec<ImuRecord> = (0..5)
            .map(|k| ImuRecord::new(k as f64 * 0.01, &gyro, &accel))
            .collect();
        ImuRecord::to_csv(&records, &input).unwrap();

        init_logger(LevelFilter::Info, Some(log_file.as_path())).unwrap();
        let cli = Cli::try_parse_from([
            "cpi",
            "--input",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(&cli).unwrap();

        let summary: cpi::PreintegratedSummary =
            serde_json::from_reader(File::open(&output).unwrap()).unwrap();
        assert!((summary.elapsed_time - 0.04).abs() < 1e-12);
        let logged = std::fs::read_to_string(&log_file).unwrap();
        assert!(logged.contains("[INFO]"));
        assert!(logged.contains("Summary written to"));

        for path in [&input, &output, &log_file] {
            std::fs::remove_file(path).ok();
        }
    }
}
