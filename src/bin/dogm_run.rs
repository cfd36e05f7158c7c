use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use dogm::config::AppConfig;
use dogm::io::{CsvGridWriter, FrameLoader};
use dogm::{Dogm, DogmError};

/// Batch-runs the Dynamic Occupancy Grid Map filter over a recorded sensor log.
#[derive(Debug, Parser)]
#[command(name = "dogm-run", version, about)]
struct Args {
    /// Input CSV of interleaved odom/lidar/radar rows.
    #[arg(long)]
    input: PathBuf,

    /// Output CSV of per-cell occupancy/velocity snapshots.
    #[arg(long)]
    output: PathBuf,

    /// Optional TOML config overriding the filter's default parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time step between consecutive frames, in seconds.
    #[arg(long, default_value_t = 0.1)]
    dt: f32,
}

fn main() -> ExitCode {
    dogm::logging::init_logging();
    let args = Args::parse();

    match run(&args) {
        Ok(frame_count) => {
            info!("processed {frame_count} frames");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            eprintln!("dogm-run: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<usize, DogmError> {
    let params = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            AppConfig::from_toml_str(&text)?.into_params()?
        }
        None => AppConfig::default().into_params()?,
    };

    let mut loader = FrameLoader::from_path(&args.input)?;
    let mut dogm = Dogm::new(params)?;
    let mut writer = CsvGridWriter::create(&args.output)?;

    let mut frame_count = 0;
    while let Some(frame) = loader.next_frame() {
        dogm.update(&frame, args.dt);
        writer.write_frame(frame.timestamp, dogm.grid_cells(), dogm.grid_size())?;
        frame_count += 1;
    }
    writer.flush()?;

    Ok(frame_count)
}
