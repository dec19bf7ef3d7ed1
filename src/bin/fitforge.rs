//! fitforge CLI
//!
//! Commands:
//! - convert: normalize an export payload and write TCX or FIT messages
//! - inspect: print a normalized summary of an export payload

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use fitforge::encoders::fit::JsonMessageWriter;
use fitforge::{apply_time_override, Exporter, SourceShape, FORGE_VERSION};

/// fitforge - turn platform workout exports into TCX and FIT activities
#[derive(Parser)]
#[command(name = "fitforge")]
#[command(version = FORGE_VERSION)]
#[command(about = "Normalize workout exports into TCX/FIT", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize an export payload and write activity files
    Convert {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path; batches append a 1-based index before the extension
        #[arg(short, long)]
        output: PathBuf,

        /// Source shape of the input payload
        #[arg(long)]
        shape: ShapeArg,

        /// Output format
        #[arg(long, default_value = "tcx")]
        format: FormatArg,

        /// Add creator/device-info/event bracketing messages (FIT only)
        #[arg(long)]
        enhanced: bool,

        /// Override start time of day (HH:MM or HH:MM:SS)
        #[arg(long)]
        start_time: Option<String>,

        /// Drop heart rate from the output
        #[arg(long)]
        no_hr: bool,

        /// Drop cadence from the output
        #[arg(long)]
        no_cadence: bool,

        /// Drop power from the output
        #[arg(long)]
        no_power: bool,

        /// Drop distance from the output
        #[arg(long)]
        no_distance: bool,
    },

    /// Print a normalized summary of an export payload
    Inspect {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Source shape of the input payload
        #[arg(long)]
        shape: ShapeArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ShapeArg {
    Indoor,
    Outdoor,
    Detail,
}

impl From<ShapeArg> for SourceShape {
    fn from(arg: ShapeArg) -> Self {
        match arg {
            ShapeArg::Indoor => SourceShape::Indoor,
            ShapeArg::Outdoor => SourceShape::Outdoor,
            ShapeArg::Detail => SourceShape::SingleDetail,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Tcx,
    FitMessages,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Convert {
            input,
            output,
            shape,
            format,
            enhanced,
            start_time,
            no_hr,
            no_cadence,
            no_power,
            no_distance,
        } => {
            let raw = read_input(&input)?;
            let exporter = Exporter::new();
            let mut workouts = exporter.import(shape.into(), &raw)?;

            for workout in &mut workouts {
                if let Some(override_str) = &start_time {
                    apply_time_override(workout, override_str);
                }
                if no_hr {
                    workout.export_opts.include_hr = false;
                }
                if no_cadence {
                    workout.export_opts.include_cadence = false;
                }
                if no_power {
                    workout.export_opts.include_power = false;
                }
                if no_distance {
                    workout.export_opts.include_distance = false;
                }
            }

            if workouts.is_empty() {
                eprintln!("no workouts in input");
                return Ok(());
            }

            let batch = workouts.len() > 1;
            for (idx, workout) in workouts.iter().enumerate() {
                let bytes = match format {
                    FormatArg::Tcx => exporter.export_tcx(workout).into_bytes(),
                    FormatArg::FitMessages => {
                        let mut writer = JsonMessageWriter::new();
                        exporter.encode_fit(workout, enhanced, &mut writer)?
                    }
                };
                let path = if batch {
                    indexed_path(&output, idx + 1)
                } else {
                    output.clone()
                };
                write_output(&path, &bytes)?;
            }
            eprintln!("wrote {} file(s)", workouts.len());
            Ok(())
        }

        Commands::Inspect { input, shape } => {
            let raw = read_input(&input)?;
            let exporter = Exporter::new();
            let workouts = exporter.import(shape.into(), &raw)?;
            for w in &workouts {
                println!(
                    "{} [{}] {} start={} duration={}s metrics={} series={}",
                    w.id,
                    w.source.as_str(),
                    w.name,
                    w.started_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string()),
                    w.duration_or_zero(),
                    w.metrics.len(),
                    w.series_points().len(),
                );
            }
            Ok(())
        }
    }
}

fn read_input(path: &PathBuf) -> io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(path)
    }
}

fn write_output(path: &PathBuf, bytes: &[u8]) -> io::Result<()> {
    if path.as_os_str() == "-" {
        io::stdout().write_all(bytes)
    } else {
        fs::write(path, bytes)
    }
}

fn indexed_path(output: &PathBuf, index: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workout".to_string());
    let ext = output
        .extension()
        .map(|s| s.to_string_lossy().into_owned());
    let name = match ext {
        Some(ext) => format!("{stem}-{index}.{ext}"),
        None => format!("{stem}-{index}"),
    };
    output.with_file_name(name)
}
