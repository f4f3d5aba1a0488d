mod config;
mod runner;

use std::{io::Write, path::PathBuf, process::ExitCode, time::Instant};

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;

use height_transformer::{
    ConversionType, GpshClient, Projection, ServiceConfig, SinglePointOverrides,
};

use config::AppConfig;
use runner::{CorrectionOptions, CsvToLasOptions, RunError};

#[derive(Parser, Debug)]
#[command(
    name = "lascsv",
    about = "Converts point clouds between LAS and CSV and corrects their heights through the GPS-H service",
    author = "MIERUNE Inc.",
    version
)]
struct Cli {
    /// Verbosity of the log output.
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// JSON file with service and LAS defaults.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Writes every point attribute of a LAS file to CSV
    Las2csv {
        input: PathBuf,
        output: PathBuf,
    },

    /// Writes the X/Y/Z extract uploaded to the height conversion service
    Extract {
        input: PathBuf,
        output: PathBuf,

        #[arg(long)]
        zone: String,
    },

    /// Builds a LAS file from the X/Y/Z columns of a delimited file
    Csv2las(Csv2LasArgs),

    /// Replaces the heights of a LAS file with converted ones
    Correct(CorrectArgs),

    /// Converts a single coordinate and prints the XML response
    Point(PointArgs),
}

#[derive(Args, Debug)]
struct Csv2LasArgs {
    input: PathBuf,
    output: PathBuf,

    #[arg(long, default_value_t = ' ')]
    delimiter: char,

    /// Scale of the X, Y and Z axes.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    scale: Option<Vec<f64>>,

    /// Offset of the X, Y and Z axes. Defaults to the minimum of the points.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    offset: Option<Vec<f64>>,

    /// LAS version as "major.minor".
    #[arg(long)]
    las_version: Option<String>,

    /// File creation date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long)]
    software_id: Option<String>,

    #[arg(long)]
    system_id: Option<String>,
}

#[derive(Args, Debug)]
struct CorrectArgs {
    input: PathBuf,
    output: PathBuf,

    /// Response column holding the converted heights.
    #[arg(long, default_value = "H2013")]
    height_code: String,

    /// Projection zone written to every extract row.
    #[arg(long)]
    zone: String,

    /// Keeps a copy of the uploaded extract.
    #[arg(long, value_name = "FILE")]
    keep_extract: Option<PathBuf>,

    /// Keeps a copy of the raw service response.
    #[arg(long, value_name = "FILE")]
    keep_response: Option<PathBuf>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    frame: Option<String>,

    #[arg(long)]
    epoch: Option<String>,
}

#[derive(Args, Debug)]
struct PointArgs {
    #[arg(allow_negative_numbers = true)]
    x: f64,

    #[arg(allow_negative_numbers = true)]
    y: f64,

    #[arg(allow_negative_numbers = true)]
    z: f64,

    /// batch, CGG2013a or HT2_0_CGG2013a.
    #[arg(long = "type")]
    conversion_type: Option<ConversionType>,

    /// geo or plan.
    #[arg(long)]
    projection: Option<Projection>,

    #[arg(long)]
    lang: Option<String>,

    #[arg(long)]
    conversion: Option<String>,

    #[arg(long)]
    westpos: Option<bool>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    frame: Option<String>,

    #[arg(long)]
    epoch: Option<String>,

    /// Only sent with the plan projection.
    #[arg(long)]
    zone: Option<String>,
}

impl From<PointArgs> for SinglePointOverrides {
    fn from(args: PointArgs) -> Self {
        Self {
            conversion_type: args.conversion_type,
            projection: args.projection,
            lang: args.lang,
            conversion: args.conversion,
            westpos: args.westpos,
            model: args.model,
            frame: args.frame,
            epoch: args.epoch,
            zone: args.zone,
        }
    }
}

fn to_triple(values: Vec<f64>) -> [f64; 3] {
    [values[0], values[1], values[2]]
}

fn batch_config(mut service: ServiceConfig, args: &CorrectArgs) -> ServiceConfig {
    if let Some(model) = &args.model {
        service.model = model.clone();
    }
    if let Some(frame) = &args.frame {
        service.frame = frame.clone();
    }
    if let Some(epoch) = &args.epoch {
        service.epoch = epoch.clone();
    }
    if args.keep_response.is_some() {
        service.keep_response = args.keep_response.clone();
    }
    service
}

fn run(cli: Cli) -> Result<(), RunError> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Las2csv { input, output } => {
            runner::las_to_csv(&input, &output)?;
        }
        Command::Extract {
            input,
            output,
            zone,
        } => {
            runner::las_to_extract(&input, &output, &zone)?;
        }
        Command::Csv2las(args) => {
            let las = config.las;
            let options = CsvToLasOptions {
                delimiter: args.delimiter,
                scale: args.scale.map(to_triple).unwrap_or(las.scale),
                offset: args.offset.map(to_triple),
                version: args.las_version.unwrap_or(las.version),
                date: args.date.unwrap_or_else(|| Local::now().date_naive()),
                software_id: args.software_id.unwrap_or(las.software_id),
                system_id: args.system_id.unwrap_or(las.system_id),
            };
            runner::csv_to_las(&args.input, &args.output, &options)?;
        }
        Command::Correct(args) => {
            let client = GpshClient::new(batch_config(config.service, &args))?;
            let options = CorrectionOptions {
                height_code: args.height_code,
                zone: args.zone,
                keep_extract: args.keep_extract,
            };
            runner::correct_heights(&args.input, &args.output, &client, &options)?;
        }
        Command::Point(args) => {
            let client = GpshClient::new(config.service)?;
            let (x, y, z) = (args.x, args.y, args.z);
            let xml = runner::single_point(&client, x, y, z, &args.into())?;
            println!("{}", xml);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, cli.log_level)
        .init();

    let start = Instant::now();
    match run(cli) {
        Ok(()) => {
            log::info!("Elapsed: {:?}", start.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
