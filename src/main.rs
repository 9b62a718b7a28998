use clap::{Parser, Subcommand};
use imgpost::cancel::CancelToken;
use imgpost::capture::CapturedImage;
use imgpost::config::{self, Config};
use imgpost::imaging::{ImageFormat, Rotation};
use imgpost::output;
use imgpost::persist::resolve_target;
use imgpost::pipeline::{Pipeline, SaveOutcome, UploadOutcome};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Flags shared by the commands that encode an image.
#[derive(clap::Args, Clone)]
struct EncodeArgs {
    /// Image file to process
    image: PathBuf,

    /// Requested save path; only its directory is used [default: IMAGE]
    #[arg(long)]
    target: Option<PathBuf>,

    /// Output format: jpeg, webp or png (unknown names mean png)
    #[arg(long)]
    format: Option<String>,

    /// Extra clockwise rotation in degrees: 0, 90, 180 or 270
    #[arg(long, value_parser = parse_rotation)]
    rotate: Option<Rotation>,
}

#[derive(Parser)]
#[command(name = "imgpost")]
#[command(version)]
#[command(about = "Rotate, encode, store and upload an image")]
#[command(long_about = "\
Rotate, encode, store and upload an image

Every save goes to the same place, next to the requested target:

  <target dir>/
  └── cache/
      └── IMG.jpeg      # replaced atomically on every save

The stored file is then POSTed as multipart/form-data to [upload] url.

Run 'imgpost gen-config' to generate a documented imgpost.toml.")]
struct Cli {
    /// Config file; missing means stock defaults
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log at debug level (RUST_LOG is ignored)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save an image and upload it: orient → encode → store → POST
    Send {
        #[command(flatten)]
        encode: EncodeArgs,

        /// Upload endpoint, overriding [upload] url
        #[arg(long)]
        url: Option<String>,

        /// Print the run as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save an image without uploading it
    Save(EncodeArgs),
    /// Upload an existing file
    Upload {
        file: PathBuf,

        /// Upload endpoint, overriding [upload] url
        #[arg(long)]
        url: Option<String>,
    },
    /// Validate the config file and print the effective settings
    Check,
    /// Print a stock imgpost.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Send { encode, url, json } => {
            let config = configure(&cli.config, Some(&encode), url)?;
            let pipeline = Pipeline::from_config(config)?;
            let image = CapturedImage::open(&encode.image, Rotation::Deg0)?;
            let report = pipeline.run(
                image,
                requested_path(&encode),
                requested_format(&encode),
                &CancelToken::new(),
            );
            if json {
                let summary = output::RunSummary::from_report(&report);
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                output::print_report(&report, pipeline.config());
            }
            Ok(exit_code(report.saved()))
        }
        Command::Save(encode) => {
            let config = configure(&cli.config, Some(&encode), None)?;
            let pipeline = Pipeline::from_config(config)?;
            let image = CapturedImage::open(&encode.image, Rotation::Deg0)?;
            let requested = requested_path(&encode);
            let save = pipeline.save(
                image,
                requested,
                requested_format(&encode),
                &CancelToken::new(),
            );
            let target = resolve_target(requested, &pipeline.config().storage);
            output::print_save(&target, &save);
            Ok(exit_code(matches!(save, SaveOutcome::Saved(_))))
        }
        Command::Upload { file, url } => {
            let config = configure(&cli.config, None, url)?;
            let pipeline = Pipeline::from_config(config)?;
            let upload = pipeline.upload(&file, &CancelToken::new());
            output::print_upload(&upload, pipeline.config());
            Ok(exit_code(matches!(upload, UploadOutcome::Uploaded(_))))
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let config = config::load_config(&cli.config)?;
            output::print_config(&config);
            println!("==> Config is valid");
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Log to stderr so stdout stays clean for `--json`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file and apply command-line overrides on top.
fn configure(
    path: &Path,
    encode: Option<&EncodeArgs>,
    url: Option<String>,
) -> Result<Config, config::ConfigError> {
    let mut config = config::load_config(path)?;
    if let Some(rotation) = encode.and_then(|e| e.rotate) {
        config.encoding.rotation = rotation;
    }
    if url.is_some() {
        config.upload.url = url;
    }
    config.validate()?;
    Ok(config)
}

fn requested_path(encode: &EncodeArgs) -> &Path {
    encode.target.as_deref().unwrap_or(encode.image.as_path())
}

fn requested_format(encode: &EncodeArgs) -> Option<ImageFormat> {
    encode.format.as_deref().map(ImageFormat::from_name)
}

fn parse_rotation(s: &str) -> Result<Rotation, String> {
    let degrees: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a number of degrees"))?;
    Rotation::try_from(degrees)
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
