//! blue-carbon - carbon credit estimation for restoration site photographs
//!
//! Usage: blue-carbon <COMMAND>
//!
//! Commands:
//!   credits    Calculate credits from a before/after photo pair
//!   analyze    Analyse a single photo
//!   frames     Aggregate a sequence of photos of the same site
//!   greenness  Compare the green-pixel share of two photos
//!   estimate   Image-free CO2 estimate at standard restoration rates
//!   legacy     Fixed award of the legacy scheme
//!   config     Write the default configuration to a file

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blue_carbon_credits::carbon::sequestration::default_carbon_credits;
use blue_carbon_credits::image_loader::{is_supported_extension, load_image_bytes};
use blue_carbon_credits::{
    legacy_credits, AnalysisError, Co2Calculator, DynamicCreditCalculator, EcosystemType,
    GreennessAnalyzer, ImageAnalyzer, PipelineConfig, ProjectMetadata, Result, TemporalAnalyzer,
};
use clap::{Parser, Subcommand};
use log::error;
use serde::Serialize;

/// Carbon credit estimation for blue-carbon restoration projects
#[derive(Parser, Debug)]
#[command(name = "blue-carbon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration (JSON); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Calculate credits from a before/after photo pair
    Credits {
        /// Photo taken before restoration
        before: PathBuf,

        /// Photo taken after restoration
        after: PathBuf,

        /// Project area in hectares
        #[arg(long)]
        area: f64,

        /// Years between the two photos
        #[arg(long, default_value_t = 1.0)]
        years: f64,

        /// Declared ecosystem (e.g. mangrove, salt_marsh)
        #[arg(long)]
        ecosystem: Option<String>,
    },

    /// Analyse a single photo
    Analyze {
        image: PathBuf,
    },

    /// Aggregate a sequence of photos of the same site
    Frames {
        /// Photos in capture order
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Compare the green-pixel share of two photos
    Greenness {
        before: PathBuf,
        after: PathBuf,
    },

    /// Image-free CO2 estimate at standard restoration rates
    Estimate {
        /// Ecosystem type (mangrove, seagrass, salt_marsh, coastal_wetland, ...)
        #[arg(long)]
        ecosystem: EcosystemType,

        /// Project area in hectares
        #[arg(long)]
        area: f64,

        /// Period in years
        #[arg(long, default_value_t = 1.0)]
        years: f64,

        /// Expected impact, clamped to 0.5-1.5
        #[arg(long, default_value_t = 1.0)]
        factor: f64,
    },

    /// Fixed award of the legacy scheme
    Legacy {
        /// Project area in hectares
        #[arg(long)]
        area: f64,
    },

    /// Write the default configuration to a file
    Config {
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct Estimate {
    ecosystem_type: EcosystemType,
    co2_sequestration_kg: f64,
    carbon_credits: f64,
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Credits {
            before,
            after,
            area,
            years,
            ecosystem,
        } => {
            let calculator = DynamicCreditCalculator::with_config(config)?;
            let metadata = ecosystem.map(ProjectMetadata::with_ecosystem);
            let result = calculator.calculate(
                &read(&before)?,
                &read(&after)?,
                area,
                years,
                metadata.as_ref(),
            )?;
            print_json(&result)
        }
        Commands::Analyze { image } => {
            config.validate()?;
            let analysis = ImageAnalyzer::with_config(config).analyze_bytes(&read(&image)?, &label(&image))?;
            print_json(&analysis)
        }
        Commands::Frames { images } => {
            config.validate()?;
            let frames = images
                .iter()
                .map(|path| -> Result<_> { Ok(load_image_bytes(&read(path)?, &config.image)?.pixels) })
                .collect::<Result<Vec<_>>>()?;
            let site = images.first().map(|p| label(p)).unwrap_or_default();
            let summary = TemporalAnalyzer::with_analyzer(ImageAnalyzer::with_config(config))
                .analyze_frames(&site, &frames)?;
            print_json(&summary)
        }
        Commands::Greenness { before, after } => {
            let progress =
                GreennessAnalyzer::new().progress_from_bytes(&read(&before)?, &read(&after)?)?;
            print_json(&progress)
        }
        Commands::Estimate {
            ecosystem,
            area,
            years,
            factor,
        } => {
            config.validate()?;
            let co2 = Co2Calculator::with_config(config.sequestration)
                .basic_sequestration(ecosystem, area, years, factor)?;
            print_json(&Estimate {
                ecosystem_type: ecosystem,
                co2_sequestration_kg: co2,
                carbon_credits: default_carbon_credits(co2).carbon_credits,
            })
        }
        Commands::Legacy { area } => print_json(&legacy_credits(area)),
        Commands::Config { output } => {
            config.to_json_file(&output)?;
            println!("Configuration written to {}", output.display());
            Ok(())
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if !is_supported_extension(ext) {
            return Err(AnalysisError::invalid_parameter("image", path.display()));
        }
    }
    std::fs::read(path)
        .map_err(|e| AnalysisError::image_load(format!("Failed to read {}", path.display()), e))
}

fn label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AnalysisError::config("Failed to serialize output", e))?;
    println!("{}", json);
    Ok(())
}
