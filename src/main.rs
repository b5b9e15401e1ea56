use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use covid_chart::{run, Orientation, PipelineConfig, ValueColumn, Variant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plot COVID-19 confirmed cases by country", long_about = None)]
struct Cli {
    /// Dataset preset
    #[arg(long, value_enum, default_value_t = Variant::TimeSeries)]
    variant: Variant,

    /// http(s):// or file:// source overriding the preset URL
    #[arg(long)]
    source: Option<String>,

    /// Column to sum, or `latest` for the last column
    #[arg(long)]
    value_column: Option<ValueColumn>,

    /// Number of countries to plot, 0 for all
    #[arg(long)]
    top: Option<usize>,

    #[arg(long)]
    output: Option<PathBuf>,

    /// vertical or horizontal
    #[arg(long)]
    orientation: Option<Orientation>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Exit with status 1 when the pipeline fails
    #[arg(long)]
    fail_on_error: bool,
}

impl Cli {
    fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::from_variant(self.variant);
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(value_column) = self.value_column {
            config.value_column = value_column;
        }
        if let Some(top) = self.top {
            config.chart.top_n = (top > 0).then_some(top);
        }
        if let Some(output) = self.output {
            config.chart.output = output;
        }
        if let Some(orientation) = self.orientation {
            config.chart.orientation = orientation;
        }
        if let Some(width) = self.width {
            config.chart.width = width;
        }
        if let Some(height) = self.height {
            config.chart.height = height;
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let fail_on_error = cli.fail_on_error;
    let config = cli.into_config();

    match run(&config).await {
        Ok(report) => {
            info!(
                "{} countries aggregated from {:?}, {} plotted, {} cases in total",
                report.countries, report.value_column, report.bars, report.grand_total
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            if fail_on_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
