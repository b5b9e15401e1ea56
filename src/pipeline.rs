use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::aggregate::{aggregate_by_country, AggregateError};
use crate::chart::{render_bar_chart, RenderError};
use crate::config::PipelineConfig;
use crate::fetcher::{Fetch, FetchError, SourceFetcher};

/// 每个阶段的失败都会终止后续阶段
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("no data to plot")]
    NoData,
    #[error(transparent)]
    Render(RenderError),
}

impl From<RenderError> for PipelineError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::NoData => PipelineError::NoData,
            other => PipelineError::Render(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub value_column: String,
    pub countries: usize,
    pub bars: usize,
    pub grand_total: u64,
    pub output: PathBuf,
}

/// 下载 -> 汇总 -> 画图
pub async fn run(config: &PipelineConfig) -> Result<RunReport, PipelineError> {
    run_with(&SourceFetcher(&config.source), config).await
}

/// 同 `run`，但数据由调用方提供的 fetcher 获取
pub async fn run_with<F>(fetcher: &F, config: &PipelineConfig) -> Result<RunReport, PipelineError>
where
    F: Fetch + Sync + ?Sized,
{
    info!("retrieving data from source: {}", config.source);
    let text = fetcher.fetch().await?;

    let aggregate = aggregate_by_country(&text, &config.value_column)?;
    let layout = render_bar_chart(&aggregate, &config.chart).await?;

    Ok(RunReport {
        value_column: aggregate.value_column().to_string(),
        countries: aggregate.len(),
        bars: layout.bars.len(),
        grand_total: aggregate.grand_total(),
        output: config.chart.output.clone(),
    })
}
