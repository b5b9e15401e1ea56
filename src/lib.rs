//! 下载 JHU CSSE 的 COVID-19 确诊数据，按国家汇总后画成柱状图。

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod fetcher;
pub mod pipeline;

pub use aggregate::{aggregate_by_country, Aggregate, AggregateError, CountryTotal, ValueColumn};
pub use chart::{render_bar_chart, ChartLayout, ChartOptions, Orientation, RenderError};
pub use config::{PipelineConfig, Variant};
pub use fetcher::{retrieve_data, Fetch, FetchError};
pub use pipeline::{run, run_with, PipelineError, RunReport};
