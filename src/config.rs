use std::path::PathBuf;

use crate::aggregate::ValueColumn;
use crate::chart::{ChartOptions, Orientation, DEFAULT_OUTPUT};

pub const SNAPSHOT_URL: &str = "https://github.com/CSSEGISandData/COVID-19/raw/master/csse_covid_19_data/csse_covid_19_time_series/daily_covid_confirmed_global.csv";
pub const TIME_SERIES_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";

/// 两种数据源的预设
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Variant {
    /// 每日快照，求和 `Confirmed` 列，竖直柱状图，不限数量
    Snapshot,
    /// 时间序列，求和最新日期列，水平条形图，前 20
    #[default]
    TimeSeries,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// http(s):// 或 file:// 地址
    pub source: String,
    pub value_column: ValueColumn,
    pub chart: ChartOptions,
}

impl PipelineConfig {
    pub fn from_variant(variant: Variant) -> Self {
        match variant {
            Variant::Snapshot => Self {
                source: SNAPSHOT_URL.to_string(),
                value_column: ValueColumn::Named("Confirmed".to_string()),
                chart: ChartOptions {
                    output: PathBuf::from(DEFAULT_OUTPUT),
                    top_n: None,
                    orientation: Orientation::Vertical,
                    width: 1000,
                    height: 600,
                    title: None,
                },
            },
            Variant::TimeSeries => Self {
                source: TIME_SERIES_URL.to_string(),
                value_column: ValueColumn::Latest,
                chart: ChartOptions::default(),
            },
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_variant(Variant::default())
    }
}
