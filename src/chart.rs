use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::anyhow;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use thiserror::Error;
use tracing::{info, warn};

use crate::aggregate::{Aggregate, CountryTotal};

pub const DEFAULT_OUTPUT: &str = "covid_cases.png";

const BAR_COLOR: RGBColor = RGBColor(135, 206, 235);
const TEXT_COLOR: RGBColor = RGBColor(40, 40, 40);
const CHART_MARGIN: u32 = 20;
const LABEL_FONT_SIZE: u32 = 13;
const LABEL_GAP: u32 = 8;
const AXIS_DESC_SPACE: u32 = 32;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no data to plot")]
    NoData,
    #[error("failed to draw chart {path:?}: {message}")]
    Draw { path: PathBuf, message: String },
    #[error("chart task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// 竖直柱状图，国家在 x 轴
    Vertical,
    /// 水平条形图，最大的在最上面
    Horizontal,
}

impl FromStr for Orientation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertical" | "v" => Ok(Orientation::Vertical),
            "horizontal" | "h" => Ok(Orientation::Horizontal),
            _ => Err(anyhow!("unknown orientation {:?}", s)),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Vertical => f.write_str("vertical"),
            Orientation::Horizontal => f.write_str("horizontal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartOptions {
    pub output: PathBuf,
    pub top_n: Option<usize>,
    pub orientation: Orientation,
    pub width: u32,
    pub height: u32,
    /// 为空时根据 top_n 生成
    pub title: Option<String>,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            top_n: Some(20),
            orientation: Orientation::Horizontal,
            width: 1200,
            height: 800,
            title: None,
        }
    }
}

/// 画图前的纯计算部分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartLayout {
    pub title: String,
    pub bars: Vec<CountryTotal>,
    pub value_max: u64,
    pub orientation: Orientation,
    pub width: u32,
    pub height: u32,
}

impl ChartLayout {
    pub fn plan(aggregate: &Aggregate, options: &ChartOptions) -> Result<Self, RenderError> {
        let bars = aggregate.top(options.top_n).to_vec();
        if bars.is_empty() {
            return Err(RenderError::NoData);
        }

        let title = options.title.clone().unwrap_or_else(|| match options.top_n {
            Some(n) => format!("Top {} Countries by Total COVID-19 Confirmed Cases", n),
            None => "COVID-19 Cases by Country".to_string(),
        });

        let max = bars.iter().map(|b| b.total).max().unwrap_or(0);
        let padding = ((max as f64) * 0.1).max(1.0) as u64;

        Ok(Self {
            title,
            bars,
            value_max: max + padding,
            orientation: options.orientation,
            width: options.width,
            height: options.height,
        })
    }

    /// 类目轴的取值范围(两端都包含)，每个 bar 正好一格
    pub fn category_range(&self) -> Range<usize> {
        0..self.bars.len().saturating_sub(1)
    }

    /// 竖直图 x 轴标签区高度：旋转后的最长国家名加上轴标题
    pub fn vertical_label_area(&self, longest_label: u32) -> u32 {
        (LABEL_GAP + longest_label + AXIS_DESC_SPACE).min(self.height / 2)
    }

    fn labels(&self) -> Vec<String> {
        self.bars.iter().map(|b| b.country.clone()).collect()
    }
}

/// 1234567 -> "1,234,567"
pub fn group_thousands(value: u64) -> String {
    let s = value.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// 画柱状图并写入 options.output，已有文件会被覆盖
pub async fn render_bar_chart(
    aggregate: &Aggregate,
    options: &ChartOptions,
) -> Result<ChartLayout, RenderError> {
    let layout = match ChartLayout::plan(aggregate, options) {
        Ok(layout) => layout,
        Err(e) => {
            warn!("No data to plot.");
            return Err(e);
        }
    };

    let output = options.output.clone();
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RenderError::Draw {
                path: output.clone(),
                message: e.to_string(),
            })?;
    }

    // plotters 是同步的
    let task_layout = layout.clone();
    let task_output = output.clone();
    tokio::task::spawn_blocking(move || draw(&task_layout, &task_output))
        .await?
        .map_err(|e| RenderError::Draw {
            path: output.clone(),
            message: format!("{:#}", e),
        })?;

    info!("Plot saved as {:?}.", output);
    Ok(layout)
}

fn draw(layout: &ChartLayout, output: &Path) -> anyhow::Result<()> {
    let root = BitMapBackend::new(output, (layout.width, layout.height)).into_drawing_area();
    root.fill(&WHITE)?;

    match layout.orientation {
        Orientation::Vertical => draw_vertical(layout, &root)?,
        Orientation::Horizontal => draw_horizontal(layout, &root)?,
    }

    root.present()?;
    Ok(())
}

fn draw_vertical(
    layout: &ChartLayout,
    root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
) -> anyhow::Result<()> {
    let labels = layout.labels();

    let plain_label = ("sans-serif", LABEL_FONT_SIZE).into_font().color(&TEXT_COLOR);
    let mut longest = 0;
    for label in &labels {
        longest = longest.max(root.estimate_text_size(label, &plain_label)?.0);
    }

    let mut chart = ChartBuilder::on(root)
        .caption(&layout.title, ("sans-serif", 28).into_font().color(&TEXT_COLOR))
        .margin(CHART_MARGIN)
        .x_label_area_size(layout.vertical_label_area(longest))
        .y_label_area_size(100)
        .build_cartesian_2d(layout.category_range().into_segmented(), 0u64..layout.value_max)?;

    // 国家名由下面手动画，mesh 只保留刻度
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Total Cases")
        .x_labels(labels.len())
        .x_label_style(("sans-serif", LABEL_FONT_SIZE).into_font().color(&TRANSPARENT))
        .y_label_formatter(&|v| group_thousands(*v))
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BAR_COLOR.filled())
            .margin(4)
            .data(layout.bars.iter().enumerate().map(|(i, b)| (i, b.total))),
    )?;

    // 旋转后从刻度下方开始向下排，整段落在标签区内
    let rotated = plain_label
        .transform(FontTransform::Rotate90)
        .pos(Pos::new(HPos::Left, VPos::Center));
    for (i, label) in labels.iter().enumerate() {
        let (x, y) = chart.backend_coord(&(SegmentValue::CenterOf(i), 0));
        root.draw(&Text::new(
            label.clone(),
            (x, y + LABEL_GAP as i32),
            rotated.clone(),
        ))?;
    }

    let (plot_x, _) = chart.plotting_area().get_pixel_range();
    let desc_style = ("sans-serif", 16)
        .into_font()
        .color(&TEXT_COLOR)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    root.draw(&Text::new(
        "Country/Region",
        (
            (plot_x.start + plot_x.end) / 2,
            layout.height as i32 - CHART_MARGIN as i32 - 4,
        ),
        desc_style,
    ))?;

    Ok(())
}

fn draw_horizontal(
    layout: &ChartLayout,
    root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
) -> anyhow::Result<()> {
    let labels = layout.labels();
    let n = labels.len();

    let mut chart = ChartBuilder::on(root)
        .caption(&layout.title, ("sans-serif", 28).into_font().color(&TEXT_COLOR))
        .margin(CHART_MARGIN)
        .x_label_area_size(60)
        .y_label_area_size(180)
        .build_cartesian_2d(0u64..layout.value_max, layout.category_range().into_segmented())?;

    // 第 0 个(最大)放在最上面
    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Total Confirmed Cases")
        .y_desc("Country/Region")
        .y_labels(n)
        .y_label_style(("sans-serif", 14).into_font().color(&TEXT_COLOR))
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(y) if *y < n => labels[n - 1 - *y].clone(),
            _ => String::new(),
        })
        .x_label_formatter(&|v| group_thousands(*v))
        .draw()?;

    chart.draw_series(
        Histogram::horizontal(&chart)
            .style(BAR_COLOR.filled())
            .margin(4)
            .data(
                layout
                    .bars
                    .iter()
                    .enumerate()
                    .map(|(i, b)| (n - 1 - i, b.total)),
            ),
    )?;

    Ok(())
}
