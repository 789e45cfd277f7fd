use std::io::Cursor;
use std::ops::Range;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use log::{info, warn};
use plotters::prelude::*;

use crate::color::generate_palette;
use crate::data::model::MergedTable;
use crate::error::{CalibrationError, Result};
use crate::output::{group_name, non_empty, CombinedGroups};

/// Default chart file prefix, giving `laser_power_488nm.png`.
pub const DEFAULT_PREFIX: &str = "laser_power";

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
}

impl Default for PlotStyle {
    /// 8 x 6 inches at 300 dpi.
    fn default() -> Self {
        Self {
            width: 2400,
            height: 1800,
            background: WHITE,
        }
    }
}

impl PlotStyle {
    /// Largest accepted chart edge in pixels.
    pub const MAX_EDGE: u32 = 16384;

    /// Scale a size tuned for a 600 px tall chart.
    fn px(&self, base: u32) -> u32 {
        let scaled = u64::from(base) * u64::from(self.height) / 600;
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    }

    /// RGB buffer length, or an error for sizes outside `1..=MAX_EDGE`.
    fn buffer_len(&self) -> Result<usize> {
        let edge_ok = |v: u32| (1..=Self::MAX_EDGE).contains(&v);
        if !edge_ok(self.width) || !edge_ok(self.height) {
            return Err(CalibrationError::Plot(format!(
                "chart size {}x{} outside 1..={} pixels",
                self.width,
                self.height,
                Self::MAX_EDGE
            )));
        }
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| CalibrationError::Plot("chart buffer size overflows".into()))
    }
}

// ---------------------------------------------------------------------------
// Series planning
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
    /// Absolute error, if the label has an error column and the cell is numeric.
    pub err: Option<f64>,
}

/// One error-barred line. Rows without a value split the line into segments.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    pub segments: Vec<Vec<ChartPoint>>,
}

impl ChartSeries {
    pub fn points(&self) -> impl Iterator<Item = &ChartPoint> {
        self.segments.iter().flatten()
    }
}

/// Leading numeric token of a label, e.g. the month in `07-25`.
pub fn label_order(label: &str) -> Option<u32> {
    label.split('-').next()?.trim().parse().ok()
}

/// Series to draw for a merged table, ordered by [`label_order`]
/// (labels without a number last, ties in merge order).
///
/// Labels with no value column are skipped; labels with no error column
/// are drawn without error bars.
pub fn plan_series(table: &MergedTable) -> Vec<ChartSeries> {
    let mut columns: Vec<_> = table.series.iter().collect();
    columns.sort_by_key(|s| label_order(&s.label).unwrap_or(u32::MAX));

    let xs: Vec<Option<f64>> = table.keys().map(|k| k.as_f64()).collect();

    columns
        .into_iter()
        .filter_map(|s| {
            let Some(value_col) = s.value_column else {
                warn!("series '{}' has no power column, not plotted", s.label);
                return None;
            };
            if s.error_column.is_none() {
                warn!("series '{}' has no error column, plotted without error bars", s.label);
            }

            let mut segments = Vec::new();
            let mut current = Vec::new();
            for (row_idx, value) in table.column(value_col).enumerate() {
                let x = xs.get(row_idx).copied().flatten();
                match (x, value.as_f64()) {
                    (Some(x), Some(y)) => {
                        let err = s.error_column.and_then(|ec| {
                            table.rows[row_idx].cells.get(ec)?.as_f64().map(f64::abs)
                        });
                        current.push(ChartPoint { x, y, err });
                    }
                    _ if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                    _ => {}
                }
            }
            if !current.is_empty() {
                segments.push(current);
            }

            Some(ChartSeries {
                label: s.label.clone(),
                segments,
            })
        })
        .collect()
}

fn padded(range: Option<(f64, f64)>) -> Range<f64> {
    match range {
        None => 0.0..1.0,
        Some((lo, hi)) => {
            let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
            (lo - pad)..(hi + pad)
        }
    }
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render one wavelength's calibration chart as PNG bytes.
pub fn render_chart_png(
    wavelength: u32,
    series: &[ChartSeries],
    style: &PlotStyle,
) -> Result<Vec<u8>> {
    let x_range = padded(extent(series.iter().flat_map(|s| s.points()).map(|p| p.x)));
    let y_range = padded(extent(series.iter().flat_map(|s| s.points()).flat_map(|p| {
        let e = p.err.unwrap_or(0.0);
        [p.y - e, p.y + e]
    })));
    let palette = generate_palette(series.len());

    let mut buffer = vec![0u8; style.buffer_len()?];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(style.px(15))
            .caption(
                format!("Laser Power Calibration - {}", group_name(wavelength)),
                ("sans-serif", style.px(22)).into_font(),
            )
            .set_label_area_size(LabelAreaPosition::Left, style.px(60))
            .set_label_area_size(LabelAreaPosition::Bottom, style.px(50))
            .build_cartesian_2d(x_range, y_range)?;
        chart
            .configure_mesh()
            .x_desc("Power Percentage Values")
            .y_desc("Measured Power (mW)")
            .label_style(("sans-serif", style.px(13)))
            .axis_desc_style(("sans-serif", style.px(15)))
            .bold_line_style(BLACK.mix(0.12))
            .light_line_style(BLACK.mix(0.04))
            .draw()?;

        let line_width = style.px(2);
        for (s, color) in series.iter().zip(palette) {
            let stroke = color.stroke_width(line_width);
            let lines = s.segments.iter().map(|seg| {
                let coords: Vec<(f64, f64)> = seg.iter().map(|p| (p.x, p.y)).collect();
                PathElement::new(coords, stroke)
            });
            chart
                .draw_series(lines)?
                .label(s.label.as_str())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3))
                });
            chart.draw_series(
                s.points()
                    .map(|p| Circle::new((p.x, p.y), style.px(4), color.filled())),
            )?;
            chart.draw_series(s.points().filter_map(|p| {
                let e = p.err?;
                Some(ErrorBar::new_vertical(p.x, p.y - e, p.y, p.y + e, stroke, style.px(6)))
            }))?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .label_font(("sans-serif", style.px(13)))
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK.mix(0.3))
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| CalibrationError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Plotter – one chart file per wavelength
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Plotter {
    dir: PathBuf,
    prefix: String,
    style: PlotStyle,
}

impl Plotter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, style: PlotStyle) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            style,
        }
    }

    /// `<dir>/<prefix>_<wavelength>nm.png`
    pub fn chart_path(&self, wavelength: u32) -> PathBuf {
        self.dir
            .join(format!("{}_{}.png", self.prefix, group_name(wavelength)))
    }

    /// Render every non-empty group and return the chart files written.
    pub fn write_all(&self, groups: &CombinedGroups) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CalibrationError::io(format!("creating {}", self.dir.display()), e))?;

        let mut written = Vec::new();
        for (wavelength, table) in non_empty(groups) {
            let series = plan_series(table);
            let png = render_chart_png(wavelength, &series, &self.style)?;
            let path = self.chart_path(wavelength);
            std::fs::write(&path, png)
                .map_err(|e| CalibrationError::io(format!("writing {}", path.display()), e))?;
            info!("saved plot for {} -> {}", group_name(wavelength), path.display());
            written.push(path);
        }
        Ok(written)
    }
}
