//! Predicted-vs-actual scatter plot (SVG)

use crate::metrics::linregress;
use crate::table::format_float;
use crate::{Error, Result};
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

const SIZE: (u32, u32) = (640, 480);

fn plot_err<E: std::fmt::Display>(err: E) -> Error {
    Error::Plot(err.to_string())
}

/// Padded `[min, max]` of the finite values
fn axis_range<'a>(values: impl Iterator<Item = &'a f64>) -> Option<Range<f64>> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return None;
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    Some(lo - pad..hi + pad)
}

/// Scatter `y_pred` against `y_true` with the least-squares trend line,
/// labelled `r² = {r2}`.
///
/// # Errors
/// Returns [`Error::Plot`] if there is nothing finite to draw or the file
/// cannot be written
pub fn render_scatter(path: &Path, y_true: &[f64], y_pred: &[f64], r2: f64) -> Result<()> {
    let x_range = axis_range(y_true.iter()).ok_or_else(|| plot_err("no finite measured values"))?;
    let y_range =
        axis_range(y_pred.iter()).ok_or_else(|| plot_err("no finite predicted values"))?;
    let fit = linregress(y_true, y_pred)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range.clone(), y_range)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("y_real")
        .y_desc("y_predicted")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(
            y_true
                .iter()
                .zip(y_pred)
                .filter(|(t, p)| t.is_finite() && p.is_finite())
                .map(|(&t, &p)| Circle::new((t, p), 3, BLUE.mix(0.2).filled())),
        )
        .map_err(plot_err)?;

    if fit.slope.is_finite() {
        let line = [x_range.start, x_range.end].map(|x| (x, fit.intercept + fit.slope * x));
        chart
            .draw_series(LineSeries::new(line, &BLACK))
            .map_err(plot_err)?
            .label(format!("r\u{b2} = {}", format_float(r2)))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    debug!(path = %path.display(), points = y_true.len(), "scatter plot written");
    Ok(())
}
