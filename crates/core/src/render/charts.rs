use anyhow::Result;
use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;

use crate::domain::price::PriceBar;
use crate::domain::report::ForecastFrame;
use crate::render::format::escape_html;

const CHART_SIZE: (u32, u32) = (760, 380);

const CLOSE_COLOR: RGBColor = RGBColor(218, 165, 32);
const OPEN_COLOR: RGBColor = RGBColor(34, 139, 34);
const PREDICTED_COLOR: RGBColor = RGBColor(30, 90, 220);
const LOWER_COLOR: RGBColor = RGBColor(200, 30, 30);
const UPPER_COLOR: RGBColor = RGBColor(34, 139, 34);
const BAR_COLOR: RGBColor = RGBColor(120, 144, 156);

/// A hover target: backend pixel position plus the text shown on hover.
#[derive(Debug, Clone, PartialEq)]
struct Tooltip {
    x: i32,
    y: i32,
    label: String,
}

/// Close and open prices over the trimmed history.
pub fn history_chart(bars: &[PriceBar]) -> Result<String> {
    let (start, end) = date_span(bars.iter().map(|b| b.date));
    let (y_min, y_max) = value_span(bars.iter().flat_map(|b| [b.close, b.open]));

    render_svg(|root| {
        let mut chart = ChartBuilder::on(root)
            .margin(16)
            .x_label_area_size(36)
            .y_label_area_size(64)
            .build_cartesian_2d(start..end, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_labels(6)
            .y_labels(8)
            .x_label_formatter(&|d: &NaiveDate| d.format("%d/%m/%y").to_string())
            .y_label_formatter(&|v: &f64| format!("{v:.2}"))
            .draw()?;

        chart
            .draw_series(LineSeries::new(
                bars.iter().map(|b| (b.date, b.close)),
                CLOSE_COLOR.stroke_width(2),
            ))?
            .label("Close")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], CLOSE_COLOR.stroke_width(2)));

        chart
            .draw_series(LineSeries::new(
                bars.iter().map(|b| (b.date, b.open)),
                OPEN_COLOR.stroke_width(2),
            ))?
            .label("Open")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], OPEN_COLOR.stroke_width(2)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .border_style(&BLACK)
            .draw()?;

        let mut tips = Vec::with_capacity(bars.len() * 2);
        for b in bars {
            for (name, value) in [("Close", b.close), ("Open", b.open)] {
                let (x, y) = chart.backend_coord(&(b.date, value));
                tips.push(Tooltip {
                    x,
                    y,
                    label: tooltip_label(b.date, name, value),
                });
            }
        }
        Ok(tips)
    })
}

/// Prediction with its lower and upper bounds (bounds dashed) over the whole forecast index.
pub fn forecast_chart(frame: &ForecastFrame) -> Result<String> {
    let points = &frame.points;
    let (start, end) = date_span(points.iter().map(|p| p.ds));
    let (y_min, y_max) =
        value_span(points.iter().flat_map(|p| [p.yhat, p.yhat_lower, p.yhat_upper]));

    render_svg(|root| {
        let mut chart = ChartBuilder::on(root)
            .margin(16)
            .x_label_area_size(36)
            .y_label_area_size(64)
            .build_cartesian_2d(start..end, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_labels(6)
            .y_labels(8)
            .x_label_formatter(&|d: &NaiveDate| d.format("%d/%m/%y").to_string())
            .y_label_formatter(&|v: &f64| format!("{v:.2}"))
            .draw()?;

        chart
            .draw_series(LineSeries::new(
                points.iter().map(|p| (p.ds, p.yhat)),
                PREDICTED_COLOR.stroke_width(2),
            ))?
            .label("Predicted")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], PREDICTED_COLOR.stroke_width(2))
            });

        chart
            .draw_series(DashedLineSeries::new(
                points.iter().map(|p| (p.ds, p.yhat_lower)),
                6,
                4,
                LOWER_COLOR.stroke_width(1),
            ))?
            .label("Lower bound")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], LOWER_COLOR.stroke_width(1)));

        chart
            .draw_series(DashedLineSeries::new(
                points.iter().map(|p| (p.ds, p.yhat_upper)),
                6,
                4,
                UPPER_COLOR.stroke_width(1),
            ))?
            .label("Upper bound")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], UPPER_COLOR.stroke_width(1)));

        if let Some(first_future) = frame.future().first() {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(first_future.ds, y_min), (first_future.ds, y_max)],
                BLACK.mix(0.3).stroke_width(1),
            )))?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .border_style(&BLACK)
            .draw()?;

        let mut tips = Vec::with_capacity(points.len() * 3);
        for p in points {
            for (name, value) in [
                ("Predicted", p.yhat),
                ("Lower", p.yhat_lower),
                ("Upper", p.yhat_upper),
            ] {
                let (x, y) = chart.backend_coord(&(p.ds, value));
                tips.push(Tooltip {
                    x,
                    y,
                    label: tooltip_label(p.ds, name, value),
                });
            }
        }
        Ok(tips)
    })
}

/// Historical closes as bars with the predicted line drawn over them.
pub fn overlay_chart(bars: &[PriceBar], frame: &ForecastFrame) -> Result<String> {
    let dates = bars
        .iter()
        .map(|b| b.date)
        .chain(bars.last().map(|b| b.date + Duration::days(1)))
        .chain(frame.points.iter().map(|p| p.ds));
    let (start, end) = date_span(dates);
    let (y_min, y_max) = value_span(
        bars.iter()
            .map(|b| b.close)
            .chain(frame.points.iter().map(|p| p.yhat)),
    );

    render_svg(|root| {
        let mut chart = ChartBuilder::on(root)
            .margin(16)
            .x_label_area_size(36)
            .y_label_area_size(64)
            .build_cartesian_2d(start..end, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_labels(6)
            .y_labels(8)
            .x_label_formatter(&|d: &NaiveDate| d.format("%d/%m/%y").to_string())
            .y_label_formatter(&|v: &f64| format!("{v:.2}"))
            .draw()?;

        chart
            .draw_series(bars.iter().map(|b| {
                Rectangle::new(
                    [(b.date, y_min), (b.date + Duration::days(1), b.close)],
                    BAR_COLOR.mix(0.6).filled(),
                )
            }))?
            .label("Close")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], BAR_COLOR.mix(0.6).filled()));

        chart
            .draw_series(LineSeries::new(
                frame.points.iter().map(|p| (p.ds, p.yhat)),
                PREDICTED_COLOR.stroke_width(2),
            ))?
            .label("Predicted")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], PREDICTED_COLOR.stroke_width(2))
            });

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .border_style(&BLACK)
            .draw()?;

        let mut tips = Vec::with_capacity(bars.len() + frame.points.len());
        for b in bars {
            let (x, y) = chart.backend_coord(&(b.date, b.close));
            tips.push(Tooltip {
                x,
                y,
                label: tooltip_label(b.date, "Close", b.close),
            });
        }
        for p in &frame.points {
            let (x, y) = chart.backend_coord(&(p.ds, p.yhat));
            tips.push(Tooltip {
                x,
                y,
                label: tooltip_label(p.ds, "Predicted", p.yhat),
            });
        }
        Ok(tips)
    })
}

fn render_svg<F>(draw: F) -> Result<String>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<Vec<Tooltip>>,
{
    let mut buf = String::new();
    let tips = {
        let root = SVGBackend::with_string(&mut buf, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        let tips = draw(&root)?;
        root.present()?;
        tips
    };
    Ok(inject_tooltips(buf, &tips))
}

fn inject_tooltips(mut svg: String, tips: &[Tooltip]) -> String {
    let Some(close_at) = svg.rfind("</svg>") else {
        return svg;
    };

    let mut layer = String::from(r#"<g class="tooltips">"#);
    for tip in tips {
        layer.push_str(&format!(
            r#"<circle class="tip" cx="{}" cy="{}" r="5"><title>{}</title></circle>"#,
            tip.x,
            tip.y,
            escape_html(&tip.label)
        ));
    }
    layer.push_str("</g>");
    svg.insert_str(close_at, &layer);
    svg
}

fn tooltip_label(date: NaiveDate, name: &str, value: f64) -> String {
    format!("{} | {name}: {value:.2}", date.format("%Y-%m-%d"))
}

/// Inclusive date range, widened by a day when it would otherwise be empty.
fn date_span(dates: impl Iterator<Item = NaiveDate>) -> (NaiveDate, NaiveDate) {
    let mut min: Option<NaiveDate> = None;
    let mut max: Option<NaiveDate> = None;
    for d in dates {
        min = Some(min.map_or(d, |m| m.min(d)));
        max = Some(max.map_or(d, |m| m.max(d)));
    }

    let start = min.unwrap_or_default();
    let end = max.unwrap_or(start);
    if end <= start {
        (start, start + Duration::days(1))
    } else {
        (start, end)
    }
}

/// Value range over the finite inputs with 5% padding on both sides.
fn value_span(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }

    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let padding = (hi - lo) * 0.05;
    (lo - padding, hi + padding)
}
