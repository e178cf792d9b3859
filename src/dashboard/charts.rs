//! Plotly figure specs for the dashboard, emitted as JSON and handed to
//! `Plotly.newPlot` on the page.

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::chain::StraddleSeries;
use crate::config::SessionConfig;
use crate::constants::{
    CHART_TICK_HOURS, COMPARISON_COLORS, DISPLAY_DATE_FORMAT, OVERLAY_COLORS, PRICE_COLOR,
    TIME_LABEL_FORMAT,
};
use crate::market::{Comparison, ExpiryOffset, IndexTick};

/// Minute as shown on the x axis, in the display timezone.
pub fn minute_label(tz: &Tz, minute: NaiveDateTime) -> String {
    tz.from_utc_datetime(&minute)
        .format(TIME_LABEL_FORMAT)
        .to_string()
}

fn decimal_value(value: Option<Decimal>) -> Value {
    value
        .and_then(|d| d.to_f64())
        .map(Value::from)
        .unwrap_or(Value::Null)
}

/// Whole-hour ticks of the session day that also appear on the axis.
fn hour_ticks(tz: &Tz, date: NaiveDate, labels: &[String]) -> Vec<String> {
    CHART_TICK_HOURS
        .iter()
        .filter_map(|h| date.and_hms_opt(*h, 0, 0))
        .map(|m| minute_label(tz, m))
        .filter(|l| labels.contains(l))
        .collect()
}

fn window_caption(settings: &SessionConfig, date: NaiveDate) -> String {
    let tz = &settings.display_tz;
    format!(
        "{}–{} {}",
        minute_label(tz, date.and_time(settings.window.open)),
        minute_label(tz, date.and_time(settings.window.close)),
        tz.name()
    )
}

fn layout(title: String, y_title: &str, tick_labels: Vec<String>, tz: &Tz) -> Value {
    json!({
        "title": { "text": title },
        "xaxis": {
            "title": { "text": format!("Time ({})", tz.name()) },
            "type": "category",
            "tickmode": "array",
            "tickvals": tick_labels,
            "ticktext": tick_labels,
        },
        "yaxis": { "title": { "text": y_title } },
        "hovermode": "x unified",
        "margin": { "t": 60, "r": 20 },
        "legend": { "orientation": "h" },
    })
}

/// Underlying open over the trading window.
pub fn price_figure(settings: &SessionConfig, date: NaiveDate, minutes: &[IndexTick]) -> Value {
    let tz = &settings.display_tz;
    let labels: Vec<String> = minutes.iter().map(|t| minute_label(tz, t.minute)).collect();
    let opens: Vec<Value> = minutes.iter().map(|t| decimal_value(Some(t.open))).collect();
    let ticks = hour_ticks(tz, date, &labels);

    json!({
        "data": [{
            "type": "scatter",
            "mode": "lines",
            "name": settings.underlying,
            "x": labels,
            "y": opens,
            "line": { "color": PRICE_COLOR, "width": 1.5 },
            "hovertemplate": "%{x}<br>Open: %{y:.2f}<extra></extra>",
        }],
        "layout": layout(
            format!(
                "{} Price – {} ({})",
                settings.underlying,
                date.format(DISPLAY_DATE_FORMAT),
                window_caption(settings, date)
            ),
            "Open",
            ticks,
            tz,
        ),
    })
}

fn straddle_trace(tz: &Tz, series: &StraddleSeries, color: &str, visible: Value) -> Value {
    let x: Vec<String> = series
        .points
        .iter()
        .map(|p| minute_label(tz, p.minute))
        .collect();
    let y: Vec<Value> = series.points.iter().map(|p| decimal_value(p.price)).collect();
    let customdata: Vec<Value> = series
        .points
        .iter()
        .map(|p| json!([decimal_value(Some(p.underlying)), decimal_value(p.strike)]))
        .collect();

    json!({
        "type": "scatter",
        "mode": "lines",
        "name": format!("{} ({})", series.label(), series.expiry),
        "x": x,
        "y": y,
        "customdata": customdata,
        "connectgaps": false,
        "visible": visible,
        "line": { "color": color, "width": 1.5 },
        "hovertemplate": format!(
            "%{{x}}<br>Straddle: %{{y:.2f}}<br>Underlying: %{{customdata[0]:.2f}}<br>Strike: %{{customdata[1]}}<extra>{}</extra>",
            series.label()
        ),
    })
}

/// All straddle series on one chart; only 0DTE starts visible.
pub fn overlay_figure(settings: &SessionConfig, date: NaiveDate, series: &[StraddleSeries]) -> Value {
    let tz = &settings.display_tz;
    let traces: Vec<Value> = series
        .iter()
        .map(|s| {
            let visible = if s.offset == ExpiryOffset::ZeroDte {
                json!(true)
            } else {
                json!("legendonly")
            };
            straddle_trace(tz, s, OVERLAY_COLORS[s.offset.index()], visible)
        })
        .collect();

    json!({
        "data": traces,
        "layout": layout(
            format!(
                "ATM Straddle – {} ({})",
                date.format(DISPLAY_DATE_FORMAT),
                window_caption(settings, date)
            ),
            "Straddle mid",
            axis_ticks(tz, date, series),
            tz,
        ),
    })
}

/// The series picked by `compare`, all visible.
pub fn comparison_figure(
    settings: &SessionConfig,
    date: NaiveDate,
    series: &[StraddleSeries],
    compare: Comparison,
) -> Value {
    let tz = &settings.display_tz;
    let traces: Vec<Value> = series
        .iter()
        .filter(|s| compare.offsets().contains(&s.offset))
        .map(|s| straddle_trace(tz, s, COMPARISON_COLORS[s.offset.index()], json!(true)))
        .collect();

    json!({
        "data": traces,
        "layout": layout(
            format!("Straddle Comparison: {} – {}", compare.title(), date.format(DISPLAY_DATE_FORMAT)),
            "Straddle mid",
            axis_ticks(tz, date, series),
            tz,
        ),
    })
}

fn axis_ticks(tz: &Tz, date: NaiveDate, series: &[StraddleSeries]) -> Vec<String> {
    let labels: Vec<String> = series
        .first()
        .map(|s| s.points.iter().map(|p| minute_label(tz, p.minute)).collect())
        .unwrap_or_default();
    hour_ticks(tz, date, &labels)
}
