//! Server-side HTML for the upload page, the table preview and the
//! options chain dashboard.

use std::fmt::Write;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::chain::{ChainRow, OptionChain};
use crate::config::SessionConfig;
use crate::constants::{DATE_FORMAT, DISPLAY_DATE_FORMAT, MINUTE_FORMAT, TIME_LABEL_FORMAT};
use crate::db::models::{index_data, option_data};
use crate::ingest::{FileStatus, UploadSummary};
use crate::market::{Comparison, ExpiryOffset};

use super::charts::{comparison_figure, minute_label, overlay_figure, price_figure};
use super::view::{DashboardView, ViewState};

const MISSING: &str = "—";
const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const BOOTSTRAP_CDN: &str = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css";

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn price(value: Option<Decimal>) -> String {
    value
        .map(|d| format!("{:.2}", d))
        .unwrap_or_else(|| MISSING.to_string())
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="{bootstrap}">
<script src="{plotly}"></script>
</head>
<body class="bg-light">
<nav class="navbar navbar-dark bg-dark mb-4">
  <div class="container">
    <a class="navbar-brand" href="/">Straddle Board</a>
    <div>
      <a class="btn btn-outline-light btn-sm" href="/">Upload</a>
      <a class="btn btn-outline-light btn-sm" href="/view">Preview</a>
      <a class="btn btn-outline-light btn-sm" href="/options_chain">Options Chain</a>
    </div>
  </div>
</nav>
<div class="container">
{body}
</div>
</body>
</html>"#,
        title = escape(title),
        bootstrap = BOOTSTRAP_CDN,
        plotly = PLOTLY_CDN,
        body = body
    )
}

pub fn alert(class: &str, text: &str) -> String {
    format!(r#"<div class="alert {}">{}</div>"#, class, escape(text))
}

/// Per-file outcome lines of one upload.
pub fn upload_message(summary: &UploadSummary) -> String {
    let details: Vec<String> = summary
        .files
        .iter()
        .map(|f| match &f.status {
            FileStatus::Loaded(stats) => escape(&format!(
                "✅ {} - {} → {} ({} invalid)",
                f.file_name, stats.original_rows, stats.processed_rows, stats.dropped_rows
            )),
            FileStatus::Failed { reason } => escape(&format!("❌ {} - {}", f.file_name, reason)),
        })
        .collect();

    let class = if summary.success_count() > 0 {
        "alert-success"
    } else {
        "alert-danger"
    };

    format!(
        r#"<div class="alert {}">
  <strong>Upload Complete!</strong><br>
  Success: <strong>{}</strong> | Failed: <strong>{}</strong><br><br>
  <small>{}</small>
</div>"#,
        class,
        summary.success_count(),
        summary.failure_count(),
        details.join("<br>")
    )
}

/// Upload form. `message` is pre-rendered HTML.
pub fn home_page(message: Option<&str>) -> String {
    let body = format!(
        r#"<h2 class="mb-3">Upload CSV data</h2>
{message}
<form method="post" enctype="multipart/form-data" class="card card-body">
  <div class="mb-3">
    <label class="form-label" for="upload_type">Data type</label>
    <select class="form-select" name="upload_type" id="upload_type">
      <option value="index">Index minute bars (datetime_UTC, open, ...)</option>
      <option value="option">Option quotes (UTC_MINUTE, STRIKE, OPTION_TYPE, EXPIRY_DATE, bid_open, ask_open)</option>
    </select>
  </div>
  <div class="mb-3">
    <input class="form-control" type="file" name="file" accept=".csv" multiple>
  </div>
  <button class="btn btn-primary" type="submit">Upload</button>
</form>"#,
        message = message.unwrap_or_default()
    );
    page("Upload", &body)
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut html = String::from(r#"<table class="table table-striped table-bordered table-sm"><thead><tr>"#);
    for h in headers {
        let _ = write!(html, "<th>{}</th>", escape(h));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td>{}</td>", escape(&cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

pub fn index_preview(rows: &[index_data::Model]) -> String {
    if rows.is_empty() {
        return "<p>No index data yet.</p>".to_string();
    }
    table(
        &["id", "datetime_UTC", "open", "high", "low", "close", "volume"],
        rows.iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.minute.format(MINUTE_FORMAT).to_string(),
                    r.open.to_string(),
                    optional(&r.high),
                    optional(&r.low),
                    optional(&r.close),
                    optional(&r.volume),
                ]
            })
            .collect(),
    )
}

pub fn option_preview(rows: &[option_data::Model]) -> String {
    if rows.is_empty() {
        return "<p>No option data yet.</p>".to_string();
    }
    table(
        &["id", "UTC_MINUTE", "STRIKE", "OPTION_TYPE", "EXPIRY_DATE", "bid_open", "ask_open"],
        rows.iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.minute.format(MINUTE_FORMAT).to_string(),
                    r.strike.to_string(),
                    r.option_type.clone(),
                    r.expiry_date.format(DATE_FORMAT).to_string(),
                    optional(&r.bid_open),
                    optional(&r.ask_open),
                ]
            })
            .collect(),
    )
}

/// Latest rows of both tables; arguments are pre-rendered HTML.
pub fn preview_page(index_html: &str, option_html: &str) -> String {
    let body = format!(
        r#"<h2>Latest index rows</h2>
<div class="table-responsive mb-4">{}</div>
<h2>Latest option rows</h2>
<div class="table-responsive">{}</div>"#,
        index_html, option_html
    );
    page("Preview", &body)
}

fn chain_row(row: &ChainRow, atm: i64) -> String {
    let style = if row.strike == atm {
        r#" style="background-color: #fffbe6; font-weight: bold;""#
    } else {
        ""
    };
    format!(
        "<tr{}><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        style,
        price(row.call_bid),
        price(row.call_ask),
        row.strike,
        price(row.put_bid),
        price(row.put_ask)
    )
}

pub fn chain_table(chain: &OptionChain, open: Decimal, expiry: ExpiryOffset) -> String {
    let mut html = format!(
        r#"<div class="text-center mb-4">
  <h4 class="text-primary fw-bold">ATM Strike: {}</h4>
  <p class="text-muted">Open Price: <strong>{:.2}</strong><br>
  Time: <strong>{}</strong> | Expiry: <strong>{} ({})</strong> | ±{} strikes</p>
</div>"#,
        chain.atm_strike,
        open,
        chain.minute.format(TIME_LABEL_FORMAT),
        chain.expiry.format(DISPLAY_DATE_FORMAT),
        expiry.label(),
        chain.radius
    );

    if !chain.has_quotes() {
        html.push_str(r#"<p class="text-center text-warning">No options found for this minute.</p>"#);
        return html;
    }
    if chain.quoted_strikes == 0 {
        html.push_str(r#"<p class="text-center text-warning">No options in selected strike range.</p>"#);
        return html;
    }

    html.push_str(
        r#"<table class="table table-sm table-hover text-center w-75 mx-auto"><thead><tr>
<th>Call_Bid</th><th>Call_Ask</th><th>STRIKE</th><th>Put_Bid</th><th>Put_Ask</th>
</tr></thead><tbody>"#,
    );
    for row in &chain.rows {
        html.push_str(&chain_row(row, chain.atm_strike));
    }
    html.push_str("</tbody></table>");
    html
}

fn selected(flag: bool) -> &'static str {
    if flag {
        " selected"
    } else {
        ""
    }
}

fn controls(view: &DashboardView, settings: &SessionConfig) -> String {
    let tz = &settings.display_tz;
    let mut dates = String::new();
    for d in &view.dates {
        let _ = write!(
            dates,
            r#"<option value="{}"{}>{}</option>"#,
            d.format(DATE_FORMAT),
            selected(view.selected_date == Some(*d)),
            d.format(DISPLAY_DATE_FORMAT)
        );
    }

    let mut expiries = String::new();
    for o in ExpiryOffset::ALL {
        let _ = write!(
            expiries,
            r#"<option value="{0}"{1}>{0}</option>"#,
            o.label(),
            selected(view.expiry == o)
        );
    }

    let mut comparisons = String::new();
    for c in [
        Comparison::All,
        Comparison::ZeroVsOne,
        Comparison::ZeroVsTwo,
        Comparison::OneVsTwo,
    ] {
        let _ = write!(
            comparisons,
            r#"<option value="{}"{}>{}</option>"#,
            c.code(),
            selected(view.compare == c),
            c.title()
        );
    }

    let selected_minute = view.selection.map(|s| s.minute);
    let time_control = if view.trading_times.is_empty() {
        let mut options = String::new();
        for m in &view.times {
            let _ = write!(
                options,
                r#"<option value="{}"{}>{}</option>"#,
                m.format(MINUTE_FORMAT),
                selected(selected_minute == Some(*m)),
                minute_label(tz, *m)
            );
        }
        format!(
            r#"<select class="form-select" name="time" onchange="this.form.submit()">{}</select>"#,
            options
        )
    } else {
        let values: Vec<String> = view
            .trading_times
            .iter()
            .map(|m| m.format(MINUTE_FORMAT).to_string())
            .collect();
        let labels: Vec<String> = view.trading_times.iter().map(|m| minute_label(tz, *m)).collect();
        let index = view.selection.and_then(|s| s.slider_index).unwrap_or(0);
        let current = values.get(index).cloned().unwrap_or_default();
        let current_label = labels.get(index).cloned().unwrap_or_default();
        format!(
            r#"<input type="hidden" name="time" id="time" value="{current}">
<input type="range" class="form-range" id="slider" min="0" max="{max}" value="{index}">
<span id="time-label" class="fw-bold">{current_label}</span>
<script>
const minutes = {values};
const labels = {labels};
const slider = document.getElementById("slider");
slider.addEventListener("input", () => {{
  document.getElementById("time-label").textContent = labels[slider.value];
}});
slider.addEventListener("change", () => {{
  document.getElementById("time").value = minutes[slider.value];
  slider.form.submit();
}});
</script>"#,
            current = escape(&current),
            max = values.len() - 1,
            index = index,
            current_label = escape(&current_label),
            values = script_json(&serde_json::json!(values)),
            labels = script_json(&serde_json::json!(labels)),
        )
    };

    format!(
        r#"<form method="get" class="card card-body mb-4">
<div class="row g-3 align-items-end">
  <div class="col-md-2"><label class="form-label">Date</label>
    <select class="form-select" name="date" onchange="this.form.submit()">{dates}</select></div>
  <div class="col-md-4"><label class="form-label">Time</label>{time_control}</div>
  <div class="col-md-2"><label class="form-label">Expiry</label>
    <select class="form-select" name="expiry" onchange="this.form.submit()">{expiries}</select></div>
  <div class="col-md-1"><label class="form-label">Strikes ±</label>
    <input class="form-control" type="number" name="steps" min="0" max="{max_steps}" value="{steps}"></div>
  <div class="col-md-2"><label class="form-label">Compare</label>
    <select class="form-select" name="compare" onchange="this.form.submit()">{comparisons}</select></div>
  <div class="col-md-1"><button class="btn btn-primary w-100" type="submit">Go</button></div>
</div>
</form>"#,
        dates = dates,
        time_control = time_control,
        expiries = expiries,
        max_steps = settings.max_strike_steps,
        steps = view.steps,
        comparisons = comparisons
    )
}

/// JSON for inline `<script>`; `</` is escaped so a value cannot close the tag.
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn chart(id: &str, figure: &Value) -> String {
    format!(
        r#"<div class="card card-body mb-4"><div id="{id}" style="height: 520px;"></div></div>
<script>
(function() {{
  const fig = {fig};
  Plotly.newPlot("{id}", fig.data, fig.layout, {{responsive: true}});
}})();
</script>"#,
        id = id,
        fig = script_json(figure)
    )
}

pub fn chain_page(view: &DashboardView, settings: &SessionConfig) -> String {
    let mut body = String::from(r#"<h2 class="mb-3">Options Chain</h2>"#);
    body.push_str(&controls(view, settings));

    match &view.state {
        ViewState::NoDate => {
            body.push_str(r#"<p class="text-danger">Invalid or no date selected.</p>"#);
        }
        ViewState::Missing { message } => {
            let _ = write!(body, r#"<p class="text-danger">{}.</p>"#, escape(message));
        }
        ViewState::Ready(analysis) => {
            body.push_str(&chain_table(&analysis.chain, analysis.atm.open, view.expiry));
            if let Some(date) = view.selected_date {
                if !analysis.trading_minutes.is_empty() {
                    body.push_str(&chart(
                        "price-chart",
                        &price_figure(settings, date, &analysis.trading_minutes),
                    ));
                    body.push_str(&chart(
                        "straddle-chart",
                        &overlay_figure(settings, date, &analysis.straddles),
                    ));
                    body.push_str(&chart(
                        "comparison-chart",
                        &comparison_figure(settings, date, &analysis.straddles, view.compare),
                    ));
                } else {
                    body.push_str(
                        r#"<p class="text-muted text-center">No index ticks inside the trading window.</p>"#,
                    );
                }
            }
        }
    }

    page("Options Chain", &body)
}
