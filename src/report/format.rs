//! Text renderings of a result set.

use chrono::Local;
use std::fmt::Write;

use crate::probe::CheckResult;

const URL_DISPLAY_LIMIT: usize = 50;

const HTML_TEMPLATE: &str = include_str!("templates/report.html");

/// Render results as a bordered text table.
pub fn format_table(results: &[CheckResult]) -> String {
    let headers = ["API", "URL", "Status", "Latency (ms)", "Result"];
    let rows: Vec<[String; 5]> = results
        .iter()
        .map(|r| {
            [
                r.name.clone(),
                truncate(&r.url, URL_DISPLAY_LIMIT),
                status_label(r),
                format!("{:.2}", r.latency_ms),
                outcome_label(r),
            ]
        })
        .collect();

    let mut widths = headers.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = |fill: char| -> String {
        let mut line = String::from("+");
        for width in &widths {
            line.extend(std::iter::repeat(fill).take(width + 2));
            line.push('+');
        }
        line
    };
    let render_row = |cells: &[String]| -> String {
        let mut line = String::from("|");
        for (cell, width) in cells.iter().zip(&widths) {
            let pad = width - cell.chars().count();
            line.push(' ');
            line.push_str(cell);
            line.extend(std::iter::repeat(' ').take(pad + 1));
            line.push('|');
        }
        line
    };

    let mut lines = vec![border('-')];
    lines.push(render_row(&headers.map(String::from)));
    lines.push(border('='));
    for row in &rows {
        lines.push(render_row(row));
        lines.push(border('-'));
    }
    if rows.is_empty() {
        lines.push(border('-'));
    }

    lines.join("\n")
}

/// Render results as a pretty-printed JSON array.
pub fn format_json(results: &[CheckResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}

/// Render results as CSV with a header row.
pub fn format_csv(results: &[CheckResult]) -> String {
    let mut out = String::from("API,URL,Status Code,Latency (ms),Success,Error,Timeout\n");
    for r in results {
        let fields = [
            csv_field(&r.name),
            csv_field(&r.url),
            r.status_code.map(|c| c.to_string()).unwrap_or_default(),
            r.latency_ms.to_string(),
            r.success.to_string(),
            csv_field(r.error.as_deref().unwrap_or("")),
            r.timeout.to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Render results as a standalone HTML page.
pub fn format_html(results: &[CheckResult]) -> String {
    let total = results.len();
    let successful = results.iter().filter(|r| r.success).count();
    let failed = total - successful;
    let success_rate = if total > 0 {
        successful as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let status_color = if successful == total {
        "#28a745"
    } else if successful == 0 {
        "#dc3545"
    } else {
        "#ffc107"
    };

    let mut rows = String::new();
    for r in results {
        let (class, label) = if r.timeout {
            ("status-timeout", "TIMEOUT")
        } else if r.error.is_some() {
            ("status-error", "ERROR")
        } else if r.success {
            ("status-ok", "OK")
        } else {
            ("status-fail", "FAIL")
        };
        let status = r.status_code.map(|c| c.to_string()).unwrap_or_else(|| "N/A".to_string());
        let error = r
            .error
            .as_deref()
            .map(|e| format!("<br><small class=\"status-error\">{}</small>", escape_html(e)))
            .unwrap_or_default();

        let _ = writeln!(
            rows,
            "            <tr><td><strong>{name}</strong></td><td><a href=\"{url}\">{url}</a></td><td>{status}</td><td>{latency:.2} ms</td><td><span class=\"{class}\">{label}</span>{error}</td></tr>",
            name = escape_html(&r.name),
            url = escape_html(&r.url),
            status = status,
            latency = r.latency_ms,
            class = class,
            label = label,
            error = error,
        );
    }

    HTML_TEMPLATE
        .replace("{{status_color}}", status_color)
        .replace("{{created}}", &Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
        .replace("{{total}}", &total.to_string())
        .replace("{{successful}}", &successful.to_string())
        .replace("{{failed}}", &failed.to_string())
        .replace("{{success_rate}}", &format!("{:.1}", success_rate))
        .replace("{{rows}}", rows.trim_end())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn status_label(r: &CheckResult) -> String {
    if r.timeout {
        "TIMEOUT".to_string()
    } else if let Some(code) = r.status_code {
        code.to_string()
    } else if r.error.is_some() {
        "ERROR".to_string()
    } else {
        "N/A".to_string()
    }
}

fn outcome_label(r: &CheckResult) -> String {
    let label = if r.success { "OK" } else { "FAIL" };
    match &r.error {
        Some(error) => format!("{} ({})", label, error),
        None => label.to_string(),
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let mut out: String = s.chars().take(limit - 3).collect();
    out.push_str("...");
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
