//! Stdout rendering for batch results
//!
//! Tables use the condensed ASCII preset; `wide` adds detail columns. JSON
//! output is the serialized rows, unchanged.

use std::borrow::Cow;

use anyhow::{Context, Result};
use comfy_table::{Table, presets::ASCII_BORDERS_ONLY_CONDENSED};
use serde::Serialize;

use crate::models::{EdgeRow, Endpoint, PodSet, RouteRow, Row, StatRow};
use crate::request::OutputFormat;

/// Shown in place of an empty table
pub const NO_ROWS: &str = "No traffic found.";

/// Longest identity shown in table mode before truncation
const MAX_IDENTITY_WIDTH: usize = 40;

/// Render batch rows in the requested format
///
/// Mixed row kinds render as one table per kind, in stats, edges, routes
/// order.
pub fn render_rows(rows: &[Row], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(rows);
    }
    if rows.is_empty() {
        return Ok(NO_ROWS.to_string());
    }

    let wide = format == OutputFormat::Wide;
    let mut stats = Vec::new();
    let mut edges = Vec::new();
    let mut routes = Vec::new();
    for row in rows {
        match row {
            Row::Stat(r) => stats.push(r),
            Row::Edge(r) => edges.push(r),
            Row::Route(r) => routes.push(r),
        }
    }

    let mut sections = Vec::new();
    if !stats.is_empty() {
        sections.push(stat_table(&stats, wide));
    }
    if !edges.is_empty() {
        sections.push(edge_table(&edges, wide));
    }
    if !routes.is_empty() {
        sections.push(route_table(&routes, wide));
    }
    Ok(sections.join("\n\n"))
}

/// Render discovered endpoints
pub fn render_endpoints(endpoints: &[Endpoint], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(endpoints);
    }
    if endpoints.is_empty() {
        return Ok("No endpoints found.".to_string());
    }

    let mut table = new_table();
    let mut header = vec!["NAMESPACE", "IP", "PORT", "POD"];
    if format == OutputFormat::Wide {
        header.push("SERVICE");
    }
    table.set_header(header);

    for endpoint in endpoints {
        let mut cells = vec![
            endpoint.namespace.clone(),
            endpoint.ip.clone(),
            endpoint.port.to_string(),
            endpoint.pod.clone(),
        ];
        if format == OutputFormat::Wide {
            cells.push(endpoint.service.clone().unwrap_or_else(|| "-".to_string()));
        }
        table.add_row(cells);
    }
    Ok(table.to_string())
}

/// Render a resolved pod set
pub fn render_pods(pods: &PodSet, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        let pods: Vec<_> = pods.iter().collect();
        return to_json(&pods);
    }
    if pods.is_empty() {
        return Ok("No pods found.".to_string());
    }

    let mut table = new_table();
    let mut header = vec!["NAMESPACE", "NAME"];
    if format == OutputFormat::Wide {
        header.extend(["UID", "OWNER"]);
    }
    table.set_header(header);

    for pod in pods.iter() {
        let mut cells = vec![pod.namespace.clone(), pod.name.clone()];
        if format == OutputFormat::Wide {
            cells.push(pod.uid.clone());
            cells.push(pod.owner_uid.clone().unwrap_or_else(|| "-".to_string()));
        }
        table.add_row(cells);
    }
    Ok(table.to_string())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output as JSON")
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);
    table
}

fn stat_table(rows: &[&StatRow], wide: bool) -> String {
    let mut table = new_table();
    let mut header = vec!["NAMESPACE", "NAME", "MESHED", "SUCCESS", "LATENCY_P50"];
    header.extend(["LATENCY_P95", "LATENCY_P99", "TCP_CONN"]);
    if wide {
        header.extend(["KIND", "REQUESTS", "WINDOW"]);
    }
    table.set_header(header);

    for row in rows {
        let mut cells = vec![
            row.namespace.clone(),
            row.name.clone(),
            format!("{}/{}", row.meshed_pods, row.running_pods),
            percent(row.success_rate()),
            millis(row.latency_ms_p50),
            millis(row.latency_ms_p95),
            millis(row.latency_ms_p99),
            optional(row.tcp_open_connections),
        ];
        if wide {
            cells.push(row.kind.clone());
            cells.push((row.success_count + row.failure_count).to_string());
            cells.push(row.time_window.clone());
        }
        table.add_row(cells);
    }
    table.to_string()
}

fn edge_table(rows: &[&EdgeRow], wide: bool) -> String {
    let mut table = new_table();
    let mut header = vec!["SRC", "DST", "SRC_NS", "DST_NS", "SECURED"];
    if wide {
        header.extend(["CLIENT_ID", "SERVER_ID", "MSG"]);
    }
    table.set_header(header);

    for row in rows {
        let secured = row.client_id.is_some() && row.server_id.is_some();
        let mut cells = vec![
            row.src.clone(),
            row.dst.clone(),
            row.src_namespace.clone(),
            row.dst_namespace.clone(),
            if secured { "yes" } else { "no" }.to_string(),
        ];
        if wide {
            for id in [&row.client_id, &row.server_id] {
                let id = id.as_deref().map(|id| truncate(id, MAX_IDENTITY_WIDTH));
                cells.push(id.map_or_else(|| "-".to_string(), Cow::into_owned));
            }
            cells.push(row.no_identity_msg.clone().unwrap_or_default());
        }
        table.add_row(cells);
    }
    table.to_string()
}

fn route_table(rows: &[&RouteRow], wide: bool) -> String {
    let mut table = new_table();
    let mut header = Vec::new();
    if wide {
        header.extend(["NAMESPACE", "NAME"]);
    }
    header.extend(["ROUTE", "SERVICE", "SUCCESS", "RPS", "LATENCY_P50"]);
    header.extend(["LATENCY_P95", "LATENCY_P99"]);
    table.set_header(header);

    for row in rows {
        let mut cells = Vec::new();
        if wide {
            cells.push(row.namespace.clone());
            cells.push(row.name.clone());
        }
        cells.extend([
            row.route.clone(),
            row.authority.clone(),
            percent(row.success_rate()),
            format!("{:.1}rps", row.requests_per_sec),
            millis(row.latency_ms_p50),
            millis(row.latency_ms_p95),
            millis(row.latency_ms_p99),
        ]);
        table.add_row(cells);
    }
    table.to_string()
}

fn percent(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{:.2}%", r * 100.0))
}

fn millis(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |ms| format!("{}ms", ms))
}

fn optional(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn truncate(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        Cow::Borrowed(s)
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        Cow::Owned(format!("{}...", truncated))
    }
}
