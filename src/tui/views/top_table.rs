//! Live traffic table rendering

use crate::top::{SummaryRow, SummaryTable};
use crate::tui::theme::Theme;
use crate::tui::views::helpers::{
    create_themed_block, format_latency, format_percent, render_empty_state, truncate_message,
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table},
};

/// Longest path shown before truncation
const MAX_PATH_CHARS: usize = 60;

/// What the live view is watching, shown in the header
#[derive(Debug, Clone, Default)]
pub struct TopContext {
    pub context: String,
    pub target: String,
}

/// Render the whole `top` screen: header, traffic table and footer
///
/// Reads the table only; recording happens in the live loop.
pub fn render_top_view(
    f: &mut Frame,
    area: Rect,
    table: &SummaryTable,
    ctx: &TopContext,
    theme: &Theme,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, chunks[0], table, ctx, theme);
    render_traffic(f, chunks[1], table, theme);
    render_footer(f, chunks[2], theme);
}

fn render_header(
    f: &mut Frame,
    area: Rect,
    table: &SummaryTable,
    ctx: &TopContext,
    theme: &Theme,
) {
    let line = Line::from(vec![
        Span::raw("Context: "),
        Span::styled(ctx.context.as_str(), theme.header_context_style()),
        Span::raw("  Target: "),
        Span::styled(ctx.target.as_str(), theme.header_target_style()),
        Span::raw("  Requests: "),
        Span::styled(
            table.total_count().to_string(),
            Style::default().fg(theme.header_total),
        ),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn render_traffic(f: &mut Frame, area: Rect, table: &SummaryTable, theme: &Theme) {
    let title = format!("Traffic ({})", table.len());
    if table.is_empty() {
        render_empty_state(
            f,
            area,
            &title,
            "No completed requests yet",
            "Waiting for traffic...",
            theme,
        );
        return;
    }

    let show_source = !table.hide_sources();
    let path_title = if table.group_by_route() { "Route" } else { "Path" };

    let mut header_cells = Vec::with_capacity(9);
    let mut widths = Vec::with_capacity(9);
    if show_source {
        header_cells.push("Source");
        widths.push(Constraint::Percentage(18));
    }
    header_cells.extend(["Destination", "Method", path_title]);
    widths.extend([
        Constraint::Percentage(18),
        Constraint::Length(7),
        Constraint::Min(20),
    ]);
    header_cells.extend(["Count", "Best", "Worst", "Last", "Success"]);
    widths.extend([
        Constraint::Length(7),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(9),
    ]);

    let header = Row::new(header_cells).style(theme.table_header_style());

    // Borders and header row
    let visible_height = (area.height as usize).saturating_sub(3);
    let rows: Vec<Row> = table
        .sorted_rows()
        .into_iter()
        .take(visible_height)
        .map(|row| summary_row(row, show_source, theme))
        .collect();

    let widget = Table::new(rows, widths)
        .header(header)
        .block(create_themed_block(&title, theme))
        .style(Style::default().fg(theme.table_normal));
    f.render_widget(widget, area);
}

fn summary_row<'a>(row: &'a SummaryRow, show_source: bool, theme: &Theme) -> Row<'a> {
    let mut cells = Vec::with_capacity(9);
    if show_source {
        cells.push(Cell::from(row.key.source.clone().unwrap_or_default()));
    }
    let rate = row.success_rate();
    cells.extend([
        Cell::from(row.key.destination.as_str()),
        Cell::from(row.key.method.as_str()),
        Cell::from(truncate_message(&row.key.path, MAX_PATH_CHARS)),
        Cell::from(row.count.to_string()),
        Cell::from(format_latency(row.best)),
        Cell::from(format_latency(row.worst)),
        Cell::from(format_latency(row.last)),
        Cell::from(format_percent(rate)).style(theme.success_rate_style(rate)),
    ]);
    Row::new(cells)
}

fn render_footer(f: &mut Frame, area: Rect, theme: &Theme) {
    let line = Line::from(vec![
        Span::styled("q", theme.footer_key_style()),
        Span::styled(" quit  ", Style::default().fg(theme.footer_text)),
        Span::styled("esc", theme.footer_key_style()),
        Span::styled(" quit", Style::default().fg(theme.footer_text)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}
