//! Theme and styling definitions
//!
//! Centralizes the colors used by the live table so views never hard-code
//! a color.

use ratatui::style::{Color, Modifier, Style};

/// Colors for the `top` view
#[derive(Debug, Clone)]
pub struct Theme {
    // Header colors
    pub header_context: Color,
    pub header_target: Color,
    pub header_total: Color,

    // Table colors
    pub table_header: Color,
    pub table_normal: Color,

    // Success-rate colors
    pub rate_good: Color,
    pub rate_degraded: Color,
    pub rate_bad: Color,

    // Text colors
    pub text_secondary: Color,
    pub text_label: Color,

    // Footer colors
    pub footer_key: Color,
    pub footer_text: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_context: Color::Yellow,
            header_target: Color::Cyan,
            header_total: Color::Yellow,

            table_header: Color::Cyan,
            table_normal: Color::White,

            rate_good: Color::Green,
            rate_degraded: Color::Yellow,
            rate_bad: Color::Red,

            text_secondary: Color::Gray,
            text_label: Color::Cyan,

            footer_key: Color::Yellow,
            footer_text: Color::White,
        }
    }
}

impl Theme {
    pub fn header_context_style(&self) -> Style {
        Style::default()
            .fg(self.header_context)
            .add_modifier(Modifier::BOLD)
    }

    pub fn header_target_style(&self) -> Style {
        Style::default()
            .fg(self.header_target)
            .add_modifier(Modifier::BOLD)
    }

    pub fn table_header_style(&self) -> Style {
        Style::default()
            .fg(self.table_header)
            .add_modifier(Modifier::BOLD)
    }

    /// Green at 95% and above, yellow at 80% and above, red below
    pub fn success_rate_style(&self, rate: f64) -> Style {
        let color = if rate >= 0.95 {
            self.rate_good
        } else if rate >= 0.8 {
            self.rate_degraded
        } else {
            self.rate_bad
        };
        Style::default().fg(color)
    }

    pub fn footer_key_style(&self) -> Style {
        Style::default().fg(self.footer_key)
    }
}
