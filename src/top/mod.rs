//! Live summary table for `top`
//!
//! `SummaryTable` is pure state: `record` folds one completed exchange into
//! its row, `sorted_rows` reads the table in display order. Rendering lives
//! in `tui::views::top_table` and never mutates the table.

use std::collections::HashMap;
use std::time::Duration;

use crate::models::CompletedExchange;

/// Shown when an exchange has neither a route nor a path
pub const UNKNOWN_ROUTE: &str = "[UNKNOWN]";

/// Identity of one summary row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    /// Route label or request path
    pub path: String,
    pub method: String,
    /// `None` when sources are hidden
    pub source: Option<String>,
    pub destination: String,
}

/// Aggregated statistics for one group of exchanges
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub key: GroupKey,
    pub count: u64,
    pub best: Duration,
    pub worst: Duration,
    pub last: Duration,
    pub success_count: u64,
    pub failure_count: u64,
}

impl SummaryRow {
    fn new(key: GroupKey, exchange: &CompletedExchange) -> Self {
        let mut row = Self {
            key,
            count: 0,
            best: exchange.latency,
            worst: exchange.latency,
            last: exchange.latency,
            success_count: 0,
            failure_count: 0,
        };
        row.update(exchange);
        row
    }

    fn update(&mut self, exchange: &CompletedExchange) {
        self.count += 1;
        self.best = self.best.min(exchange.latency);
        self.worst = self.worst.max(exchange.latency);
        self.last = exchange.latency;
        if exchange.is_success() {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
    }

    /// Fraction of successful exchanges, in `[0, 1]`
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.count as f64
        }
    }
}

/// Incrementally updated summary of completed exchanges
#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
    index: HashMap<GroupKey, usize>,
    hide_sources: bool,
    group_by_route: bool,
}

impl SummaryTable {
    pub fn new(hide_sources: bool, group_by_route: bool) -> Self {
        Self {
            hide_sources,
            group_by_route,
            ..Default::default()
        }
    }

    pub fn hide_sources(&self) -> bool {
        self.hide_sources
    }

    pub fn group_by_route(&self) -> bool {
        self.group_by_route
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exchanges recorded across all rows
    pub fn total_count(&self) -> u64 {
        self.rows.iter().map(|row| row.count).sum()
    }

    pub fn key_for(&self, exchange: &CompletedExchange) -> GroupKey {
        let route = exchange
            .route
            .as_deref()
            .filter(|route| self.group_by_route && !route.is_empty());
        let path = match route {
            Some(route) => route,
            None if exchange.path.is_empty() => UNKNOWN_ROUTE,
            None => &exchange.path,
        };

        GroupKey {
            path: path.to_string(),
            method: exchange.method.clone(),
            source: (!self.hide_sources).then(|| exchange.source.display_name()),
            destination: exchange.destination.display_name(),
        }
    }

    pub fn record(&mut self, exchange: &CompletedExchange) {
        let key = self.key_for(exchange);
        match self.index.get(&key) {
            Some(&position) => self.rows[position].update(exchange),
            None => {
                self.index.insert(key.clone(), self.rows.len());
                self.rows.push(SummaryRow::new(key, exchange));
            }
        }
    }

    /// Rows by count, highest first; equal counts keep first-seen order
    pub fn sorted_rows(&self) -> Vec<&SummaryRow> {
        let mut rows: Vec<&SummaryRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        rows
    }
}
