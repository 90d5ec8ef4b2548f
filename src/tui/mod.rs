//! TUI module
//!
//! Terminal front end for `top`. The live loop selects over three inputs:
//! the quit signal, a render tick and the queue of completed exchanges.
//! Exchanges are folded into the summary table as they arrive; the screen
//! is only redrawn on tick.

mod theme;
pub mod views;

pub use theme::*;
pub use views::TopContext;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::Backend, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::CompletedExchange;
use crate::top::SummaryTable;

/// Input poll interval for the quit-key listener
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Why the live loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveTableExit {
    /// The quit signal fired
    Quit,
    /// The exchange queue closed
    StreamEnded,
}

/// Run the live table until quit or until the exchange queue closes
///
/// Never draws outside a tick, so leaving the loop never leaves a partially
/// updated frame behind.
pub async fn run_live_table<B: Backend>(
    terminal: &mut Terminal<B>,
    exchanges: &mut mpsc::Receiver<CompletedExchange>,
    table: &mut SummaryTable,
    tick: Duration,
    quit: &CancellationToken,
    ctx: &TopContext,
    theme: &Theme,
) -> Result<LiveTableExit> {
    let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = quit.cancelled() => {
                tracing::debug!("Live table quit with {} row(s)", table.len());
                return Ok(LiveTableExit::Quit);
            }
            _ = ticker.tick() => {
                terminal.draw(|f| views::render_top_view(f, f.area(), table, ctx, theme))?;
            }
            next = exchanges.recv() => match next {
                Some(exchange) => table.record(&exchange),
                None => {
                    tracing::debug!(
                        "Exchange queue closed after {} request(s)",
                        table.total_count()
                    );
                    return Ok(LiveTableExit::StreamEnded);
                }
            },
        }
    }
}

/// Take over the terminal, run the live table, then restore the terminal
///
/// The terminal is restored even when the loop fails.
pub async fn run_top(
    mut exchanges: mpsc::Receiver<CompletedExchange>,
    table: &mut SummaryTable,
    tick: Duration,
    ctx: &TopContext,
    theme: &Theme,
) -> Result<LiveTableExit> {
    tracing::debug!("Initializing TUI");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let quit = CancellationToken::new();
    let listener = spawn_quit_listener(quit.clone());

    let result = run_live_table(
        &mut terminal,
        &mut exchanges,
        table,
        tick,
        &quit,
        ctx,
        theme,
    )
    .await;

    quit.cancel();
    let _ = listener.await;
    restore_terminal(&mut terminal)?;

    tracing::debug!("TUI shut down");
    result
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Poll the terminal for a quit key on a blocking thread
///
/// Stops once `quit` is cancelled, by a key press or by the caller.
pub fn spawn_quit_listener(quit: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !quit.is_cancelled() {
            let pressed = match event::poll(INPUT_POLL) {
                Ok(true) => event::read(),
                Ok(false) => continue,
                Err(e) => Err(e),
            };
            match pressed {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press && is_quit_key(&key) => {
                    quit.cancel();
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Failed to read terminal input: {}", e);
                    quit.cancel();
                }
            }
        }
    })
}

/// `q`, `Esc` or `Ctrl-C`
pub fn is_quit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}
