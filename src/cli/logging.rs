//! Logging initialization

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize logging
///
/// With `debug`, everything at debug level goes to a temporary file so the
/// live terminal view is never overwritten; the file path is returned.
/// Otherwise warnings go to stderr, unless `interactive` is set, in which
/// case nothing is logged at all. `RUST_LOG` overrides the level.
pub fn init_logging(debug: bool, interactive: bool) -> Option<PathBuf> {
    if debug {
        let log_path = tempfile::Builder::new()
            .prefix("meshscope-")
            .suffix(".log")
            .tempfile()
            .map(|f| {
                let path = f.path().to_path_buf();
                // Keep the file once the handle is dropped
                std::mem::forget(f);
                path
            })
            .unwrap_or_else(|_| {
                std::env::temp_dir().join(format!("meshscope-{}.log", std::process::id()))
            });

        let file = match std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&log_path)
        {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path.display(), e);
                return None;
            }
        };

        let _ = tracing_subscriber::fmt()
            .with_writer(file)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .try_init();

        Some(log_path)
    } else if interactive {
        // The terminal belongs to the live view
        None
    } else {
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_target(false)
            .without_time()
            .try_init();

        None
    }
}
