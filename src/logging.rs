// ==========================================
// Logging setup
// ==========================================
// tracing + tracing-subscriber
// Level from RUST_LOG, format from TALHAO_APEX_LOG_FORMAT
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging
///
/// # Environment
/// - RUST_LOG: level filter (default: info)
///   e.g. RUST_LOG=debug or RUST_LOG=talhao_apex=trace
/// - TALHAO_APEX_LOG_FORMAT: `json` for one JSON object per line
///
/// # Example
/// ```no_run
/// use talhao_apex::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("TALHAO_APEX_LOG_FORMAT")
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(false)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .init();
    }
}

/// Initialize logging for tests
///
/// Debug level, captured by the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
