use std::path::Path;

use backtrace::Backtrace;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sets up logging to stdout, and to a daily rolling file when `log_path` is given.
///
/// Keep the returned guard alive for as long as the program runs, or buffered file logs are lost.
pub fn setup_tracing(log_path: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let (file_layer, guard) = match log_path {
        Some(log_path) => {
            let file_appender = tracing_appender::rolling::daily(log_path, "smartride.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // on debug, stdout gets the pretty format
    #[cfg(debug_assertions)]
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stdout);
    #[cfg(not(debug_assertions))]
    let stdout_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    registry.with(file_layer).with(stdout_layer).init();

    set_panic_hook();

    guard
}

fn set_panic_hook() {
    std::panic::set_hook(Box::new(|panic| {
        let b = Backtrace::new();
        if let Some(location) = panic.location() {
            tracing::error!(
                message = %panic,
                panic.file = location.file(),
                panic.line = location.line(),
                panic.column = location.column(),
                backtrace = ?b,
            );
        } else {
            tracing::error!(message = %panic, backtrace = ?b);
        }
    }));
}
