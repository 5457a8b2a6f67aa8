use slog::{o, Drain, Logger};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

/// Compact records on stderr, filtered by `RUST_LOG`
fn root_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let format = slog_term::CompactFormat::new(decorator).build();
    let filtered = Mutex::new(slog_envlogger::new(format)).fuse();
    Logger::root(filtered, o!("app" => "hoj"))
}

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Installs global logger. `log` records are forwarded to slog.
/// Calling it twice is no-op.
pub fn setup() {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let scope = slog_scope::set_global_logger(root_logger());
    if let Err(err) = slog_stdlog::init() {
        eprintln!("failed to bridge log facade: {}", err);
    }
    // global logger must live until exit
    std::mem::forget(scope);
}
