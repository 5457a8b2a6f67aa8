pub mod cfg;
pub mod cmd;
pub mod log;

/// Prints error together with its causes to stderr
pub fn print_error(err: &(dyn std::error::Error + 'static)) {
    eprintln!("error: {}", err);
    let mut iter = err.source();
    while let Some(cause) = iter {
        eprintln!("caused by: {}", cause);
        iter = cause.source();
    }
}

/// Renders error chain as single line, e.g. for reports
pub fn error_chain(err: &anyhow::Error) -> String {
    err.chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}
