use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Targets,
    fmt::{
        self,
        format::{Format, Full},
        time::SystemTime,
    },
    prelude::*,
};

const LOG_FILE_NAME: &str = "monzo-driver.log";

/// HTTP plumbing underneath the Monzo and store clients. Their debug output
/// drowns out the driver's own.
const QUIET_TARGETS: [&str; 4] = ["hyper", "hyper_util", "reqwest", "rustls"];

fn event_format() -> Format<Full, SystemTime> {
    fmt::format()
        .with_level(true)
        .with_ansi(false)
        .with_file(true)
        .with_target(true)
        .with_thread_names(true)
}

fn log_filter() -> Targets {
    QUIET_TARGETS
        .iter()
        .fold(Targets::new().with_default(Level::DEBUG), |filter, target| {
            filter.with_target(*target, Level::INFO)
        })
}

/// Logs to stdout, and to a daily rolling file under `base_log_dir` when one
/// is given. The returned guard flushes the file writer on drop, so hold it
/// for the life of the process.
pub fn setup_logging(base_log_dir: &str) -> Option<WorkerGuard> {
    let stdout_layer = fmt::layer().event_format(event_format().with_ansi(true));

    let (file_layer, guard) = if base_log_dir.is_empty() {
        (None, None)
    } else {
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
            base_log_dir,
            LOG_FILE_NAME,
        ));
        let layer = fmt::layer().event_format(event_format()).with_writer(writer);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(log_filter())
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}
