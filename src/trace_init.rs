use std::path::Path;

/// File written under the directory passed to [`init_tracing`].
pub const TRACE_FILE: &str = "pinyin-trace.jsonl";

/// Filter used when `RUST_LOG` is unset: engine and worker at debug, so
/// resolution steps, migrations and persistence failures all land in the file.
pub const DEFAULT_FILTER: &str = "pinyin_engine=debug,pinyin_core=debug";

#[cfg(feature = "trace")]
mod imp {
    use std::path::Path;
    use std::sync::Once;

    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();

    fn filter() -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(super::DEFAULT_FILTER))
    }

    pub(super) fn init(log_dir: &Path) {
        INIT.call_once(|| {
            let appender = tracing_appender::rolling::never(log_dir, super::TRACE_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // The migration worker logs its final flush during shutdown; the
            // writer has to outlive it.
            std::mem::forget(guard);

            // Span close events carry the timing of merge and demote passes.
            tracing_subscriber::fmt()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_env_filter(filter())
                .init();
        });
    }
}

/// Route engine and migration worker events to [`TRACE_FILE`] under
/// `log_dir` as JSON lines. Only the first call installs a subscriber.
/// Without the `trace` feature this does nothing.
pub fn init_tracing(log_dir: &Path) {
    #[cfg(feature = "trace")]
    imp::init(log_dir);
    #[cfg(not(feature = "trace"))]
    let _ = log_dir;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_names_both_crates() {
        let targets: Vec<&str> = DEFAULT_FILTER
            .split(',')
            .filter_map(|d| d.split('=').next())
            .collect();
        assert_eq!(targets, ["pinyin_engine", "pinyin_core"]);
    }

    #[test]
    fn init_tracing_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        init_tracing(dir.path());
        init_tracing(dir.path());
    }
}
