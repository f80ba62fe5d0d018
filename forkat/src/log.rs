use std::io;
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug)]
pub enum Logging {
    Term,
    File { filepath: PathBuf },
}

/// Installs the global subscriber and a panic hook routed through it.
///
/// Writers are thread-free on purpose: a non-blocking worker thread would
/// not survive a process duplication, and both sides of a split must keep
/// logging. Terminal logs go to stderr; stdout is reserved for reports.
pub fn init(logging: Logging) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_env("FORKAT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    match logging {
        Logging::Term => {
            let layer = fmt::layer().with_writer(io::stderr);
            tracing_subscriber::registry().with(layer).with(env_filter).init();
        }
        Logging::File { filepath } => {
            let layer = fmt::layer().with_writer(file_appender(&filepath)?).with_ansi(false);
            tracing_subscriber::registry().with(layer).with(env_filter).init();
        }
    }

    panic::set_hook(Box::new(|panic_info| {
        error!("{panic_info}");
        eprintln!("{panic_info}");
    }));

    Ok(())
}

fn file_appender(filepath: &Path) -> anyhow::Result<rolling::RollingFileAppender> {
    let folder = filepath.parent().context("invalid log path (parent)")?;
    let file_name = filepath
        .file_name()
        .and_then(|name| name.to_str())
        .context("invalid log path (file_name)")?;

    rolling::Builder::new()
        .rotation(rolling::Rotation::NEVER)
        .filename_prefix(file_name)
        .build(folder)
        .context("couldn't create file appender")
}
