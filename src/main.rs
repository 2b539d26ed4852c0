/*! CCSDS telemetry ingest and Level 0B product pipeline, command-line
entry point.

```no_run
$ EVE_DATA_ROOT=/data/eve eve_l0b capture.rtlm -v
$ EVE_DATA_ROOT=/data/eve eve_l0b --read-bin-as-usb /dev/eve_usb0
```
*/
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, Log, Metadata, Record};

use eve_l0b::byte_source::ByteSource;
use eve_l0b::cancel::CancellationToken;
use eve_l0b::cli::Opt;
use eve_l0b::log_rotator::LogRotator;
use eve_l0b::pipeline::{Pipeline, PipelineConfig};

const SLOW_REPLAY_PACE: Duration = Duration::from_millis(1);

/// Fans every log record out to stderr and the minute-rotated file sink,
/// so both destinations named in the crate's module docs stay in sync
/// without the `log` facade needing to know about either.
struct CombinedLogger {
    stderr: stderrlog::StdErrLog,
    rotator: LogRotator,
}

impl Log for CombinedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.stderr.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.stderr.log(record);
            self.rotator.log(record);
        }
    }

    fn flush(&self) {
        self.stderr.flush();
        self.rotator.flush();
    }
}

fn data_root() -> Result<PathBuf> {
    let root = std::env::var("EVE_DATA_ROOT")
        .context("EVE_DATA_ROOT must be set to the Level 0B product tree")?;
    let root = PathBuf::from(root);
    let metadata = std::fs::metadata(&root)
        .with_context(|| format!("EVE_DATA_ROOT {} does not exist", root.display()))?;
    anyhow::ensure!(
        metadata.is_dir(),
        "EVE_DATA_ROOT {} is not a directory",
        root.display()
    );
    let probe = root.join(".eve_l0b_write_probe");
    std::fs::write(&probe, b"")
        .with_context(|| format!("EVE_DATA_ROOT {} is not writable", root.display()))?;
    let _ = std::fs::remove_file(&probe);
    Ok(root)
}

fn open_source(opt: &Opt) -> Result<ByteSource> {
    let pace = opt.slow_replay.then_some(SLOW_REPLAY_PACE);
    let source = match &opt.input_file {
        Some(path) if opt.read_bin_as_usb => ByteSource::open_usb(path)?,
        Some(path) if path.extension().map(|e| e == "gz").unwrap_or(false) => {
            ByteSource::open_gzip(path)?
        }
        Some(path) => ByteSource::open_file(path, pace)?,
        None => ByteSource::open_usb(&PathBuf::from("/dev/eve_usb0"))?,
    };
    Ok(source)
}

fn init_logging(opt: &Opt) -> Result<()> {
    let mut stderr = stderrlog::new();
    stderr
        .module(module_path!())
        .module("eve_l0b")
        .quiet(false)
        .verbosity(opt.verbose as usize + 1)
        .timestamp(stderrlog::Timestamp::Second);

    log::set_max_level(log::LevelFilter::Trace);
    log::set_boxed_logger(Box::new(CombinedLogger {
        stderr,
        rotator: LogRotator::new("logs"),
    }))
    .context("installing log sinks")?;
    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    init_logging(&opt)?;

    let data_root = data_root()?;

    let cancel = CancellationToken::new();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("received Ctrl+C, shutting down");
        handler_cancel.cancel();
    })
    .context("installing Ctrl-C handler")?;

    let config = PipelineConfig {
        data_root,
        record_raw: !opt.skip_record,
        skip_esp: opt.skip_esp,
        skip_mp: opt.skip_mp,
        swapped_sync: opt.read_bin_as_usb,
        writer_threads: opt.writer_threads,
    };

    let source = open_source(&opt)?;
    let pipeline = Pipeline::new(config, cancel);
    pipeline.run(source)?;

    info!("{}", pipeline.shared_state().summary_line());
    Ok(())
}
