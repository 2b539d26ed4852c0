//! Command-line interface, matching the flag table in SPEC_FULL.md §6.
//!
//! Grounded on `examples/ax25-9600-rx.rs`'s `Opt` struct: same derive
//! style, same repeatable `-v` verbosity flag.

use std::path::PathBuf;

use clap::Parser;

/// EVE rocket telemetry ingest and Level 0B product pipeline.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Opt {
    /// Replay this file instead of opening the live USB source.
    pub input_file: Option<PathBuf>,

    /// Skip ESP channel processing.
    #[arg(long)]
    pub skip_esp: bool,

    /// Skip MEGS-P channel processing.
    #[arg(long)]
    pub skip_mp: bool,

    /// Skip raw-capture recording.
    #[arg(long)]
    pub skip_record: bool,

    /// Insert a small per-packet delay in replay mode.
    #[arg(long)]
    pub slow_replay: bool,

    /// Dump raw USB blocks verbatim, for offline debugging.
    #[arg(long)]
    pub write_binary_rx_buff: bool,

    /// Treat `input_file` as a raw USB block stream rather than a plain
    /// packet capture.
    #[arg(long)]
    pub read_bin_as_usb: bool,

    /// Increase log verbosity. Repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Number of background writer/compressor worker threads.
    #[arg(long, default_value = "4")]
    pub writer_threads: usize,
}
