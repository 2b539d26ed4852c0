//! Wires `ByteSource -> Framer -> (RawRecorder) -> Demultiplexer ->
//! ProductWriter -> Compressor` into the concurrency model of SPEC_FULL.md
//! §5: one ingest thread plus a bounded `rayon`-backed writer pool, drained
//! at shutdown via a `CancellationToken`.
//!
//! Grounded on `src/mtgraph.rs`'s thread-per-stage-with-cancellation-token
//! pattern, adapted from "one thread per block" to "one ingest thread,
//! pooled writers", since this pipeline's concurrency model is a single
//! producer plus a worker pool rather than a general block graph.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::byte_source::ByteSource;
use crate::cancel::CancellationToken;
use crate::compressor::Compressor;
use crate::demux::{Completed, Demultiplexer};
use crate::error::Result;
use crate::framer::Framer;
use crate::product_writer::{ProductChannel, ProductWriter};
use crate::raw_recorder::RawRecorder;
use crate::shared_state::SharedState;
use crate::time::{TaiTimestamp, Ydhms};

/// Runtime configuration for one pipeline invocation.
pub struct PipelineConfig {
    /// Root directory for Level 0B products (`EVE_DATA_ROOT`).
    pub data_root: PathBuf,
    /// Whether to record raw telemetry verbatim.
    pub record_raw: bool,
    /// Skip ESP processing.
    pub skip_esp: bool,
    /// Skip MEGS-P processing.
    pub skip_mp: bool,
    /// Treat the byte source as a word-reversed USB block stream.
    pub swapped_sync: bool,
    /// Number of background writer/compressor threads.
    pub writer_threads: usize,
}

/// Owns the ingest thread and the writer worker pool.
pub struct Pipeline {
    config: PipelineConfig,
    state: Arc<SharedState>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Construct a pipeline. Call [`Pipeline::run`] to drive it to
    /// completion (EOF on replay, or cancellation on a live source).
    pub fn new(config: PipelineConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            state: SharedState::new(),
            cancel,
        }
    }

    /// Shared counters/image-snapshot state, for a status consumer.
    pub fn shared_state(&self) -> Arc<SharedState> {
        self.state.clone()
    }

    /// Run the pipeline over `source` until EOF or cancellation.
    pub fn run(&self, source: ByteSource) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.writer_threads)
            .thread_name(|i| format!("product-writer-{i}"))
            .build()
            .map_err(|e| crate::error::Error::Config(format!("writer pool: {e}")))?;

        let mut framer = Framer::new(source, self.config.swapped_sync);
        let mut demux = Demultiplexer::new(self.state.clone(), self.config.skip_esp, self.config.skip_mp);
        let mut recorder = if self.config.record_raw {
            let dir = self.config.data_root.join("raw");
            std::fs::create_dir_all(&dir)?;
            Some(RawRecorder::new(dir))
        } else {
            None
        };

        info!("pipeline starting, data root {}", self.config.data_root.display());

        while !self.cancel.is_canceled() {
            let packet = match framer.next_packet() {
                Ok(Some(p)) => p,
                Ok(None) => {
                    info!("byte source reached end of stream");
                    break;
                }
                Err(e) => {
                    warn!("framing error, resyncing: {e}");
                    continue;
                }
            };

            if let Some(rec) = recorder.as_mut() {
                let tai = TaiTimestamp::from_secondary_header(
                    packet.payload[0..8].try_into().unwrap_or([0; 8]),
                );
                let stamp = Ydhms::from_utc(tai.to_utc());
                let frame = crate::framer::encode_packet(
                    packet.apid,
                    packet.seq_count,
                    &packet.payload,
                    self.config.swapped_sync,
                );
                if let Err(e) = rec.write(&stamp, &frame) {
                    warn!("raw recorder write failed: {e}");
                }
            }

            if let Some(completed) = demux.dispatch(&packet) {
                match &completed {
                    Completed::MegsA(img) => self.state.publish_megs_a(img.clone()),
                    Completed::MegsB(img) => self.state.publish_megs_b(img.clone()),
                    _ => {}
                }
                let data_root = self.config.data_root.clone();
                pool.spawn(move || {
                    let mut writer = ProductWriter::new(data_root, Compressor::default());
                    let result = match completed {
                        Completed::MegsA(img) => writer.write_image(ProductChannel::MegsA, &img),
                        Completed::MegsB(img) => writer.write_image(ProductChannel::MegsB, &img),
                        Completed::MegsP(rows) => writer.write_megs_p(&rows),
                        Completed::Esp(rows) => writer.write_esp(&rows),
                        Completed::Shk(rows) => writer.write_shk(&rows),
                    };
                    if let Err(e) = result {
                        error!("product write failed: {e}");
                    }
                });
            }
        }

        debug!("draining writer pool");
        drop(pool);
        info!("pipeline stopped: {}", self.state.summary_line());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::{encode_packet, APID_ESP, ESP_BODY_LEN, SECONDARY_HEADER_LEN};

    #[test]
    fn runs_to_completion_on_a_small_replay_file() {
        let tmpd = tempfile::tempdir().unwrap();
        let capture = tmpd.path().join("capture.bin");
        let data_root = tmpd.path().join("data");
        std::fs::create_dir_all(&data_root).unwrap();

        let mut raw = Vec::new();
        for seq in 0..3u16 {
            raw.extend(encode_packet(
                APID_ESP,
                seq,
                &vec![0u8; SECONDARY_HEADER_LEN + ESP_BODY_LEN],
                false,
            ));
        }
        std::fs::write(&capture, raw).unwrap();

        let config = PipelineConfig {
            data_root,
            record_raw: false,
            skip_esp: false,
            skip_mp: true,
            swapped_sync: false,
            writer_threads: 1,
        };
        let pipeline = Pipeline::new(config, CancellationToken::new());
        let source = ByteSource::open_file(&capture, None).unwrap();
        pipeline.run(source).unwrap();

        assert_eq!(pipeline.shared_state().esp.received.load(std::sync::atomic::Ordering::Relaxed), 3);
    }
}
