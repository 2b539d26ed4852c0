//! Process-wide telemetry counters and latest-image snapshots, read by the
//! (out-of-scope) GUI collaborator.
//!
//! Grounded on `examples/original_source/ProgramState.hpp`'s atomics-based
//! shared struct; REDESIGN FLAG in SPEC_FULL.md §9 calls for atomics plus
//! per-channel mutexes rather than one coarse global lock, which is what
//! this gives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::image_assembler::ImageRecord;

/// Per-APID receive and error counters.
#[derive(Default)]
pub struct ChannelCounters {
    /// Packets received on this channel.
    pub received: AtomicU64,
    /// Parity errors observed (image channels only).
    pub parity_errors: AtomicU64,
    /// Data gaps (sequence-counter discontinuities) observed.
    pub gaps: AtomicU64,
}

impl ChannelCounters {
    fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.received.load(Ordering::Relaxed),
            self.parity_errors.load(Ordering::Relaxed),
            self.gaps.load(Ordering::Relaxed),
        )
    }
}

/// Process-wide state, shared between the ingest thread and any status
/// consumer (the terminal GUI, or a future monitoring endpoint).
pub struct SharedState {
    /// MEGS-A counters.
    pub megs_a: ChannelCounters,
    /// MEGS-B counters.
    pub megs_b: ChannelCounters,
    /// MEGS-P counters.
    pub megs_p: ChannelCounters,
    /// ESP counters.
    pub esp: ChannelCounters,
    /// Housekeeping counters.
    pub shk: ChannelCounters,
    /// Packets with an unrecognized APID.
    pub unknown_apid: AtomicU64,
    /// Latest completed MEGS-A image, if any.
    pub latest_megs_a: Mutex<Option<ImageRecord>>,
    /// Latest completed MEGS-B image, if any.
    pub latest_megs_b: Mutex<Option<ImageRecord>>,
}

impl SharedState {
    /// Create a fresh, zeroed state wrapped for sharing.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            megs_a: ChannelCounters::default(),
            megs_b: ChannelCounters::default(),
            megs_p: ChannelCounters::default(),
            esp: ChannelCounters::default(),
            shk: ChannelCounters::default(),
            unknown_apid: AtomicU64::new(0),
            latest_megs_a: Mutex::new(None),
            latest_megs_b: Mutex::new(None),
        })
    }

    /// Store the most recently completed MEGS-A image, replacing any
    /// previous snapshot. Never held across I/O.
    pub fn publish_megs_a(&self, image: ImageRecord) {
        *self.latest_megs_a.lock().expect("megs_a lock poisoned") = Some(image);
    }

    /// Store the most recently completed MEGS-B image.
    pub fn publish_megs_b(&self, image: ImageRecord) {
        *self.latest_megs_b.lock().expect("megs_b lock poisoned") = Some(image);
    }

    /// Human-readable one-line summary, e.g. for periodic log output.
    pub fn summary_line(&self) -> String {
        let (a_rx, a_par, a_gap) = self.megs_a.snapshot();
        let (b_rx, b_par, b_gap) = self.megs_b.snapshot();
        format!(
            "megs_a rx={a_rx} parity_err={a_par} gaps={a_gap} | megs_b rx={b_rx} parity_err={b_par} gaps={b_gap} | unknown_apid={}",
            self.unknown_apid.load(Ordering::Relaxed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_zeroed_and_are_shareable() {
        let s = SharedState::new();
        let (rx, par, gap) = s.megs_a.snapshot();
        assert_eq!((rx, par, gap), (0, 0, 0));

        let s2 = s.clone();
        s2.megs_a.received.fetch_add(1, Ordering::Relaxed);
        assert_eq!(s.megs_a.received.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn publishing_an_image_replaces_the_snapshot() {
        let s = SharedState::new();
        s.publish_megs_a(make_test_image());
        assert!(s.latest_megs_a.lock().unwrap().is_some());
    }

    fn make_test_image() -> ImageRecord {
        let mut asm =
            crate::image_assembler::ImageAssembler::new(crate::image_assembler::Channel::MegsA);
        let payload = vec![0u8; 8 + 1754];
        let pkt = crate::framer::Packet {
            apid: crate::framer::APID_MEGS_A,
            seq_count: crate::image_assembler::PACKETS_PER_IMAGE as u16 - 1,
            payload,
        };
        asm.push(&pkt).unwrap()
    }
}
