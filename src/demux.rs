//! Dispatch a framed packet to its channel processor by APID.
//!
//! Grounded on `examples/original_source/PacketProcessor.cpp`'s per-APID
//! switch statement.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::warn;

use crate::framer::{Packet, APID_ESP, APID_MEGS_A, APID_MEGS_B, APID_MEGS_P, APID_SHK};
use crate::housekeeping::HousekeepingAccumulator;
use crate::image_assembler::{Channel, ImageAssembler};
use crate::integration_accumulator::IntegrationAccumulator;
use crate::shared_state::SharedState;

/// Output of demultiplexing one packet: whichever channel processor
/// produced a completed batch, if any.
pub enum Completed {
    /// A finished MEGS-A image.
    MegsA(crate::image_assembler::ImageRecord),
    /// A finished MEGS-B image.
    MegsB(crate::image_assembler::ImageRecord),
    /// A finished batch of MEGS-P samples.
    MegsP(Vec<crate::integration_accumulator::MegsPSample>),
    /// A finished batch of ESP samples.
    Esp(Vec<crate::integration_accumulator::EspSample>),
    /// A finished batch of housekeeping rows.
    Shk(Vec<crate::housekeeping::HousekeepingRow>),
}

/// Owns one instance of each channel processor and routes packets to them.
pub struct Demultiplexer {
    megs_a: ImageAssembler,
    megs_b: ImageAssembler,
    megs_p: IntegrationAccumulator<crate::integration_accumulator::MegsPSample>,
    esp: IntegrationAccumulator<crate::integration_accumulator::EspSample>,
    shk: HousekeepingAccumulator,
    state: Arc<SharedState>,
    skip_esp: bool,
    skip_mp: bool,
}

impl Demultiplexer {
    /// Create a new demultiplexer, with ESP/MEGS-P processing optionally
    /// disabled per the `--skip-esp`/`--skip-mp` CLI flags.
    pub fn new(state: Arc<SharedState>, skip_esp: bool, skip_mp: bool) -> Self {
        Self {
            megs_a: ImageAssembler::new(Channel::MegsA),
            megs_b: ImageAssembler::new(Channel::MegsB),
            megs_p: IntegrationAccumulator::megs_p(),
            esp: IntegrationAccumulator::esp(),
            shk: HousekeepingAccumulator::new(),
            state,
            skip_esp,
            skip_mp,
        }
    }

    /// Route one packet to its channel processor.
    pub fn dispatch(&mut self, packet: &Packet) -> Option<Completed> {
        match packet.apid {
            APID_MEGS_A => {
                self.state.megs_a.received.fetch_add(1, Ordering::Relaxed);
                let completed = self.megs_a.push(packet)?;
                self.state
                    .megs_a
                    .parity_errors
                    .fetch_add(completed.parity_errors as u64, Ordering::Relaxed);
                self.state
                    .megs_a
                    .gaps
                    .fetch_add(completed.gaps as u64, Ordering::Relaxed);
                Some(Completed::MegsA(completed))
            }
            APID_MEGS_B => {
                self.state.megs_b.received.fetch_add(1, Ordering::Relaxed);
                let completed = self.megs_b.push(packet)?;
                self.state
                    .megs_b
                    .parity_errors
                    .fetch_add(completed.parity_errors as u64, Ordering::Relaxed);
                self.state
                    .megs_b
                    .gaps
                    .fetch_add(completed.gaps as u64, Ordering::Relaxed);
                Some(Completed::MegsB(completed))
            }
            APID_MEGS_P => {
                self.state.megs_p.received.fetch_add(1, Ordering::Relaxed);
                if self.skip_mp {
                    return None;
                }
                self.megs_p.push(packet).map(Completed::MegsP)
            }
            APID_ESP => {
                self.state.esp.received.fetch_add(1, Ordering::Relaxed);
                if self.skip_esp {
                    return None;
                }
                self.esp.push(packet).map(Completed::Esp)
            }
            APID_SHK => {
                self.state.shk.received.fetch_add(1, Ordering::Relaxed);
                self.shk.push(packet).map(Completed::Shk)
            }
            other => {
                warn!("unrecognized apid {other}, dropping");
                self.state.unknown_apid.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_flags_suppress_esp_and_mp_processing() {
        let state = SharedState::new();
        let mut demux = Demultiplexer::new(state.clone(), true, true);

        let esp_pkt = Packet {
            apid: APID_ESP,
            seq_count: 0,
            payload: vec![0u8; 8 + 25],
        };
        assert!(demux.dispatch(&esp_pkt).is_none());
        assert_eq!(state.esp.received.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unknown_apid_increments_counter() {
        let state = SharedState::new();
        let mut demux = Demultiplexer::new(state.clone(), false, false);
        let pkt = Packet {
            apid: 999,
            seq_count: 0,
            payload: vec![],
        };
        assert!(demux.dispatch(&pkt).is_none());
        assert_eq!(state.unknown_apid.load(Ordering::Relaxed), 1);
    }
}
