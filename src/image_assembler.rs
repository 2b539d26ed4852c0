//! MEGS-A / MEGS-B CCD image reassembly from 2395-packet sequences.
//!
//! Grounded on `examples/original_source/assemble_image.c`: the pixel-pair
//! placement formula, the two's-complement/odd-parity lookup tables, and the
//! virtual-column offset used to compensate for dark-pixel insertion are
//! carried over unchanged in meaning, re-expressed as bounds-checked slice
//! indexing instead of raw pointer arithmetic. The compile-time lookup
//! tables follow the teacher's `src/hdlc_deframer.rs` idiom (`const fn`
//! table generation) rather than a runtime-built `Vec`.

use log::{debug, trace, warn};

use crate::framer::Packet;
use crate::time::TaiTimestamp;

/// CCD image width in pixels.
pub const WIDTH: usize = 2048;
/// CCD image height in pixels.
pub const HEIGHT: usize = 1024;
/// Packets making up one complete image.
pub const PACKETS_PER_IMAGE: usize = 2395;
/// Pixel pairs carried by a full (non-final) packet, per CCD half.
pub const PIXELS_PER_HALF_VCDU: u32 = 438;
/// Fill value written for pixels never reached by a valid packet.
pub const BAD_PIXEL: u16 = 16384;
/// Virtual-column offset applied to live (non-test-pattern) images, to
/// compensate for dark-pixel insertion splitting spectral lines.
const LIVE_COLUMN_OFFSET: u32 = 2044;

const fn build_twoscomp_table() -> [u16; 16384] {
    let mut table = [0u16; 16384];
    let mut i = 0;
    while i < 16384 {
        // 14-bit two's complement, biased so 0x2000 reads as zero.
        table[i] = ((i as i32 - 0x2000) & 0x3fff) as u16;
        i += 1;
    }
    table
}

const fn build_parity_table() -> [u16; 32768] {
    let mut table = [0u16; 32768];
    let mut i = 0;
    while i < 32768 {
        let mut v = i;
        let mut ones = 0u32;
        while v != 0 {
            ones += v & 1;
            v >>= 1;
        }
        table[i] = (ones & 1) as u16;
        i += 1;
    }
    table
}

static TWOS_COMP: [u16; 16384] = build_twoscomp_table();
static ODD_PARITY: [u16; 32768] = build_parity_table();

/// Which CCD channel an assembler instance handles, for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// MEGS-A.
    MegsA,
    /// MEGS-B.
    MegsB,
}

/// A completed or in-progress CCD image.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// TAI timestamp of the first packet of the frame.
    pub tai: TaiTimestamp,
    /// Receive-side TAI timestamp (ground-station clock), set by the caller.
    pub receive_tai: Option<TaiTimestamp>,
    /// Number of packets folded into this frame so far.
    pub vcdu_count: u32,
    /// Parity failures observed this frame.
    pub parity_errors: u32,
    /// Sequence-counter discontinuities observed this frame (a gap larger
    /// than one between consecutive packets).
    pub gaps: u32,
    /// True if this frame was detected as a hardware/software test pattern.
    pub is_test_pattern: bool,
    /// Row-major pixel buffer, `WIDTH * HEIGHT` elements.
    pub pixels: Vec<u16>,
}

impl ImageRecord {
    fn new(tai: TaiTimestamp) -> Self {
        Self {
            tai,
            receive_tai: None,
            vcdu_count: 0,
            parity_errors: 0,
            gaps: 0,
            is_test_pattern: false,
            pixels: vec![BAD_PIXEL; WIDTH * HEIGHT],
        }
    }

    fn set(&mut self, x: usize, y: usize, value: u16) {
        self.pixels[y * WIDTH + x] = value;
    }
}

/// Per-channel CCD image reassembly state machine.
pub struct ImageAssembler {
    channel: Channel,
    current: Option<ImageRecord>,
    previous_seq: Option<u16>,
}

impl ImageAssembler {
    /// Create a new assembler for `channel`.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            current: None,
            previous_seq: None,
        }
    }

    /// Feed one packet in. Returns a completed image when the frame
    /// finishes (on the next packet's sequence-0 wrap, or on the final
    /// partial packet #2394).
    pub fn push(&mut self, packet: &Packet) -> Option<ImageRecord> {
        let seq = packet.seq_count;
        let mut completed = None;

        let starts_new_frame = match self.previous_seq {
            None => true,
            Some(prev) => seq == 0 || seq <= prev,
        };

        if starts_new_frame {
            if let Some(finished) = self.current.take() {
                completed = Some(finished);
            }
            let tai = TaiTimestamp::from_secondary_header(
                packet.payload[0..8].try_into().unwrap(),
            );
            debug!("{:?}: starting new frame at seq {}", self.channel, seq);
            self.current = Some(ImageRecord::new(tai));
        } else if let Some(prev) = self.previous_seq {
            if seq > prev + 1 {
                self.current.as_mut().expect("frame just started").gaps += 1;
                warn!("{:?}: sequence gap {} -> {}", self.channel, prev, seq);
            }
        }

        self.previous_seq = Some(seq);

        let is_test_pattern = packet.payload.len() >= 12
            && packet.payload[8..12] == [0x00, 0x02, 0x00, 0x01]
            && seq == 0;

        let record = self.current.as_mut().expect("frame just started");
        if seq == 0 {
            record.is_test_pattern = is_test_pattern;
        }

        self.assemble_packet(record, packet, seq);

        if seq as usize == PACKETS_PER_IMAGE - 1 {
            completed = self.current.take();
        }

        completed
    }

    fn assemble_packet(&self, record: &mut ImageRecord, packet: &Packet, seq: u16) {
        // Body begins after the 8-byte secondary header plus a 2-byte mode
        // word; pixel-pair data starts at offset 10.
        let body = &packet.payload[10..];
        let u16p: Vec<u16> = body
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();

        let off = if record.is_test_pattern {
            0
        } else {
            LIVE_COLUMN_OFFSET
        };

        let max_half_j = if seq as usize == PACKETS_PER_IMAGE - 1 {
            // Final packet only carries 14 bytes of real pixel-pair data
            // (7 words) once the mode word's 2 bytes are excluded.
            7usize.min(u16p.len())
        } else {
            u16p.len()
        };

        let src_seq_times_half_vcdu = seq as u32 * PIXELS_PER_HALF_VCDU;

        for half_j in 0..max_half_j {
            let pixval16 = u16p[half_j];
            let jrel = half_j as u32;

            let (pix_val, parity_ok) = if !record.is_test_pattern {
                let twos = TWOS_COMP[(pixval16 & 0x3fff) as usize];
                let parity = ODD_PARITY[(pixval16 & 0x7fff) as usize];
                let frame_bit = (pixval16 >> 15) & 0x01;
                (twos, parity == frame_bit)
            } else {
                let raw = pixval16 & 0x3fff;
                (raw, true)
            };

            if !parity_ok {
                record.parity_errors += 1;
                trace!("{:?}: parity error at seq {} jrel {}", self.channel, seq, jrel);
                continue;
            }

            let (kj, ki) = if jrel & 1 == 0 {
                let kk = src_seq_times_half_vcdu + (jrel >> 1);
                let kj = kk >> 11;
                let ki = (kk + off) & (WIDTH as u32 - 1);
                (kj, ki)
            } else {
                let kk = src_seq_times_half_vcdu + ((jrel - 1) >> 1);
                let kj = (HEIGHT as u32 - 1) - (kk >> 11);
                let ki = (kk + off) & (WIDTH as u32 - 1);
                (kj, ki)
            };

            if (kj as usize) < HEIGHT && (ki as usize) < WIDTH {
                record.set(ki as usize, kj as usize, pix_val);
            } else {
                warn!(
                    "{:?}: pixel placement out of bounds kj={kj} ki={ki} seq={seq}",
                    self.channel
                );
            }
        }

        // vcdu_count tracks packets folded in, for completeness reporting.
        let r = record;
        r.vcdu_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(seq: u16, test_pattern: bool) -> Packet {
        let mut payload = vec![0u8; 8 + 1754];
        if seq == 0 && test_pattern {
            payload[8] = 0x00;
            payload[9] = 0x02;
            payload[10] = 0x00;
            payload[11] = 0x01;
        }
        Packet {
            apid: crate::framer::APID_MEGS_A,
            seq_count: seq,
            payload,
        }
    }

    #[test]
    fn twoscomp_table_biases_zero_at_0x2000() {
        assert_eq!(TWOS_COMP[0x2000], 0);
    }

    #[test]
    fn parity_table_matches_bit_count_parity() {
        assert_eq!(ODD_PARITY[0], 0);
        assert_eq!(ODD_PARITY[1], 1);
        assert_eq!(ODD_PARITY[3], 0);
    }

    #[test]
    fn frame_completes_on_sequence_wrap() {
        let mut asm = ImageAssembler::new(Channel::MegsA);
        assert!(asm.push(&packet(0, false)).is_none());
        for seq in 1..10 {
            assert!(asm.push(&packet(seq, false)).is_none());
        }
        // Wrapping back to 0 closes the first frame.
        let completed = asm.push(&packet(0, false));
        assert!(completed.is_some());
        assert_eq!(completed.unwrap().vcdu_count, 10);
    }

    #[test]
    fn detects_test_pattern_marker_on_first_packet() {
        let mut asm = ImageAssembler::new(Channel::MegsA);
        asm.push(&packet(0, true));
        assert!(asm.current.as_ref().unwrap().is_test_pattern);
    }

    #[test]
    fn places_known_pixel_word_at_expected_column() {
        let mut asm = ImageAssembler::new(Channel::MegsA);
        let mut payload = vec![0u8; 8 + 1754];
        // Mode word at offset 8..10, deliberately nonzero to prove it is
        // skipped rather than decoded as a pixel.
        payload[8] = 0xBE;
        payload[9] = 0xEF;
        // First real pixel-pair word, offset 10..12: raw 0 recenters to
        // 8192 and lands at (LIVE_COLUMN_OFFSET, 0) for seq 0, jrel 0.
        payload[10] = 0x00;
        payload[11] = 0x00;
        let pkt = Packet {
            apid: crate::framer::APID_MEGS_A,
            seq_count: 0,
            payload,
        };
        asm.push(&pkt);
        let record = asm.current.as_ref().unwrap();
        assert_eq!(record.pixels[LIVE_COLUMN_OFFSET as usize], 8192);
    }

    #[test]
    fn final_partial_packet_completes_the_frame() {
        let mut asm = ImageAssembler::new(Channel::MegsA);
        asm.push(&packet(0, false));
        for seq in 1..(PACKETS_PER_IMAGE as u16 - 1) {
            asm.push(&packet(seq, false));
        }
        let completed = asm.push(&packet(PACKETS_PER_IMAGE as u16 - 1, false));
        assert!(completed.is_some());
    }
}
