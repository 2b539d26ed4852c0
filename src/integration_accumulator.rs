//! Per-channel accumulation of ESP / MEGS-P photometer integrations into
//! fixed-size batches ready for product writing.
//!
//! Grounded on `examples/original_source/eve_structures.h`'s
//! `PHOTOMETER_PACKET` / `MEGSP_PACKET` row shapes; the 480-row batch size
//! is fixed from the `photometer_data[512]` buffer's documented fill count
//! ("In 2 minutes there are 480 observations").

use crate::framer::Packet;
use crate::time::TaiTimestamp;

/// Rows accumulated per product file for ESP and MEGS-P.
pub const N_INT: usize = 480;

/// One decoded ESP sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspSample {
    /// Timestamp of this sample.
    pub tai_seconds: u32,
    /// Subseconds of this sample.
    pub tai_subseconds: u32,
    /// Four quad-diode channels.
    pub q: [u16; 4],
    /// Five calibrated-band channels (171, 257, 304, 366, dark).
    pub bands: [u16; 5],
    /// Filter wheel position.
    pub filter_position: u8,
    /// Resolver raw DN.
    pub resolver: u16,
    /// Temperature raw DN.
    pub temperature_dn: u16,
}

/// One decoded MEGS-P sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct MegsPSample {
    /// Timestamp of this sample.
    pub tai_seconds: u32,
    /// Subseconds of this sample.
    pub tai_subseconds: u32,
    /// Lyman-alpha channel raw DN.
    pub lya: u16,
    /// Dark channel raw DN.
    pub dark: u16,
    /// Resolver raw DN.
    pub resolver: u16,
    /// Temperature raw DN.
    pub temperature_dn: u16,
}

fn parse_esp(payload: &[u8]) -> EspSample {
    let body = &payload[8..];
    let u16_at = |i: usize| u16::from_be_bytes([body[i], body[i + 1]]);
    let ts = TaiTimestamp::from_secondary_header(payload[0..8].try_into().unwrap());
    EspSample {
        tai_seconds: ts.seconds,
        tai_subseconds: ts.subseconds,
        q: [u16_at(2), u16_at(4), u16_at(6), u16_at(8)],
        bands: [u16_at(10), u16_at(12), u16_at(14), u16_at(16), u16_at(18)],
        filter_position: body[20],
        resolver: u16_at(21),
        temperature_dn: u16_at(23),
    }
}

fn parse_megs_p(payload: &[u8]) -> MegsPSample {
    let body = &payload[8..];
    let u16_at = |i: usize| u16::from_be_bytes([body[i], body[i + 1]]);
    let ts = TaiTimestamp::from_secondary_header(payload[0..8].try_into().unwrap());
    MegsPSample {
        tai_seconds: ts.seconds,
        tai_subseconds: ts.subseconds,
        lya: u16_at(3),
        dark: u16_at(5),
        resolver: u16_at(7),
        temperature_dn: u16_at(9),
    }
}

/// Generic fixed-size accumulator over one of the photometer sample types.
pub struct IntegrationAccumulator<T> {
    rows: Vec<T>,
    parse: fn(&[u8]) -> T,
}

impl<T> IntegrationAccumulator<T> {
    fn with_parser(parse: fn(&[u8]) -> T) -> Self {
        Self {
            rows: Vec::with_capacity(N_INT),
            parse,
        }
    }

    /// Push one packet's worth of payload. Returns the completed batch of
    /// `N_INT` rows when full.
    pub fn push(&mut self, packet: &Packet) -> Option<Vec<T>> {
        self.rows.push((self.parse)(&packet.payload));
        if self.rows.len() == N_INT {
            Some(std::mem::replace(&mut self.rows, Vec::with_capacity(N_INT)))
        } else {
            None
        }
    }

    /// Rows accumulated so far in the current (incomplete) batch.
    pub fn pending(&self) -> usize {
        self.rows.len()
    }
}

impl IntegrationAccumulator<EspSample> {
    /// Create an accumulator for the ESP channel.
    pub fn esp() -> Self {
        Self::with_parser(parse_esp)
    }
}

impl IntegrationAccumulator<MegsPSample> {
    /// Create an accumulator for the MEGS-P channel.
    pub fn megs_p() -> Self {
        Self::with_parser(parse_megs_p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::APID_ESP;

    fn esp_packet(seq: u16) -> Packet {
        Packet {
            apid: APID_ESP,
            seq_count: seq,
            payload: vec![0u8; 8 + 25],
        }
    }

    #[test]
    fn flushes_at_n_int_rows() {
        let mut acc = IntegrationAccumulator::esp();
        for seq in 0..(N_INT as u16 - 1) {
            assert!(acc.push(&esp_packet(seq)).is_none());
        }
        let batch = acc.push(&esp_packet(N_INT as u16 - 1));
        assert!(batch.is_some());
        assert_eq!(batch.unwrap().len(), N_INT);
        assert_eq!(acc.pending(), 0);
    }
}
