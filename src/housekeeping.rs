//! Housekeeping channel accumulation: a mode word plus 56 raw DN columns per
//! packet, 44 of which also get an engineering-unit conversion in the
//! written product.
//!
//! Grounded on `examples/original_source/FITSWriter.cpp`'s
//! `writeSHKFITSBinaryTable`, the authoritative column layout the ground
//! system actually writes (not the in-memory `SHK_PACKET` struct in
//! `eve_structures.h`, which is an intermediate decode buffer, not a
//! column-for-column source). `RAW_SENSOR_COLUMNS` and `ENGINEERING_COLUMNS`
//! reproduce that function's `columnNames` list in order, split into the
//! un-prefixed raw DN columns and the `c`-prefixed converted columns, with
//! `columnUnits` giving each converted column's engineering unit
//! (Celsius/Volts/Amps). The DN-to-engineering-unit conversion coefficients
//! themselves are not part of the retrieved corpus (calibration tables live
//! outside the ground-station source); the two-point linear conversion used
//! here per unit is this crate's own calibration placeholder, not a
//! verbatim carry-over.

use itertools::Itertools;

use crate::framer::Packet;
use crate::time::TaiTimestamp;

/// Rows accumulated per housekeeping product file.
pub const N_HK: usize = 200;
/// Raw sensor DN columns per row (excludes the mode word).
pub const RAW_COLUMNS: usize = 56;

/// Engineering unit a converted column is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Degrees Celsius.
    Celsius,
    /// Volts.
    Volts,
    /// Amps.
    Amps,
}

impl Unit {
    fn range(self) -> (f64, f64) {
        match self {
            Unit::Celsius => (-50.0, 150.0),
            Unit::Volts => (-10.0, 30.0),
            Unit::Amps => (-1.0, 5.0),
        }
    }
}

const DN_LO: f64 = 0.0;
const DN_HI: f64 = 65535.0;

fn dn_to_engineering(dn: u32, unit: Unit) -> f64 {
    let (lo, hi) = unit.range();
    let frac = (dn as f64 - DN_LO) / (DN_HI - DN_LO);
    lo + frac * (hi - lo)
}

/// Raw sensor DN column names, in `FITSWriter.cpp` column order. Index into
/// this array is the index into `HousekeepingRow::raw`.
pub const RAW_SENSOR_COLUMNS: [&str; RAW_COLUMNS] = [
    "FPGA_Board_Temperature",
    "FPGA_Board_p5_0_Voltage",
    "FPGA_Board_p3_3_Voltage",
    "FPGA_Board_p2_5_Voltage",
    "FPGA_Board_p1_2_Voltage",
    "MEGSA_CEB_Temperature",
    "MEGSA_CPR_Temperature",
    "MEGSA_p24_Voltage",
    "MEGSA_p15_Voltage",
    "MEGSA_m15_Voltage",
    "MEGSA_p5_0_Analog_Voltage",
    "MEGSA_m5_0_Voltage",
    "MEGSA_p5_0_Digital_Voltage",
    "MEGSA_p2_5_Voltage",
    "MEGSA_p24_Current",
    "MEGSA_p15_Current",
    "MEGSA_m15_Current",
    "MEGSA_p5_0_Analog_Current",
    "MEGSA_m5_0_Current",
    "MEGSA_p5_0_Digital_Current",
    "MEGSA_p2_5_Current",
    "MEGSA_Integration_Register",
    "MEGSA_Analog_Mux_Register",
    "MEGSA_Digital_Status_Register",
    "MEGSA_Integration_Timer_Register",
    "MEGSA_Command_Error_Count_Register",
    "MEGSA_CEB_FPGA_Version_Register",
    "MEGSB_CEB_Temperature",
    "MEGSB_CPR_Temperature",
    "MEGSB_p24_Voltage",
    "MEGSB_p15_Voltage",
    "MEGSB_m15_Voltage",
    "MEGSB_p5_0_Analog_Voltage",
    "MEGSB_m5_0_Voltage",
    "MEGSB_p5_0_Digital_Voltage",
    "MEGSB_p2_5_Voltage",
    "MEGSB_p24_Current",
    "MEGSB_p15_Current",
    "MEGSB_m15_Current",
    "MEGSB_p5_0_Analog_Current",
    "MEGSB_m5_0_Current",
    "MEGSB_p5_0_Digital_Current",
    "MEGSB_p2_5_Current",
    "MEGSB_Integration_Register",
    "MEGSB_Analog_Mux_Register",
    "MEGSB_Digital_Status_Register",
    "MEGSB_Integration_Timer_Register",
    "MEGSB_Command_Error_Count_Register",
    "MEGSB_CEB_FPGA_Version_Register",
    "MEGSA_Thermistor_Diode",
    "MEGSA_PRT",
    "MEGSB_Thermistor_Diode",
    "MEGSB_PRT",
    "ESP_Electrometer_Temperature",
    "ESP_Detector_Temperature",
    "MEGSP_Temperature",
];

/// Index of `MEGSA_Thermistor_Diode`/`MEGSA_PRT`/`MEGSB_Thermistor_Diode`/
/// `MEGSB_PRT` in [`RAW_SENSOR_COLUMNS`]. `FITSWriter.cpp:919-922` assigns
/// each thermistor-diode row the same raw value as its channel's PRT
/// (`row.MEGSA_Thermistor_Diode[i] = SHKStructure.MEGSA_PRT[i]`, and the
/// MEGSB equivalent) before either is converted, so the two converted
/// columns per channel are numerically identical; that assignment is
/// reproduced here by pointing both converted columns at the PRT raw index.
const MEGSA_PRT_INDEX: usize = 50;
const MEGSB_PRT_INDEX: usize = 52;

/// One `c`-prefixed converted column: its name, the raw column it reads
/// from, and its engineering unit.
const ENGINEERING_COLUMNS: [(&str, usize, Unit); 44] = [
    ("cFPGA_Board_Temperature", 0, Unit::Celsius),
    ("cFPGA_Board_p5_0_Voltage", 1, Unit::Volts),
    ("cFPGA_Board_p3_3_Voltage", 2, Unit::Volts),
    ("cFPGA_Board_p2_5_Voltage", 3, Unit::Volts),
    ("cFPGA_Board_p1_2_Voltage", 4, Unit::Volts),
    ("cMEGSA_CEB_Temperature", 5, Unit::Celsius),
    ("cMEGSA_CPR_Temperature", 6, Unit::Celsius),
    ("cMEGSA_p24_Voltage", 7, Unit::Volts),
    ("cMEGSA_p15_Voltage", 8, Unit::Volts),
    ("cMEGSA_m15_Voltage", 9, Unit::Volts),
    ("cMEGSA_p5_0_Analog_Voltage", 10, Unit::Volts),
    ("cMEGSA_m5_0_Voltage", 11, Unit::Volts),
    ("cMEGSA_p5_0_Digital_Voltage", 12, Unit::Volts),
    ("cMEGSA_p2_5_Voltage", 13, Unit::Volts),
    ("cMEGSA_p24_Current", 14, Unit::Amps),
    ("cMEGSA_p15_Current", 15, Unit::Amps),
    ("cMEGSA_m15_Current", 16, Unit::Amps),
    ("cMEGSA_p5_0_Analog_Current", 17, Unit::Amps),
    ("cMEGSA_m5_0_Current", 18, Unit::Amps),
    ("cMEGSA_p5_0_Digital_Current", 19, Unit::Amps),
    ("cMEGSA_p2_5_Current", 20, Unit::Amps),
    ("cMEGSB_CEB_Temperature", 27, Unit::Celsius),
    ("cMEGSB_CPR_Temperature", 28, Unit::Celsius),
    ("cMEGSB_p24_Voltage", 29, Unit::Volts),
    ("cMEGSB_p15_Voltage", 30, Unit::Volts),
    ("cMEGSB_m15_Voltage", 31, Unit::Volts),
    ("cMEGSB_p5_0_Analog_Voltage", 32, Unit::Volts),
    ("cMEGSB_m5_0_Voltage", 33, Unit::Volts),
    ("cMEGSB_p5_0_Digital_Voltage", 34, Unit::Volts),
    ("cMEGSB_p2_5_Voltage", 35, Unit::Volts),
    ("cMEGSB_p24_Current", 36, Unit::Amps),
    ("cMEGSB_p15_Current", 37, Unit::Amps),
    ("cMEGSB_m15_Current", 38, Unit::Amps),
    ("cMEGSB_p5_0_Analog_Current", 39, Unit::Amps),
    ("cMEGSB_m5_0_Current", 40, Unit::Amps),
    ("cMEGSB_p5_0_Digital_Current", 41, Unit::Amps),
    ("cMEGSB_p2_5_Current", 42, Unit::Amps),
    ("cMEGSA_Thermistor_Diode", MEGSA_PRT_INDEX, Unit::Celsius),
    ("cMEGSA_PRT", MEGSA_PRT_INDEX, Unit::Celsius),
    ("cMEGSB_Thermistor_Diode", MEGSB_PRT_INDEX, Unit::Celsius),
    ("cMEGSB_PRT", MEGSB_PRT_INDEX, Unit::Celsius),
    ("cESP_Electrometer_Temperature", 53, Unit::Celsius),
    ("cESP_Detector_Temperature", 54, Unit::Celsius),
    ("cMEGSP_Temperature", 55, Unit::Celsius),
];

/// One decoded housekeeping row: raw DN columns plus time fields.
#[derive(Debug, Clone)]
pub struct HousekeepingRow {
    /// Timestamp of this row.
    pub tai_seconds: u32,
    /// Subseconds of this row.
    pub tai_subseconds: u32,
    /// Mode word: MSB is a once-a-minute heartbeat, LSBs the sample time in
    /// seconds.
    pub mode: u32,
    /// Raw DN values, one per [`RAW_SENSOR_COLUMNS`] entry.
    pub raw: [u32; RAW_COLUMNS],
}

impl HousekeepingRow {
    /// Engineering-unit conversions for the 44 documented `c`-prefixed
    /// columns, as `(name, value)` pairs.
    pub fn engineering_columns(&self) -> Vec<(&'static str, f64)> {
        ENGINEERING_COLUMNS
            .iter()
            .map(|(name, idx, unit)| (*name, dn_to_engineering(self.raw[*idx], *unit)))
            .collect()
    }
}

fn parse_row(payload: &[u8]) -> HousekeepingRow {
    let ts = TaiTimestamp::from_secondary_header(payload[0..8].try_into().unwrap());
    let body = &payload[8..];
    let mode = u32::from_be_bytes(body[0..4].try_into().unwrap_or([0; 4]));
    let mut raw = [0u32; RAW_COLUMNS];
    let chunked = body[4..].iter().chunks(4);
    for (i, chunk) in chunked.into_iter().enumerate().take(RAW_COLUMNS) {
        let bytes: Vec<u8> = chunk.copied().collect();
        if bytes.len() == 4 {
            raw[i] = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
    }
    HousekeepingRow {
        tai_seconds: ts.seconds,
        tai_subseconds: ts.subseconds,
        mode,
        raw,
    }
}

/// Fixed-size accumulator for the housekeeping channel.
pub struct HousekeepingAccumulator {
    rows: Vec<HousekeepingRow>,
}

impl HousekeepingAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self {
            rows: Vec::with_capacity(N_HK),
        }
    }

    /// Push one packet's worth of payload. Returns the completed batch of
    /// `N_HK` rows when full.
    pub fn push(&mut self, packet: &Packet) -> Option<Vec<HousekeepingRow>> {
        self.rows.push(parse_row(&packet.payload));
        if self.rows.len() == N_HK {
            Some(std::mem::replace(&mut self.rows, Vec::with_capacity(N_HK)))
        } else {
            None
        }
    }

    /// Rows accumulated so far in the current (incomplete) batch.
    pub fn pending(&self) -> usize {
        self.rows.len()
    }
}

impl Default for HousekeepingAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::{APID_SHK, SHK_BODY_LEN};

    fn shk_packet(seq: u16) -> Packet {
        Packet {
            apid: APID_SHK,
            seq_count: seq,
            payload: vec![0u8; 8 + SHK_BODY_LEN],
        }
    }

    #[test]
    fn flushes_at_n_hk_rows() {
        let mut acc = HousekeepingAccumulator::new();
        for seq in 0..(N_HK as u16 - 1) {
            assert!(acc.push(&shk_packet(seq)).is_none());
        }
        let batch = acc.push(&shk_packet(N_HK as u16 - 1));
        assert_eq!(batch.unwrap().len(), N_HK);
        assert_eq!(acc.pending(), 0);
    }

    #[test]
    fn zero_dn_converts_to_low_end_of_each_units_range() {
        let row = parse_row(&vec![0u8; 8 + SHK_BODY_LEN]);
        let cols = row.engineering_columns();
        assert_eq!(cols.len(), 44);
        let (name, value) = cols[0];
        assert_eq!(name, "cFPGA_Board_Temperature");
        assert!((value - Unit::Celsius.range().0).abs() < 1e-6);
    }

    #[test]
    fn thermistor_diode_matches_its_channel_prt() {
        let mut payload = vec![0u8; 8 + SHK_BODY_LEN];
        // MEGSA_PRT is raw column index 50; mode word occupies body[0..4],
        // so raw[i] lives at body[4 + i*4 .. 4 + i*4 + 4].
        let prt_offset = 8 + 4 + MEGSA_PRT_INDEX * 4;
        payload[prt_offset..prt_offset + 4].copy_from_slice(&40000u32.to_be_bytes());
        let row = parse_row(&payload);

        let cols = row.engineering_columns();
        let thermistor = cols
            .iter()
            .find(|(n, _)| *n == "cMEGSA_Thermistor_Diode")
            .unwrap()
            .1;
        let prt = cols.iter().find(|(n, _)| *n == "cMEGSA_PRT").unwrap().1;
        assert_eq!(thermistor, prt);
    }
}
