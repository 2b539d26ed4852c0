#![warn(missing_docs)]
/*! CCSDS telemetry ingest and Level 0B product pipeline for the EVE rocket
instrument.

A continuous stream of CCSDS space-packet telemetry (replayed from a
capture file, or read live from a USB-attached FPGA board) is reframed,
demultiplexed by application ID, and turned into calibration data
products: two CCD images (MEGS-A, MEGS-B), two photometer time series
(MEGS-P, ESP), and a housekeeping time series. Raw telemetry is also
recorded verbatim, and the program logs to both stderr and a rotating
file.

# Architecture

```text
 [ ByteSource ]
       v
  [ Framer ] --> [ RawRecorder ]
       v
 [ Demultiplexer ]
       v
[ channel processors ] --> [ ProductWriter ] --> [ Compressor ]
```

See [`pipeline`] for how these are wired together.
*/

pub mod archive;
pub mod byte_source;
pub mod cancel;
pub mod cli;
pub mod compressor;
pub mod demux;
pub mod error;
pub mod framer;
pub mod housekeeping;
pub mod image_assembler;
pub mod integration_accumulator;
pub mod log_rotator;
pub mod pipeline;
pub mod product_writer;
pub mod raw_recorder;
pub mod shared_state;
pub mod time;

pub use error::{Error, Result};
