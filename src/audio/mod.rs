//! Audio encoding, decoding and graphing

mod codec;
mod plot;
mod wav;

pub use codec::{
    scale_to_range, CodecConfig, SignalCodec, StftCodec, DEFAULT_MAX_DB, DEFAULT_MIN_DB,
};
pub use plot::{
    grapher_for, CsvGrapher, Grapher, LogGrapher, PlotFormat, PngGrapher, PNG_CELL_PX,
};
pub use wav::{load_wav, save_wav};
