//! Streaming codec for a compressed VCF dialect: a base-69 index alphabet
//! over a sliding byte buffer, with intra-line and cross-line sample-field
//! deduplication (ground: `popvcf`'s `encode.cpp`/`decode.cpp`).

mod base69;
mod buffer;
mod decode;
mod driver;
mod encode;
mod ioutil;
mod region;
mod util;

pub use decode::DecodeState;
pub use driver::{run_decode, run_encode, DECODE_BUFFER_CAPACITY, ENCODE_BUFFER_CAPACITY};
pub use encode::EncodeState;
pub use ioutil::{ByteSink, ByteSource, MemSink, MemSource};
pub use region::{parse_region, Region};

pub use popvcf_base::{Error, Result};
