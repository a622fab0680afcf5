//! The stream driver: refill the sliding buffer, run a scanner over it,
//! flush the encoded/decoded output, compact the trailing partial field, and
//! repeat until the source is exhausted (ground: `popvcf`'s `encode.cpp`'s
//! and `decode.cpp`'s top-level `while` loops).

use crate::buffer::SlidingBuffer;
use crate::decode::DecodeState;
use crate::encode::EncodeState;
use popvcf_base::Result;
use std::io::{Read, Write};
use tracing::warn;

/// Default sliding-buffer capacity for encoding: VCF lines are rarely large,
/// so 256 KiB comfortably holds the longest realistic field.
pub const ENCODE_BUFFER_CAPACITY: usize = 256 * 1024;

/// Decoded output tends to be wider (back-references expand to full site
/// text), so the decode buffer is twice the encode buffer's size.
pub const DECODE_BUFFER_CAPACITY: usize = 512 * 1024;

/// Streams `source` through `state`, writing encoded output to `sink`.
pub fn run_encode(
    state: &mut EncodeState,
    source: &mut impl Read,
    sink: &mut impl Write,
) -> Result<()> {
    let mut buf = SlidingBuffer::with_capacity(ENCODE_BUFFER_CAPACITY);
    let mut out = Vec::new();
    let mut preserved = 0usize;

    loop {
        let n = buf.refill(source, preserved)?;
        let valid_len = buf.filled();

        out.clear();
        let trailing = state.scan(buf.bytes(), valid_len, &mut out)?;
        sink.write_all(&out)?;

        if n == 0 {
            if trailing < valid_len {
                warn!(
                    target: "popvcf",
                    bytes = valid_len - trailing,
                    "input ended mid-field; trailing bytes were dropped"
                );
            }
            break;
        }

        preserved = buf.compact(trailing)?;
    }

    sink.flush()?;
    Ok(())
}

/// Streams `source` through `state`, writing decoded output to `sink`.
pub fn run_decode(
    state: &mut DecodeState,
    source: &mut impl Read,
    sink: &mut impl Write,
) -> Result<()> {
    let mut buf = SlidingBuffer::with_capacity(DECODE_BUFFER_CAPACITY);
    let mut out = Vec::new();
    let mut preserved = 0usize;

    loop {
        let n = buf.refill(source, preserved)?;
        let valid_len = buf.filled();

        out.clear();
        let trailing = state.scan(buf.bytes(), valid_len, preserved, &mut out)?;
        sink.write_all(&out)?;

        if n == 0 {
            if trailing < valid_len {
                warn!(
                    target: "popvcf",
                    bytes = valid_len - trailing,
                    "input ended mid-field; trailing bytes were dropped"
                );
            }
            break;
        }

        preserved = buf.compact(trailing)?;
    }

    sink.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ioutil::{MemSink, MemSource};
    use test_log::test;

    #[test]
    fn encode_then_decode_round_trips_a_small_file() {
        let input = "##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\n\
chr1\t100\t.\tA\tT\t.\t.\t.\tGT\t0/1\t1/1\n\
chr1\t101\t.\tA\tT\t.\t.\t.\tGT\t0/1\t0/0\n\
chr1\t20200\t.\tA\tT\t.\t.\t.\tGT\t0/1\t0/0\n";

        let mut encoded = MemSink::new();
        let mut encode_state = EncodeState::new();
        run_encode(
            &mut encode_state,
            &mut MemSource::new(input.as_bytes().to_vec()),
            &mut encoded,
        )
        .unwrap();

        let mut decoded = MemSink::new();
        let mut decode_state = DecodeState::new(None);
        run_decode(
            &mut decode_state,
            &mut MemSource::new(encoded.into_inner()),
            &mut decoded,
        )
        .unwrap();

        assert_eq!(decoded.into_inner(), input.as_bytes());
    }

    #[test]
    fn decode_with_region_filter_keeps_only_matching_lines_and_header() {
        let input = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n\
chr1\t100\t.\tA\tT\t.\t.\t.\tGT\t0/1\n\
chr1\t300\t.\tA\tT\t.\t.\t.\tGT\t0/1\n";

        let mut encoded = MemSink::new();
        let mut encode_state = EncodeState::new();
        run_encode(
            &mut encode_state,
            &mut MemSource::new(input.as_bytes().to_vec()),
            &mut encoded,
        )
        .unwrap();

        let region = crate::region::parse_region("chr1:200-400").unwrap();
        let mut decoded = MemSink::new();
        let mut decode_state = DecodeState::new(Some(region));
        run_decode(
            &mut decode_state,
            &mut MemSource::new(encoded.into_inner()),
            &mut decoded,
        )
        .unwrap();

        let expected = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n\
chr1\t300\t.\tA\tT\t.\t.\t.\tGT\t0/1\n";
        assert_eq!(decoded.into_inner(), expected.as_bytes());
    }

    #[test]
    fn round_trips_a_biallelic_site_followed_by_a_nearby_multiallelic_one() {
        // Same contig, same 10000-position bucket, but the ALT allele count
        // changes between the two lines. The encoder must not emit a
        // cross-line `%` reference the decoder would reject.
        let input = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n\
chr1\t100\t.\tA\tT\t.\t.\t.\tGT\t0/1\n\
chr1\t200\t.\tA\tT,C\t.\t.\t.\tGT\t0/1\n";

        let mut encoded = MemSink::new();
        let mut encode_state = EncodeState::new();
        run_encode(
            &mut encode_state,
            &mut MemSource::new(input.as_bytes().to_vec()),
            &mut encoded,
        )
        .unwrap();

        let mut decoded = MemSink::new();
        let mut decode_state = DecodeState::new(None);
        run_decode(
            &mut decode_state,
            &mut MemSource::new(encoded.into_inner()),
            &mut decoded,
        )
        .unwrap();

        assert_eq!(decoded.into_inner(), input.as_bytes());
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let mut out = MemSink::new();
        let mut state = EncodeState::new();
        run_encode(&mut state, &mut MemSource::new(Vec::new()), &mut out).unwrap();
        assert!(out.into_inner().is_empty());
    }
}
