//! Encode state and scanner (ground: `popvcf`'s `encode.cpp`/`encode.hpp`,
//! restructured as an explicit state struct in the style of
//! `submerge-coldb`'s `*Writer` types).

use crate::base69;
use crate::util::{count_commas, is_reserved_sample_byte, parse_pos, ALT_FIELD_INDEX, N_SITE_DATA_FIELDS};
use popvcf_base::Result;
use rapidhash::RapidHashMap;

#[derive(Default)]
struct LineTables {
    map: RapidHashMap<Box<[u8]>, u32>,
    unique: Vec<Box<[u8]>>,
}

impl LineTables {
    fn clear(&mut self) {
        self.map.clear();
        self.unique.clear();
    }
}

pub struct EncodeState {
    no_previous_line: bool,
    field_index: usize,
    in_header: bool,
    contig: Vec<u8>,
    prev_contig: Vec<u8>,
    pos: i64,
    prev_pos: i64,
    /// ALT allele comma count, current and previous line (ground:
    /// `decode.rs`'s `cur_n_alt`/`prev_n_alt`; the encoder must invalidate
    /// `prev` under the same condition the decoder does, or it can emit a
    /// cross-line reference the decoder has already discarded).
    cur_n_alt: u32,
    prev_n_alt: u32,
    cur: LineTables,
    prev: LineTables,
}

impl EncodeState {
    pub fn new() -> Self {
        EncodeState::with_no_previous_line(false)
    }

    /// `no_previous_line` disables cross-line back-references entirely,
    /// forcing every line to be encoded as if it were the first data line
    /// (ground: `encode.cpp`'s `EncodeData::no_previous_line`).
    pub fn with_no_previous_line(no_previous_line: bool) -> Self {
        EncodeState {
            no_previous_line,
            field_index: 0,
            in_header: false,
            contig: Vec::new(),
            prev_contig: Vec::new(),
            pos: 0,
            prev_pos: 0,
            cur_n_alt: 0,
            prev_n_alt: 0,
            cur: LineTables::default(),
            prev: LineTables::default(),
        }
    }

    /// Scans `data[..valid_len]` one field at a time, starting at offset 0
    /// (any bytes preserved across a buffer boundary already sit there).
    /// Appends encoded output to `out`. Returns the offset of the start of
    /// the trailing, not-yet-terminated field, for the driver to preserve
    /// via `SlidingBuffer::compact`.
    pub fn scan(&mut self, data: &[u8], valid_len: usize, out: &mut Vec<u8>) -> Result<usize> {
        let mut begin = 0usize;
        let mut cursor = 0usize;

        while let Some(rel) = memchr::memchr2(b'\t', b'\n', &data[cursor..valid_len]) {
            let term_pos = cursor + rel;
            let terminator = data[term_pos];
            self.handle_field(data, begin, term_pos, terminator, out)?;
            begin = term_pos + 1;
            cursor = begin;
        }

        Ok(begin)
    }

    fn handle_field(
        &mut self,
        data: &[u8],
        begin: usize,
        term_pos: usize,
        terminator: u8,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let field = &data[begin..term_pos];

        if self.field_index == 0 {
            self.in_header = field.first() == Some(&b'#');
            if !self.in_header {
                self.contig.clear();
                self.contig.extend_from_slice(field);
            }
        } else if !self.in_header && self.field_index == 1 {
            self.pos = parse_pos(field);
        } else if !self.in_header && self.field_index == ALT_FIELD_INDEX {
            // Deferred from the POS field: the decoder's own cross-line
            // invalidation is gated on ALT-allele-count match (decode.rs),
            // independent of the position-bucket criterion below. The
            // encoder must clear `prev` under the union of both, or it can
            // emit a `%` back-reference into a table the decoder has
            // already discarded for a reason the encoder never checked.
            self.cur_n_alt = count_commas(field);
            if self.no_previous_line
                || self.contig != self.prev_contig
                || self.pos.div_euclid(10_000) != self.prev_pos.div_euclid(10_000)
                || self.cur_n_alt != self.prev_n_alt
            {
                self.prev.clear();
            }
        }

        if self.in_header || self.field_index < N_SITE_DATA_FIELDS {
            out.extend_from_slice(&data[begin..=term_pos]);
        } else {
            self.encode_sample_field(field, terminator, out);
        }

        if terminator == b'\n' {
            // Header lines never touch `cur`, so swapping it into `prev`
            // here would discard the last data line's tables (invariant 3:
            // `prev_*` updates iff this line was a data line).
            if !self.in_header {
                std::mem::swap(&mut self.cur, &mut self.prev);
                self.cur.clear();
                self.prev_contig.clear();
                self.prev_contig.extend_from_slice(&self.contig);
                self.prev_pos = self.pos;
                self.prev_n_alt = self.cur_n_alt;
            }
            self.field_index = 0;
        } else {
            self.field_index += 1;
        }

        Ok(())
    }

    fn encode_sample_field(&mut self, field: &[u8], terminator: u8, out: &mut Vec<u8>) {
        if let Some(&index) = self.cur.map.get(field) {
            // Duplicate within the current line: a bare base-69 index, no sigil.
            base69::encode(index, out);
            out.push(terminator);
            return;
        }

        let index = self.cur.unique.len() as u32;
        self.cur.map.insert(field.into(), index);
        self.cur.unique.push(field.into());
        debug_assert_eq!(self.cur.map.get(field), Some(&index));

        match self.prev.map.get(field) {
            Some(&prev_index) => {
                out.push(b'%');
                base69::encode(prev_index, out);
                out.push(terminator);
            }
            None => {
                debug_assert!(
                    field.first().map_or(true, |&b| !is_reserved_sample_byte(b)),
                    "literal sample field must not start with a reserved codec byte"
                );
                out.extend_from_slice(field);
                out.push(terminator);
            }
        }
    }
}

impl Default for EncodeState {
    fn default() -> Self {
        EncodeState::new()
    }
}
