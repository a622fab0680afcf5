//! Decode state and scanner (ground: `popvcf`'s `decode.cpp`/`decode.hpp`,
//! mirroring `encode.rs`'s state-struct shape).

use crate::base69;
use crate::region::Region;
use crate::util::{count_commas, is_reserved_sample_byte, parse_pos, ALT_FIELD_INDEX, N_SITE_DATA_FIELDS};
use popvcf_base::{Error, Result};
use rapidhash::RapidHashMap;

#[derive(Default)]
struct LineTables {
    map: RapidHashMap<Box<[u8]>, u32>,
    unique: Vec<Box<[u8]>>,
    /// `col_to_uid[k]` is the `unique` index the sample at column `k`
    /// resolved to on this line; the next line's `$`/`&` tokens at the same
    /// column look it up here.
    col_to_uid: Vec<u32>,
}

impl LineTables {
    fn clear(&mut self) {
        self.map.clear();
        self.unique.clear();
        self.col_to_uid.clear();
    }
}

pub struct DecodeState {
    field_index: usize,
    in_header: bool,
    in_region: bool,
    region: Option<Region>,
    contig: Vec<u8>,
    pos: i64,
    /// ALT comma count carried across a buffer boundary that split the ALT
    /// field itself (ground: `decode.cpp`'s `stored_alt`).
    stored_alt: u32,
    cur_n_alt: u32,
    prev_n_alt: u32,
    cur: LineTables,
    prev: LineTables,
}

impl DecodeState {
    pub fn new(region: Option<Region>) -> Self {
        DecodeState {
            field_index: 0,
            in_header: false,
            in_region: true,
            region,
            contig: Vec::new(),
            pos: 0,
            stored_alt: 0,
            cur_n_alt: 0,
            prev_n_alt: 0,
            cur: LineTables::default(),
            prev: LineTables::default(),
        }
    }

    /// Scans `data[..valid_len]`, starting at offset 0. `new_data_start` is
    /// the offset at which bytes newly read by the most recent `refill`
    /// begin (i.e. the `preserved` length passed to it); it lets the ALT
    /// comma tally skip bytes it has already counted into `stored_alt`.
    /// Appends decoded output to `out`. Returns the offset of the trailing,
    /// not-yet-terminated field for the driver to preserve.
    pub fn scan(
        &mut self,
        data: &[u8],
        valid_len: usize,
        new_data_start: usize,
        out: &mut Vec<u8>,
    ) -> Result<usize> {
        let mut begin = 0usize;
        let mut cursor = 0usize;

        while let Some(rel) = memchr::memchr2(b'\t', b'\n', &data[cursor..valid_len]) {
            let term_pos = cursor + rel;
            let terminator = data[term_pos];
            self.handle_field(data, begin, term_pos, terminator, new_data_start, out)?;
            begin = term_pos + 1;
            cursor = begin;
        }

        if !self.in_header && self.field_index == ALT_FIELD_INDEX && begin < valid_len {
            let suffix_start = begin.max(new_data_start);
            self.stored_alt += count_commas(&data[suffix_start..valid_len]);
        }

        Ok(begin)
    }

    fn handle_field(
        &mut self,
        data: &[u8],
        begin: usize,
        term_pos: usize,
        terminator: u8,
        new_data_start: usize,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let field = &data[begin..term_pos];

        if self.field_index == 0 {
            self.in_header = field.first() == Some(&b'#');
            if self.in_header {
                // Headers always pass through, regardless of any region filter.
                self.in_region = true;
                out.extend_from_slice(&data[begin..=term_pos]);
            } else {
                self.contig.clear();
                self.contig.extend_from_slice(field);
                // Emission is deferred until POS is known (next field).
            }
        } else if self.in_header {
            out.extend_from_slice(&data[begin..=term_pos]);
        } else if self.field_index == 1 {
            self.pos = parse_pos(field);
            self.in_region = match &self.region {
                Some(r) => r.matches(&self.contig, self.pos),
                None => true,
            };
            if self.in_region {
                out.extend_from_slice(&self.contig);
                out.push(b'\t');
                out.extend_from_slice(&data[begin..=term_pos]);
            }
        } else if self.field_index == ALT_FIELD_INDEX {
            let suffix_start = begin.max(new_data_start);
            let commas = count_commas(&data[suffix_start..term_pos]);
            self.cur_n_alt = self.stored_alt + commas;
            self.stored_alt = 0;
            if self.cur_n_alt != self.prev_n_alt {
                self.prev.clear();
            }
            if self.in_region {
                out.extend_from_slice(&data[begin..=term_pos]);
            }
        } else if self.field_index < N_SITE_DATA_FIELDS {
            if self.in_region {
                out.extend_from_slice(&data[begin..=term_pos]);
            }
        } else {
            self.decode_sample_field(field, terminator, out)?;
        }

        if terminator == b'\n' {
            // Header lines never touch `cur` (they pass through verbatim),
            // so swapping it into `prev` here would erase the last data
            // line's tables (invariant 3: `prev_*` updates iff this line
            // was a data line).
            if !self.in_header {
                std::mem::swap(&mut self.cur, &mut self.prev);
                self.cur.clear();
                self.prev_n_alt = self.cur_n_alt;
            }
            self.field_index = 0;
        } else {
            self.field_index += 1;
        }

        Ok(())
    }

    fn decode_sample_field(&mut self, field: &[u8], terminator: u8, out: &mut Vec<u8>) -> Result<()> {
        let k = self.cur.col_to_uid.len();

        let identity: Box<[u8]> = match field.first().copied() {
            Some(b'$') => {
                let prev_uid = self.resolve_prev_col(k)?;
                let identity = self.prev_identity(prev_uid)?;
                let new_uid = self.cur.unique.len() as u32;
                self.cur.map.insert(identity.clone(), new_uid);
                self.cur.unique.push(identity.clone());
                self.cur.col_to_uid.push(new_uid);
                identity
            }
            Some(b'&') => {
                let prev_uid = self.resolve_prev_col(k)?;
                let identity = self.prev_identity(prev_uid)?;
                let existing_uid = *self.cur.map.get(identity.as_ref()).ok_or_else(|| {
                    Error::bad_token(k, "& token has no matching field earlier in this line")
                })?;
                self.cur.col_to_uid.push(existing_uid);
                identity
            }
            Some(b'%') => {
                let (prev_uid, _consumed) = base69::decode(&field[1..])?;
                let identity = self.prev_identity(prev_uid)?;
                let new_uid = self.cur.unique.len() as u32;
                self.cur.map.insert(identity.clone(), new_uid);
                self.cur.unique.push(identity.clone());
                self.cur.col_to_uid.push(new_uid);
                identity
            }
            Some(b) if base69::is_digit(b) => {
                let (index, _consumed) = base69::decode(field)?;
                let identity = self
                    .cur
                    .unique
                    .get(index as usize)
                    .ok_or_else(|| Error::bad_token(k, "bare index is out of range for the current line"))?
                    .clone();
                self.cur.col_to_uid.push(index);
                identity
            }
            _ => {
                debug_assert!(
                    field.first().map_or(true, |&b| !is_reserved_sample_byte(b)),
                    "literal sample field must not start with a reserved codec byte"
                );
                let identity: Box<[u8]> = field.into();
                let new_uid = self.cur.unique.len() as u32;
                self.cur.map.insert(identity.clone(), new_uid);
                self.cur.unique.push(identity.clone());
                self.cur.col_to_uid.push(new_uid);
                identity
            }
        };

        if self.in_region {
            out.extend_from_slice(&identity);
            out.push(terminator);
        }

        Ok(())
    }

    fn resolve_prev_col(&self, k: usize) -> Result<u32> {
        self.prev.col_to_uid.get(k).copied().ok_or_else(|| {
            Error::bad_token(k, "$/& token references a column absent from the previous line")
        })
    }

    fn prev_identity(&self, uid: u32) -> Result<Box<[u8]>> {
        self.prev
            .unique
            .get(uid as usize)
            .cloned()
            .ok_or_else(|| Error::bad_token(uid as usize, "back-reference index out of range for the previous line"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::region::parse_region;
    use test_log::test;

    fn decode_all(state: &mut DecodeState, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let consumed = state.scan(input, input.len(), 0, &mut out).unwrap();
        assert_eq!(consumed, input.len(), "input must end on a line boundary");
        out
    }

    // Genotype-style tokens: real sample text always starts with a digit or
    // `.`, both below the base-69 alphabet's `:` floor, so it never collides
    // with a back-reference sigil or digit.
    fn site(samples: &str) -> String {
        format!("chr1\t100\t.\tA\tT\t.\t.\t.\tGT\t{samples}\n")
    }

    #[test]
    fn header_lines_pass_through_verbatim() {
        let mut state = DecodeState::new(None);
        let input = b"##fileformat=VCFv4.2\n#CHROM\tPOS\tID\n";
        assert_eq!(decode_all(&mut state, input), input);
    }

    #[test]
    fn mid_stream_header_line_does_not_erase_the_previous_data_line_table() {
        let mut state = DecodeState::new(None);
        let mut out = Vec::new();
        let line1 = site("0/1\t1/1");
        let header = "##extra-header-mid-stream\n";
        let line2 = site("%:\t0/0");

        state.scan(line1.as_bytes(), line1.len(), 0, &mut out).unwrap();
        out.clear();
        state.scan(header.as_bytes(), header.len(), 0, &mut out).unwrap();
        assert_eq!(out, header.as_bytes());

        out.clear();
        state.scan(line2.as_bytes(), line2.len(), 0, &mut out).unwrap();
        assert_eq!(out, site("0/1\t0/0").as_bytes());
    }

    #[test]
    fn literal_fields_pass_through() {
        let mut state = DecodeState::new(None);
        let input = site("0/1\t1/1");
        assert_eq!(decode_all(&mut state, input.as_bytes()), input.as_bytes());
    }

    #[test]
    fn intra_line_bare_index_resolves_to_earlier_field() {
        let mut state = DecodeState::new(None);
        let input = site("0/0\t1/1\t:");
        assert_eq!(
            decode_all(&mut state, input.as_bytes()),
            site("0/0\t1/1\t0/0").as_bytes()
        );
    }

    #[test]
    fn cross_line_percent_resolves_against_previous_line() {
        let mut state = DecodeState::new(None);
        let mut out = Vec::new();
        let line1 = site("0/1\t1/1");
        let line2 = site("%:\t0/0");
        state.scan(line1.as_bytes(), line1.len(), 0, &mut out).unwrap();
        out.clear();
        state.scan(line2.as_bytes(), line2.len(), 0, &mut out).unwrap();
        assert_eq!(out, site("0/1\t0/0").as_bytes());
    }

    #[test]
    fn cross_line_dollar_resolves_each_column_independently() {
        let mut state = DecodeState::new(None);
        let mut out = Vec::new();
        let line1 = site("0/1\t1/1");
        state.scan(line1.as_bytes(), line1.len(), 0, &mut out).unwrap();

        out.clear();
        let line2 = site("$\t$");
        state.scan(line2.as_bytes(), line2.len(), 0, &mut out).unwrap();
        assert_eq!(out, site("0/1\t1/1").as_bytes());
    }

    #[test]
    fn ampersand_resolves_to_a_value_already_seen_this_line() {
        let mut state = DecodeState::new(None);
        let mut out = Vec::new();
        let line1 = site("0/1\t0/1");
        state.scan(line1.as_bytes(), line1.len(), 0, &mut out).unwrap();

        out.clear();
        // Column 0 pulls "0/1" in via `$`; column 1's previous value is the
        // same text, already present in this line's table, so `&` applies.
        let line2 = site("$\t&");
        state.scan(line2.as_bytes(), line2.len(), 0, &mut out).unwrap();
        assert_eq!(out, site("0/1\t0/1").as_bytes());
    }

    #[test]
    fn region_filter_suppresses_data_lines_outside_range() {
        let region = parse_region("chr1:200-400").unwrap();
        let mut state = DecodeState::new(Some(region));
        let header = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n";
        let inside = "chr1\t300\t.\tA\tT\t.\t.\t.\tGT\t0/1\n";
        let outside = "chr1\t100\t.\tA\tT\t.\t.\t.\tGT\t0/1\n";

        let mut out = Vec::new();
        state.scan(header.as_bytes(), header.len(), 0, &mut out).unwrap();
        assert_eq!(out, header.as_bytes());

        out.clear();
        state.scan(outside.as_bytes(), outside.len(), 0, &mut out).unwrap();
        assert!(out.is_empty());

        out.clear();
        state.scan(inside.as_bytes(), inside.len(), 0, &mut out).unwrap();
        assert_eq!(out, inside.as_bytes());
    }

    #[test]
    fn differing_alt_count_clears_cross_line_table() {
        let mut state = DecodeState::new(None);
        let mut out = Vec::new();
        let line1 = "chr1\t100\t.\tA\tT,C\t.\t.\t.\tGT\t0/1\n";
        let line2 = "chr1\t101\t.\tA\tT\t.\t.\t.\tGT\t$\n";
        state.scan(line1.as_bytes(), line1.len(), 0, &mut out).unwrap();
        out.clear();
        // ALT allele count differs (2 vs 1) from line1, so the previous
        // line's table was cleared and the `$` token has nothing to resolve.
        let err = state.scan(line2.as_bytes(), line2.len(), 0, &mut out).unwrap_err();
        assert!(matches!(err, Error::BadToken { .. }));
    }

    #[test]
    fn bad_percent_index_is_an_error() {
        let mut state = DecodeState::new(None);
        let mut out = Vec::new();
        let line1 = site("0/1\t1/1");
        state.scan(line1.as_bytes(), line1.len(), 0, &mut out).unwrap();
        out.clear();
        let line2 = site("%zzzzzzzz\t0/0");
        assert!(state.scan(line2.as_bytes(), line2.len(), 0, &mut out).is_err());
    }
}
