//! The decode-side region predicate: `chrom[:begin[-end]]`.

use popvcf_base::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chrom: Vec<u8>,
    pub begin: i64,
    pub end: i64,
}

impl Region {
    pub fn matches(&self, contig: &[u8], pos: i64) -> bool {
        contig == self.chrom.as_slice() && pos >= self.begin && pos <= self.end
    }
}

/// Parses `chrom[:begin[-end]]`. Omitting `begin` matches every position on
/// the chromosome; giving only `begin` matches exactly that position.
pub fn parse_region(s: &str) -> Result<Region> {
    let Some((chrom, rest)) = s.split_once(':') else {
        if s.is_empty() {
            return Err(Error::bad_region(s, "missing chromosome name"));
        }
        return Ok(Region {
            chrom: s.as_bytes().to_vec(),
            begin: 0,
            end: i64::MAX,
        });
    };

    if chrom.is_empty() {
        return Err(Error::bad_region(s, "missing chromosome name"));
    }

    let (begin_str, end_str) = match rest.split_once('-') {
        Some((b, e)) => (b, e),
        None => (rest, rest),
    };

    let begin: i64 = begin_str
        .parse()
        .map_err(|_| Error::bad_region(s, "begin is not a valid position"))?;
    let end: i64 = end_str
        .parse()
        .map_err(|_| Error::bad_region(s, "end is not a valid position"))?;

    if end < begin {
        return Err(Error::bad_region(s, "end is before begin"));
    }

    Ok(Region {
        chrom: chrom.as_bytes().to_vec(),
        begin,
        end,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn chrom_only_matches_every_position() {
        let r = parse_region("chr1").unwrap();
        assert!(r.matches(b"chr1", 0));
        assert!(r.matches(b"chr1", i64::MAX));
        assert!(!r.matches(b"chr2", 0));
    }

    #[test]
    fn single_position() {
        let r = parse_region("chr1:100").unwrap();
        assert_eq!(r.begin, 100);
        assert_eq!(r.end, 100);
        assert!(r.matches(b"chr1", 100));
        assert!(!r.matches(b"chr1", 101));
    }

    #[test]
    fn range() {
        let r = parse_region("chr1:200-400").unwrap();
        assert!(!r.matches(b"chr1", 199));
        assert!(r.matches(b"chr1", 200));
        assert!(r.matches(b"chr1", 400));
        assert!(!r.matches(b"chr1", 401));
    }

    #[test]
    fn rejects_malformed_region() {
        assert!(parse_region("").is_err());
        assert!(parse_region(":100").is_err());
        assert!(parse_region("chr1:abc").is_err());
        assert!(parse_region("chr1:400-200").is_err());
    }
}
