//! Strand-selective partial-match search against the index.
//!
//! Seeds are maximal exact matches. The FM extension runs right to left, so
//! all cursor arithmetic here is measured from the right end of the read:
//! `cursor` is the number of bases already consumed on that side, and a hit
//! with `bw_off = o` and length `l` covers read positions
//! `[rdlen - o - l, rdlen - o)`.

use std::cmp;

use crate::index::{Coord, SaRange, SeedIndex};
use crate::read::Read;

/// Cursor back-off step applied after mid-length hits.
pub const INCREMENT: usize = 10;

/// One maximal-match interval against the index on a given strand.
#[derive(Clone, Debug)]
pub struct PartialHit {
    /// Start of the match, measured from the right end of the read.
    pub bw_off: usize,
    /// Match length in bases; zero when the start position matched nothing.
    pub len: usize,
    /// SA range of the match. Empty for zero-length hits.
    pub range: SaRange,
    /// Reference coordinates, filled lazily by the materializer.
    pub coords: Vec<Coord>,
}

impl PartialHit {
    /// Read span covered by this hit, as `[start, end)` in left-based
    /// read coordinates.
    pub fn span(&self, rdlen: usize) -> (usize, usize) {
        (rdlen - self.bw_off - self.len, rdlen - self.bw_off)
    }

    /// Whether this hit is long enough to vote.
    pub fn qualifies(&self, min_hit_len: usize) -> bool {
        self.len >= min_hit_len
    }
}

/// Ordered hit sequence for one strand of one mate.
///
/// Slots are reused across reads: `reset` rewinds the watermark instead of
/// dropping the hits, so coordinate buffers keep their capacity.
pub struct StrandHits {
    /// Strand this sequence was searched on (forward = true).
    pub fw: bool,
    /// Next unsearched position, measured from the right end of the read.
    pub cursor: usize,
    /// Set once too few bases remain for a qualifying hit.
    pub done: bool,
    hits: Vec<PartialHit>,
    used: usize,
}

impl StrandHits {
    pub fn new(fw: bool) -> Self {
        StrandHits {
            fw: fw,
            cursor: 0,
            done: false,
            hits: Vec::new(),
            used: 0,
        }
    }

    /// Rewind for a new read on the given strand.
    pub fn reset(&mut self, fw: bool) {
        self.fw = fw;
        self.cursor = 0;
        self.done = false;
        self.used = 0;
    }

    /// The hits recorded so far, in emission order.
    pub fn hits(&self) -> &[PartialHit] {
        &self.hits[..self.used]
    }

    /// Mutable access to one recorded hit.
    pub fn hit_mut(&mut self, i: usize) -> &mut PartialHit {
        debug_assert!(i < self.used);
        &mut self.hits[i]
    }

    fn push_hit(&mut self, bw_off: usize, len: usize, range: SaRange) {
        if self.used < self.hits.len() {
            let slot = &mut self.hits[self.used];
            slot.bw_off = bw_off;
            slot.len = len;
            slot.range = range;
            slot.coords.clear();
        } else {
            self.hits.push(PartialHit {
                bw_off: bw_off,
                len: len,
                range: range,
                coords: Vec::new(),
            });
        }
        self.used += 1;
    }
}

fn is_dna(base: u8) -> bool {
    match base {
        b'A' | b'C' | b'G' | b'T' => true,
        _ => false,
    }
}

/// Extend the longest exact match starting at the current cursor and append
/// it to `out`, advancing the cursor past the match (or one base for a miss).
///
/// Exact-match seeding only: the first mismatching or ambiguous base ends
/// the extension. Marks the strand done when fewer than `min_hit_len` bases
/// remain beyond the new cursor.
pub fn partial_search<I: SeedIndex>(index: &I,
                                    seq: &[u8],
                                    min_hit_len: usize,
                                    out: &mut StrandHits) {
    let rdlen = seq.len();
    let start = out.cursor;
    debug_assert!(start < rdlen);

    let mut range = SaRange::full(index.sa_len());
    let mut len = 0;
    // exclusive end of the unmatched prefix; seq[pos - 1] is consumed next
    let mut pos = rdlen - start;

    while pos > 0 {
        let base = seq[pos - 1];
        if !is_dna(base) {
            break;
        }
        let next = index.extend_left(&range, base);
        if next.is_empty() {
            break;
        }
        range = next;
        len += 1;
        pos -= 1;
    }

    let range = if len > 0 { range } else { SaRange::empty() };
    out.push_hit(start, len, range);

    out.cursor = start + cmp::max(len, 1);
    if out.cursor + min_hit_len > rdlen {
        out.done = true;
    }
}

/// Run the searcher interleaved on both strands of one mate.
///
/// Each round advances every unfinished strand by one call. After a call,
/// hits longer than `INCREMENT` adjust the cursor: sub-qualifying ones back
/// off by `INCREMENT` to retry with overlap, qualifying ones skip the base
/// the extension stopped on. A strand whose cursor falls far enough behind
/// the other is abandoned: it cannot win the strand election anymore.
pub fn search_read<I: SeedIndex>(index: &I,
                                 read: &Read,
                                 min_hit_len: usize,
                                 strands: &mut [StrandHits; 2]) {
    strands[0].reset(true);
    strands[1].reset(false);

    let rdlen = read.len();
    if rdlen < min_hit_len {
        strands[0].done = true;
        strands[1].done = true;
        return;
    }

    let max_diff = cmp::max(rdlen / 2, 2 * min_hit_len);

    while !(strands[0].done && strands[1].done) {
        for si in 0..2 {
            if strands[si].done {
                continue;
            }

            partial_search(index, read.strand(strands[si].fw), min_hit_len, &mut strands[si]);

            let hit_len = strands[si].hits().last().map(|h| h.len).unwrap_or(0);
            if hit_len > INCREMENT {
                if hit_len < min_hit_len {
                    strands[si].cursor -= INCREMENT;
                } else {
                    strands[si].cursor += 1;
                }
            }
            if strands[si].cursor + min_hit_len >= rdlen {
                strands[si].done = true;
            }
        }

        if strands[0].cursor > strands[1].cursor + max_diff {
            strands[1].done = true;
        } else if strands[1].cursor > strands[0].cursor + max_diff {
            strands[0].done = true;
        }
    }
}

/// Outcome of the strand election.
#[derive(Clone, Copy, Debug)]
pub struct StrandChoice {
    /// Index of the elected strand (0 = forward, 1 = reverse complement).
    pub strand: usize,
    /// Summed qualifying hit length per strand.
    pub totals: [usize; 2],
    /// Number of qualifying hits per strand.
    pub counts: [usize; 2],
}

/// Elect the strand with the higher mean qualifying-hit length; ties go to
/// the reverse complement.
pub fn select_strand(strands: &[StrandHits; 2], min_hit_len: usize) -> StrandChoice {
    let mut totals = [0usize; 2];
    let mut counts = [0usize; 2];

    for si in 0..2 {
        for hit in strands[si].hits() {
            if hit.qualifies(min_hit_len) {
                totals[si] += hit.len;
                counts[si] += 1;
            }
        }
    }

    let mean = |si: usize| {
        if counts[si] > 0 {
            totals[si] as f64 / counts[si] as f64
        } else {
            0.0
        }
    };

    let strand = if mean(0) > mean(1) { 0 } else { 1 };

    StrandChoice {
        strand: strand,
        totals: totals,
        counts: counts,
    }
}
