//! The core metagenomic index used for classification queries.

use bio::alphabets;
use bio::data_structures::bwt::{bwt, less, Less, Occ, BWT};
use bio::data_structures::suffix_array::{suffix_array, SampledSuffixArray, SuffixArray};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::*;

/// Tuple struct so reference indices don't get accidentally handled as taxon IDs.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct RefId(pub u32);

/// Genus identifier, the low 32 bits of a reference taxon code.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct GenusId(pub u32);

/// Species identifier, the high 32 bits of a reference taxon code.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct SpeciesId(pub u32);

/// Decode a reference name into its taxon pair.
///
/// Names carry a decimal 64-bit code with the species in the high 32 bits
/// and the genus in the low 32 bits. Returns `None` for names that don't
/// parse; the classifier skips (and counts) coordinates landing on them.
pub fn parse_taxa(name: &str) -> Option<(GenusId, SpeciesId)> {
    let code = name.trim().parse::<u64>().ok()?;
    Some((GenusId(code as u32), SpeciesId((code >> 32) as u32)))
}

/// Encode a taxon pair as the reference-name code.
pub fn taxon_code(genus: GenusId, species: SpeciesId) -> u64 {
    ((species.0 as u64) << 32) | genus.0 as u64
}

/// Half-open suffix-array range. `bot - top` is the number of reference
/// occurrences of the current query; the range is empty when `bot <= top`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SaRange {
    pub top: usize,
    pub bot: usize,
}

impl SaRange {
    /// The range covering the whole suffix array.
    pub fn full(sa_len: usize) -> Self {
        SaRange { top: 0, bot: sa_len }
    }

    /// A canonical empty range.
    pub fn empty() -> Self {
        SaRange { top: 0, bot: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.bot <= self.top
    }

    /// Number of suffix-array entries covered.
    pub fn size(&self) -> usize {
        self.bot.saturating_sub(self.top)
    }
}

/// One materialized reference position for a seed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Coord {
    /// Which reference sequence the position falls in.
    pub ref_id: RefId,
    /// Offset within that reference.
    pub ref_offset: u64,
    /// Strand flag carried through from the walk request.
    pub fw: bool,
}

/// Reference sequence.
pub type Sequence = Vec<u8>;

/// Sequence database in input order; position becomes the `RefId`.
pub type Database = Vec<(String, Sequence)>;

/// Contract the classifier expects from the index: extend a query by one
/// character, walk an SA range out to concrete reference coordinates, and
/// resolve references to names and taxa. Empty results are never errors;
/// only structural corruption surfaces as `Err`.
pub trait SeedIndex {
    /// Total number of suffix-array entries (the size of the full range).
    fn sa_len(&self) -> usize;

    /// Narrow `range` by prepending `base` to the current query. Returns an
    /// empty range when no occurrences remain.
    fn extend_left(&self, range: &SaRange, base: u8) -> SaRange;

    /// Materialize up to `max_elements` coordinates from `range` into
    /// `coords`. When the range is larger than the cap, the subset is a
    /// random sample drawn from the full range using `rng`.
    fn walk_sa<R: Rng>(&self,
                       range: &SaRange,
                       max_elements: usize,
                       fw: bool,
                       rng: &mut R,
                       coords: &mut Vec<Coord>)
                       -> TaxvoteResult<()>;

    /// Number of reference sequences behind the index.
    fn reference_count(&self) -> usize;

    /// Name of a reference sequence, if the ID is in range.
    fn reference_name(&self, id: RefId) -> Option<&str>;

    /// Decoded taxon pair of a reference, `None` when the name carries none.
    fn taxa(&self, id: RefId) -> Option<(GenusId, SpeciesId)>;
}

/// Metadata about a region of the index, corresponding to a single sequence
/// in the original FASTA database file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
struct Bin {
    /// Original record name.
    name: String,
    /// Taxon pair decoded from the name at build time.
    taxa: Option<(GenusId, SpeciesId)>,
    /// Start position within the concatenated reference sequences.
    start: usize,
    /// End position within the concatenated reference sequences.
    end: usize,
}

/// Metagenomic index over all reference sequences concatenated together:
/// the FM machinery (sampled suffix array, BWT, occurrence tables) plus the
/// metadata Bins to map absolute sequence offsets back to references.
#[derive(Serialize, Deserialize)]
pub struct MGIndex {
    /// Metadata for individual reference sequences.
    bins: Vec<Bin>,
    /// Sampled suffix array used for range extension and coordinate walks.
    pub suffix_array: SampledSuffixArray<BWT, Less, Occ>,
}

impl MGIndex {
    /// Construct a new MGIndex from reference sequences, concatenating them
    /// and recording sequence boundaries and decoded taxa.
    pub fn new(reference: Database, sample_interval: u32, suffix_sample: usize) -> Self {
        info!("Concatenating all reference sequences and recording boundaries...");

        let mut seq = Vec::new();
        let mut bins = Vec::new();
        for (name, reference) in reference {
            let taxa = parse_taxa(&name);
            if taxa.is_none() {
                warn!("Reference name {} does not encode a taxon; its hits will be ignored.",
                      name);
            }

            let bin = Bin {
                name: name,
                taxa: taxa,
                start: seq.len(),
                end: seq.len() + reference.len(),
            };

            seq.extend_from_slice(&reference);
            bins.push(bin);
        }

        // convert the whole reference sequence to the DNA5 alphabet
        for b in &mut seq {
            match *b {
                b'A' | b'C' | b'G' | b'T' | b'N' => (),
                b'a' => *b = b'A',
                b'c' => *b = b'C',
                b'g' => *b = b'G',
                b't' => *b = b'T',
                _ => *b = b'N',
            }
        }
        // suffix array requires a lexicographically smallest sentinel
        seq.push(b'$');
        seq.shrink_to_fit();

        info!("All reference sequences concatenated and boundaries recorded.");

        let alphabet = alphabets::dna::n_alphabet();

        info!("Building suffix array...");
        let sa = suffix_array(&seq);
        info!("Suffix array constructed.");

        info!("Constructing Burrows-Wheeler Transform...");
        let bwt = bwt(&seq, &sa);
        info!("BWT constructed.");

        let less = less(&bwt, &alphabet);
        let occ = Occ::new(&bwt, sample_interval, &alphabet);

        info!("Sampling suffix array at {}", suffix_sample);
        let sampled_suffix_array = sa.sample(&seq, bwt, less, occ, suffix_sample);
        info!("Sampled suffix array constructed");

        MGIndex {
            bins: bins,
            suffix_array: sampled_suffix_array,
        }
    }

    /// Map an absolute offset in the concatenation to (reference, offset).
    fn resolve(&self, position: usize) -> TaxvoteResult<(RefId, u64)> {
        let found = self.bins.binary_search_by(|bin| {
            if position < bin.start {
                Ordering::Greater
            } else if position >= bin.end {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        });

        match found {
            Ok(i) => Ok((RefId(i as u32), (position - self.bins[i].start) as u64)),
            Err(_) => {
                Err(TaxvoteError::IndexCorrupt(format!("offset {} outside all references",
                                                       position)))
            },
        }
    }
}

impl SeedIndex for MGIndex {
    fn sa_len(&self) -> usize {
        self.suffix_array.bwt().len()
    }

    fn extend_left(&self, range: &SaRange, base: u8) -> SaRange {
        if range.is_empty() {
            return SaRange::empty();
        }

        let bwt = self.suffix_array.bwt();
        let less = self.suffix_array.less();
        let occ = self.suffix_array.occ();

        let l = less[base as usize] +
                if range.top > 0 {
            occ.get(bwt, range.top - 1, base)
        } else {
            0
        };
        let r = less[base as usize] + occ.get(bwt, range.bot - 1, base);

        SaRange { top: l, bot: r }
    }

    fn walk_sa<R: Rng>(&self,
                       range: &SaRange,
                       max_elements: usize,
                       fw: bool,
                       rng: &mut R,
                       coords: &mut Vec<Coord>)
                       -> TaxvoteResult<()> {
        if range.bot < range.top {
            return Err(TaxvoteError::IndexCorrupt(format!("inverted SA range {}..{}",
                                                          range.top,
                                                          range.bot)));
        }
        if range.is_empty() || max_elements == 0 {
            return Ok(());
        }

        let entries: Vec<usize> = if range.size() <= max_elements {
            (range.top..range.bot).collect()
        } else {
            // too many occurrences to look at them all; an unbiased sample
            // from the full range stands in for the rest
            rand::sample(rng, range.top..range.bot, max_elements)
        };

        for sa_index in entries {
            let position = match self.suffix_array.get(sa_index) {
                Some(p) => p,
                None => {
                    return Err(TaxvoteError::IndexCorrupt(format!("SA entry {} out of bounds",
                                                                  sa_index)))
                },
            };
            let (ref_id, ref_offset) = self.resolve(position)?;
            coords.push(Coord {
                ref_id: ref_id,
                ref_offset: ref_offset,
                fw: fw,
            });
        }

        Ok(())
    }

    fn reference_count(&self) -> usize {
        self.bins.len()
    }

    fn reference_name(&self, id: RefId) -> Option<&str> {
        self.bins.get(id.0 as usize).map(|b| b.name.as_str())
    }

    fn taxa(&self, id: RefId) -> Option<(GenusId, SpeciesId)> {
        self.bins.get(id.0 as usize).and_then(|b| b.taxa)
    }
}

// this needs to be outside the test module so that other modules' tests can use it
#[cfg(test)]
pub fn random_database(num_genera: u32,
                       num_species_per_genus: u32,
                       min_seq_size: usize,
                       max_seq_size: usize)
                       -> Database {
    use rand::{Rng, XorShiftRng};
    let mut rng = XorShiftRng::new_unseeded();

    let mut to_ret = Vec::new();

    for g in 0..num_genera {
        for s in 0..num_species_per_genus {
            let name = taxon_code(GenusId(g + 1), SpeciesId((g + 1) * 100 + s)).to_string();
            let size = rng.gen_range(min_seq_size, max_seq_size);
            to_ret.push((name, random_sequence(&mut rng, size)));
        }
    }

    to_ret
}

#[cfg(test)]
pub fn random_sequence<R: Rng>(rng: &mut R, len: usize) -> Sequence {
    let mut seq = Vec::with_capacity(len);
    for _ in 0..len {
        let base = match rng.gen::<u8>() % 4 {
            0 => b'A',
            1 => b'C',
            2 => b'G',
            3 => b'T',
            _ => unreachable!(),
        };
        seq.push(base);
    }
    seq
}
