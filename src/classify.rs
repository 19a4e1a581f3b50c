//! The classifier kernel: strand election, bounded coordinate
//! materialization, taxon voting, and report emission.

use rand::Rng;
use std::cmp::Ordering;

use crate::error::*;
use crate::index::{GenusId, SeedIndex, SpeciesId};
use crate::metrics::ClassifyMetrics;
use crate::read::Read;
use crate::search::{search_read, select_strand, PartialHit, StrandHits};
use crate::tally::{seed_weight, GenusMap};

/// Which taxa make it into the per-read report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportMode {
    /// Every (genus, species) with at least one vote, in insertion order.
    PerSpecies,
    /// Only the species breakdown of the genera tied at the maximum
    /// genus weight.
    TopGenus,
}

/// Classification parameters fixed at classifier construction.
#[derive(Clone, Copy, Debug)]
pub struct ClassifyParams {
    /// Minimum seed length allowed to vote.
    pub min_hit_len: usize,
    /// Cap on reference coordinates materialized per read (or pair).
    pub max_genome_hits: usize,
    /// Report emission mode.
    pub report: ReportMode,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        ClassifyParams {
            min_hit_len: 22,
            max_genome_hits: 40,
            report: ReportMode::PerSpecies,
        }
    }
}

/// One reported taxon assignment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TaxReport {
    pub genus: GenusId,
    pub species: SpeciesId,
    /// Genus weight plus species weight at emission time.
    pub score: u64,
}

/// Seeds are processed cheapest-first: small SA ranges are quick to walk and
/// pinpoint few references, so their votes land before any expensive range
/// is touched and the dominance bound gets a chance to fire early. Length
/// breaks ties, longest first.
fn hit_order(a: &PartialHit, b: &PartialHit) -> Ordering {
    a.range.size().cmp(&b.range.size()).then(b.len.cmp(&a.len))
}

/// A classifier owns every piece of per-read scratch state; classifying a
/// read clears the buffers rather than reallocating them. One instance per
/// worker thread, nothing shared.
pub struct Classifier<'idx, I, R> {
    index: &'idx I,
    params: ClassifyParams,
    rng: R,
    genus_map: GenusMap,
    strands: [StrandHits; 2],
    order: Vec<usize>,
    metrics: ClassifyMetrics,
}

impl<'idx, I: SeedIndex, R: Rng> Classifier<'idx, I, R> {
    /// Build a classifier over `index` with a private PRNG stream.
    pub fn new(index: &'idx I, params: ClassifyParams, rng: R) -> Self {
        assert!(params.max_genome_hits >= 1,
                "coordinate budget must allow at least one hit");

        Classifier {
            index: index,
            params: params,
            rng: rng,
            genus_map: GenusMap::new(),
            strands: [StrandHits::new(true), StrandHits::new(false)],
            order: Vec::new(),
            metrics: ClassifyMetrics::default(),
        }
    }

    /// Counters accumulated so far.
    pub fn metrics(&self) -> &ClassifyMetrics {
        &self.metrics
    }

    /// Classify a read (one mate) or a pair (two mates), appending the
    /// resulting reports to `out` after clearing it.
    ///
    /// Evidence from both mates of a pair accumulates into the same tally;
    /// the coordinate budget also spans the whole pair.
    pub fn classify_into(&mut self,
                         mates: &[&Read],
                         out: &mut Vec<TaxReport>)
                         -> TaxvoteResult<()> {
        debug_assert!(!mates.is_empty() && mates.len() <= 2);

        out.clear();
        self.genus_map.clear();
        self.metrics.reads += 1;

        let index = self.index;
        let min_hit_len = self.params.min_hit_len;
        let max_genome_hits = self.params.max_genome_hits;

        let mut best = 0u64;
        let mut second = 0u64;
        let mut genome_hits = 0usize;
        // keeps increasing across mates so a mate-2 seed can never collide
        // with a mate-1 stamp in the tally
        let mut seed_serial = 0usize;

        for (mi, read) in mates.iter().enumerate() {
            let last_mate = mi + 1 == mates.len();

            if read.len() < min_hit_len {
                self.metrics.short_reads += 1;
                continue;
            }

            search_read(index, read, min_hit_len, &mut self.strands);
            let choice = select_strand(&self.strands, min_hit_len);

            self.order.clear();
            {
                let hits = self.strands[choice.strand].hits();
                self.order.extend(0..hits.len());
                self.order.sort_by(|&a, &b| hit_order(&hits[a], &hits[b]));
            }

            let mut used_portion = 0usize;

            for oi in 0..self.order.len() {
                let hi = self.order[oi];
                let remaining = max_genome_hits - genome_hits;

                let strand = &mut self.strands[choice.strand];
                let strand_fw = strand.fw;
                let hit = strand.hit_mut(hi);

                if !hit.qualifies(min_hit_len) {
                    continue;
                }
                used_portion += hit.len;
                self.metrics.seed_hits += 1;
                self.metrics.sa_range_walked += hit.range.size() as u64;

                // NOTE: the walker takes the strand in inverted sense
                // (true for the reverse complement); kept as-is to match
                // the established convention of the coordinate consumers.
                index.walk_sa(&hit.range, remaining, !strand_fw, &mut self.rng, &mut hit.coords)?;
                if hit.coords.is_empty() {
                    continue;
                }

                if genome_hits + hit.coords.len() > max_genome_hits {
                    // oversized block: shuffle the whole slice so the
                    // truncation below is an unbiased sample of the walk
                    self.rng.shuffle(&mut hit.coords);
                }

                let take = hit.coords.len().min(remaining);
                self.metrics.coords_materialized += take as u64;
                let weight = seed_weight(hit.len);

                for ci in 0..take {
                    let coord = hit.coords[ci];
                    let (genus, species) = match index.taxa(coord.ref_id) {
                        Some(pair) => pair,
                        None => {
                            self.metrics.bad_taxa += 1;
                            debug!("reference {} carries no taxon, vote dropped",
                                   coord.ref_id.0);
                            continue;
                        },
                    };

                    let new_score = self.genus_map.add(genus, species, seed_serial, weight);
                    if new_score > best {
                        second = best;
                        best = new_score;
                    } else if new_score > second {
                        second = new_score;
                    }
                }
                genome_hits += take;
                seed_serial += 1;

                if last_mate {
                    // strand index in the walker's inverted sense; with the
                    // totals laid out forward-first this lands on the
                    // elected strand's own total
                    let fwi = usize::from(!strand_fw);
                    let remaining_len = choice.totals[fwi].saturating_sub(used_portion);
                    // even if every remaining matched base piled onto the
                    // runner-up at maximal weight, it could not close the gap
                    if best > second.saturating_add(seed_weight(remaining_len)) {
                        self.metrics.early_stops += 1;
                        break;
                    }
                }
                if genome_hits >= max_genome_hits {
                    break;
                }
            }
        }

        self.emit(out);
        Ok(())
    }

    /// Convenience wrapper allocating the report buffer.
    pub fn classify(&mut self, mates: &[&Read]) -> TaxvoteResult<Vec<TaxReport>> {
        let mut out = Vec::new();
        self.classify_into(mates, &mut out)?;
        Ok(out)
    }

    fn emit(&self, out: &mut Vec<TaxReport>) {
        match self.params.report {
            ReportMode::PerSpecies => {
                for genus in self.genus_map.genera() {
                    for species in genus.species() {
                        out.push(TaxReport {
                            genus: genus.id,
                            species: species.id,
                            score: genus.weighted + species.weighted,
                        });
                    }
                }
            },
            ReportMode::TopGenus => {
                let top = self.genus_map
                    .genera()
                    .iter()
                    .map(|g| g.weighted)
                    .max()
                    .unwrap_or(0);

                for genus in self.genus_map.genera().iter().filter(|g| g.weighted == top) {
                    for species in genus.species() {
                        out.push(TaxReport {
                            genus: genus.id,
                            species: species.id,
                            score: genus.weighted + species.weighted,
                        });
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod test {
    use rand::XorShiftRng;
    use crate::index::{random_sequence, taxon_code, GenusId, MGIndex, SaRange, SpeciesId};
    use crate::read::Read;
    use crate::search::PartialHit;
    use super::*;

    fn rng() -> XorShiftRng {
        XorShiftRng::new_unseeded()
    }

    fn name(genus: u32, species: u32) -> String {
        taxon_code(GenusId(genus), SpeciesId(species)).to_string()
    }

    fn params(max_genome_hits: usize) -> ClassifyParams {
        ClassifyParams {
            max_genome_hits: max_genome_hits,
            ..ClassifyParams::default()
        }
    }

    #[test]
    fn single_exact_species_hit() {
        let mut seq_rng = rng();
        let reference = random_sequence(&mut seq_rng, 1000);
        let read = Read::new("r1", &reference[100..150]);

        let index = MGIndex::new(vec![(name(7, 42), reference)], 8, 8);
        let mut classifier = Classifier::new(&index, params(40), rng());

        let reports = classifier.classify(&[&read]).unwrap();

        // one seed covering the read: (50 - 15)^2 once for the genus and
        // once for the species
        assert_eq!(vec![TaxReport {
                            genus: GenusId(7),
                            species: SpeciesId(42),
                            score: 2450,
                        }],
                   reports);
        assert_eq!(1, classifier.metrics().coords_materialized);
        assert_eq!(1, classifier.metrics().reads);
    }

    #[test]
    fn two_species_one_genus_tie() {
        let mut seq_rng = rng();
        let ref_a = random_sequence(&mut seq_rng, 300);
        let mut ref_b = random_sequence(&mut seq_rng, 300);
        ref_b[200..250].copy_from_slice(&ref_a[100..150]);

        let read = Read::new("r1", &ref_a[100..150]);
        let index = MGIndex::new(vec![(name(7, 42), ref_a), (name(7, 43), ref_b)], 8, 8);
        let mut classifier = Classifier::new(&index, params(40), rng());

        let mut reports = classifier.classify(&[&read]).unwrap();
        reports.sort_by_key(|r| r.species.0);

        assert_eq!(vec![TaxReport {
                            genus: GenusId(7),
                            species: SpeciesId(42),
                            score: 2450,
                        },
                        TaxReport {
                            genus: GenusId(7),
                            species: SpeciesId(43),
                            score: 2450,
                        }],
                   reports);
        assert_eq!(2, classifier.metrics().coords_materialized);
    }

    #[test]
    fn repeated_seed_votes_once() {
        let mut seq_rng = rng();
        let motif = random_sequence(&mut seq_rng, 50);

        let mut reference = Vec::new();
        for _ in 0..3 {
            reference.extend_from_slice(&random_sequence(&mut seq_rng, 100));
            reference.extend_from_slice(&motif);
        }

        let read = Read::new("r1", &motif);
        let index = MGIndex::new(vec![(name(7, 42), reference)], 8, 8);
        let mut classifier = Classifier::new(&index, params(40), rng());

        let reports = classifier.classify(&[&read]).unwrap();

        // three occurrences, one vote
        assert_eq!(1, reports.len());
        assert_eq!(2450, reports[0].score);
        assert_eq!(3, classifier.metrics().coords_materialized);
    }

    #[test]
    fn coordinate_budget_caps_walk() {
        let mut seq_rng = rng();
        let motif = random_sequence(&mut seq_rng, 50);

        let mut reference = Vec::new();
        for _ in 0..20 {
            reference.extend_from_slice(&motif);
        }

        let read = Read::new("r1", &motif);
        let index = MGIndex::new(vec![(name(7, 42), reference)], 8, 8);
        let mut classifier = Classifier::new(&index, params(5), rng());

        let reports = classifier.classify(&[&read]).unwrap();

        assert_eq!(1, reports.len());
        assert_eq!(2450, reports[0].score);
        assert_eq!(5, classifier.metrics().coords_materialized);
    }

    #[test]
    fn dominant_species_stops_processing_early() {
        // two seeds for the same species; the first vote already dominates
        // anything the remaining 49 matched bases could add
        let block_a = b"ACGGTCAAGCTTACGGATCCAGTCAATGCAACGTCCTAGGTACTCGATGC";
        let block_b = b"TGCAGGCATTGCAACTTCGGATGGACCTAACCTGAATCGGATACCGGTAC";

        let mut reference = Vec::new();
        reference.extend_from_slice(block_b);
        reference.extend_from_slice(b"TTTTT");
        reference.extend_from_slice(block_a);

        let mut raw = Vec::new();
        raw.extend_from_slice(block_a);
        raw.extend_from_slice(block_b);
        let read = Read::new("r1", &raw);

        let index = MGIndex::new(vec![(name(7, 42), reference)], 8, 8);
        let mut classifier = Classifier::new(&index, params(40), rng());

        let reports = classifier.classify(&[&read]).unwrap();

        assert_eq!(vec![TaxReport {
                            genus: GenusId(7),
                            species: SpeciesId(42),
                            score: 2450,
                        }],
                   reports);
        // the second seed was never materialized
        assert_eq!(1, classifier.metrics().early_stops);
        assert_eq!(1, classifier.metrics().coords_materialized);
    }

    #[test]
    fn strand_symmetric_outcome() {
        let mut seq_rng = rng();
        let reference = random_sequence(&mut seq_rng, 600);
        let fw_read = Read::new("r1", &reference[200..250]);
        let rc_read = Read::new("r1", &fw_read.rc.clone());

        let index = MGIndex::new(vec![(name(7, 42), reference)], 8, 8);

        let mut classifier = Classifier::new(&index, params(40), rng());
        let fw_reports = classifier.classify(&[&fw_read]).unwrap();

        let mut classifier = Classifier::new(&index, params(40), rng());
        let rc_reports = classifier.classify(&[&rc_read]).unwrap();

        assert_eq!(fw_reports, rc_reports);
        assert_eq!(1, fw_reports.len());
    }

    #[test]
    fn pair_evidence_accumulates() {
        let mut seq_rng = rng();
        let reference = random_sequence(&mut seq_rng, 1000);
        let mate1 = Read::new("r1/1", &reference[100..150]);
        let mate2 = Read::new("r1/2", &reference[100..150]);

        let index = MGIndex::new(vec![(name(7, 42), reference)], 8, 8);
        let mut classifier = Classifier::new(&index, params(40), rng());

        let reports = classifier.classify(&[&mate1, &mate2]).unwrap();

        // two distinct seeds (one per mate): genus and species each carry
        // 2 * 1225, and the report sums both levels
        assert_eq!(vec![TaxReport {
                            genus: GenusId(7),
                            species: SpeciesId(42),
                            score: 4900,
                        }],
                   reports);
        assert_eq!(2, classifier.metrics().coords_materialized);
    }

    #[test]
    fn top_genus_mode_drops_runner_up() {
        let a1 = b"ACGGTCAAGCTTACGGATCCAGTCAATGCA";
        let a2 = b"GTACCAGGTTCAGCGATCAAGGTCCTTGCA";
        let b = b"TGCAGGCATTGCAACTTCGGATGGACCTAA";

        let mut ref_a = Vec::new();
        ref_a.extend_from_slice(a1);
        ref_a.extend_from_slice(b"TTTTT");
        ref_a.extend_from_slice(a2);

        let mut ref_b = Vec::new();
        ref_b.extend_from_slice(b"CCCCC");
        ref_b.extend_from_slice(b);
        ref_b.extend_from_slice(b"GGGGG");

        let mut raw = Vec::new();
        raw.extend_from_slice(a1);
        raw.extend_from_slice(a2);
        raw.extend_from_slice(b);
        let read = Read::new("r1", &raw);

        let refs = vec![(name(7, 42), ref_a), (name(8, 80), ref_b)];
        let index = MGIndex::new(refs, 8, 8);

        let mut classifier = Classifier::new(&index, params(40), rng());
        let per_species = classifier.classify(&[&read]).unwrap();
        assert_eq!(2, per_species.len());

        let top_params = ClassifyParams {
            report: ReportMode::TopGenus,
            ..params(40)
        };
        let mut classifier = Classifier::new(&index, top_params, rng());
        let top = classifier.classify(&[&read]).unwrap();

        assert_eq!(vec![TaxReport {
                            genus: GenusId(7),
                            species: SpeciesId(42),
                            score: 784,
                        }],
                   top);
    }

    #[test]
    fn unparsable_reference_yields_no_votes() {
        let mut seq_rng = rng();
        let reference = random_sequence(&mut seq_rng, 400);
        let read = Read::new("r1", &reference[50..100]);

        let index = MGIndex::new(vec![("plasmid_X".to_string(), reference)], 8, 8);
        let mut classifier = Classifier::new(&index, params(40), rng());

        let reports = classifier.classify(&[&read]).unwrap();

        assert!(reports.is_empty());
        assert_eq!(1, classifier.metrics().bad_taxa);
        assert_eq!(1, classifier.metrics().coords_materialized);
    }

    #[test]
    fn short_read_is_skipped() {
        let mut seq_rng = rng();
        let reference = random_sequence(&mut seq_rng, 200);
        let read = Read::new("r1", &reference[10..20]);

        let index = MGIndex::new(vec![(name(7, 42), reference)], 8, 8);
        let mut classifier = Classifier::new(&index, params(40), rng());

        let reports = classifier.classify(&[&read]).unwrap();

        assert!(reports.is_empty());
        assert_eq!(1, classifier.metrics().short_reads);
        assert_eq!(0, classifier.metrics().seed_hits);
    }

    #[test]
    fn deterministic_given_fixed_stream() {
        let mut seq_rng = rng();
        let motif = random_sequence(&mut seq_rng, 50);

        let mut reference = Vec::new();
        for _ in 0..20 {
            reference.extend_from_slice(&motif);
        }

        let read = Read::new("r1", &motif);
        let index = MGIndex::new(vec![(name(7, 42), reference)], 8, 8);

        let mut first = Classifier::new(&index, params(3), rng());
        let mut second = Classifier::new(&index, params(3), rng());

        let a = first.classify(&[&read]).unwrap();
        let b = second.classify(&[&read]).unwrap();

        assert_eq!(a, b);
        assert_eq!(first.metrics().coords_materialized,
                   second.metrics().coords_materialized);
    }

    #[test]
    fn hits_process_small_ranges_first_longest_on_ties() {
        let hit = |size: usize, len: usize| {
            PartialHit {
                bw_off: 0,
                len: len,
                range: SaRange { top: 0, bot: size },
                coords: Vec::new(),
            }
        };

        let a = hit(5, 30);
        let b = hit(1, 25);
        let c = hit(1, 30);

        let mut hits = vec![&a, &b, &c];
        hits.sort_by(|x, y| hit_order(x, y));

        let keys: Vec<(usize, usize)> = hits.iter().map(|h| (h.range.size(), h.len)).collect();
        assert_eq!(vec![(1, 30), (1, 25), (5, 30)], keys);
    }
}
