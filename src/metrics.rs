//! Write-only counters surfaced by the classifier.
//!
//! Every field is a monotonically increasing total. Workers each own a
//! private instance and the driver folds them together with `merge` once the
//! run is over.

use std::fmt;

/// Classification counters for one classifier (or one merged run).
#[derive(Clone, Debug, Default)]
pub struct ClassifyMetrics {
    /// Reads (or read pairs) classified.
    pub reads: u64,
    /// Qualifying partial hits seen across all reads.
    pub seed_hits: u64,
    /// Total SA-range size walked during coordinate materialization.
    pub sa_range_walked: u64,
    /// Reference coordinates actually materialized.
    pub coords_materialized: u64,
    /// Reads that hit the dominance bound before exhausting their hits.
    pub early_stops: u64,
    /// Coordinates dropped because the reference name encodes no taxon.
    pub bad_taxa: u64,
    /// Reads shorter than the minimum hit length, skipped outright.
    pub short_reads: u64,
}

impl ClassifyMetrics {
    /// Fold another set of counters into this one.
    pub fn merge(&mut self, other: &ClassifyMetrics) {
        self.reads += other.reads;
        self.seed_hits += other.seed_hits;
        self.sa_range_walked += other.sa_range_walked;
        self.coords_materialized += other.coords_materialized;
        self.early_stops += other.early_stops;
        self.bad_taxa += other.bad_taxa;
        self.short_reads += other.short_reads;
    }
}

impl fmt::Display for ClassifyMetrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f,
               "{} reads, {} seeds, {} SA entries walked, {} coords, {} early stops, \
                {} untaxed coords, {} short reads",
               self.reads,
               self.seed_hits,
               self.sa_range_walked,
               self.coords_materialized,
               self.early_stops,
               self.bad_taxa,
               self.short_reads)
    }
}
