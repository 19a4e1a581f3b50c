//! Seed-voting metagenomic read classification.
//!
//! Reads are matched against an FM-index of taxon-tagged reference sequences.
//! Maximal exact matches (seeds) are collected on both strands, one strand is
//! elected, and each seed votes for the (genus, species) of every reference
//! position it maps to, weighted by its length. The per-read result is the
//! set of taxa with their accumulated scores.

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod binner;
pub mod builder;
pub mod classify;
pub mod error;
pub mod index;
pub mod io;
pub mod metrics;
pub mod read;
pub mod search;
pub mod tally;
pub mod util;
