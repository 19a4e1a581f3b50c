//! Helper functions for serialization & deserialization.

use serde::Serialize;
use bincode::{deserialize_from, serialize_into};
use bio::io::fasta;
use crate::classify::TaxReport;
use crate::error::*;
use crate::index::{Database, GenusId, SpeciesId};
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;

/// Parse an arbitrary `Decodable` type from a file path.
pub fn from_file<T>(p: &str) -> TaxvoteResult<T>
    where T: serde::de::DeserializeOwned
{

    let f = File::open(Path::new(p))?;
    let mut reader = BufReader::new(f);
    Ok(deserialize_from(&mut reader)?)
}

/// Write an arbitrary `Encodable` type to a file path.
pub fn write_to_file<T>(t: &T, p: &str) -> TaxvoteResult<()>
    where T: Serialize
{

    let f = File::create(Path::new(p))?;
    let mut writer = BufWriter::new(f);
    Ok(serialize_into(&mut writer, t)?)
}

/// Parse a reference FASTA database into the ordered sequence database.
///
/// Record order is preserved: a reference's position in the database becomes
/// its `RefId` in the index. Headers are expected to carry the taxon code,
/// but undecodable headers are kept (the build warns and their hits are
/// ignored at classification time).
pub fn parse_fasta_db<R>(records: R) -> TaxvoteResult<Database>
    where R: Iterator<Item = io::Result<fasta::Record>>
{
    let mut database = Database::new();

    debug!("Parsing FASTA database file...");
    for record in records {
        let record = (record)?;

        if record.id().is_empty() {
            return Err(TaxvoteError::MissingHeader);
        }

        database.push((record.id().to_owned(), record.seq().to_vec()));
    }

    Ok(database)
}

/// Return a lazy iterator which parses the findings of a taxvote-classify run.
///
/// The Err return type could indicate a few problems:
///
/// * There are an incorrect number of tokens after splitting on the colon separator
/// * One of the taxon fields or the score isn't a valid unsigned integer
///
pub fn parse_reports<'a, R: BufRead + 'a>
    (s: R)
     -> Box<dyn Iterator<Item = TaxvoteResult<(String, Vec<TaxReport>)>> + 'a> {
    // TODO: replace with -> impl Trait when the lifetime bounds allow it here

    // the BufRead::lines function handles lazily splitting on lines for us
    Box::new(s.lines().map(|l| {
        l.map_err(|e| TaxvoteError::from(e)).and_then(|l| {
            let l = l.trim();
            // split from the right in case someone put colons in the read ID
            let mut halves = l.rsplitn(2, ':');

            // the first split iteration will always return something, even if it's empty
            let assignments = halves.next().unwrap().split(',');

            let mut reports = Vec::new();

            for assignment in assignments {
                let mut sides = assignment.splitn(2, '=');
                let taxa = sides.next().unwrap();
                let score = match sides.next() {
                    Some(s) => s,
                    None => return Err(TaxvoteError::InvalidInteger(assignment.to_string())),
                };

                let mut taxa = taxa.splitn(2, '-');
                let genus = taxa.next().unwrap();
                let species = match taxa.next() {
                    Some(s) => s,
                    None => return Err(TaxvoteError::InvalidTaxonomy(assignment.to_string())),
                };

                let genus = genus.parse::<u32>()
                    .map_err(|_| TaxvoteError::InvalidInteger(genus.to_string()))?;
                let species = species.parse::<u32>()
                    .map_err(|_| TaxvoteError::InvalidInteger(species.to_string()))?;
                let score = score.parse::<u64>()
                    .map_err(|_| TaxvoteError::InvalidInteger(score.to_string()))?;

                reports.push(TaxReport {
                    genus: GenusId(genus),
                    species: SpeciesId(species),
                    score: score,
                });
            }

            // since we're parsing from the right of each line, the read ID is the second token
            let read_id = match halves.next() {
                Some(r) => {
                    if r.len() > 0 {
                        r.to_string()
                    } else {
                        return Err(TaxvoteError::InvalidHeader(l.to_string()));
                    }
                },
                None => return Err(TaxvoteError::InvalidHeader(l.to_string())),
            };

            Ok((read_id, reports))
        })
    }))
}
