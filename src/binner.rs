//! The parallel classification driver (note: actual classification in
//! `classify`). Manages batched execution of queries along with writing
//! results.

use bio::io::{fasta, fastq};
use flate2::read::GzDecoder;
use itertools::Itertools;
use rand::XorShiftRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::classify::{Classifier, ClassifyParams, TaxReport};
use crate::error::*;
use crate::index::MGIndex;
use crate::io::from_file;
use crate::metrics::ClassifyMetrics;
use crate::read::Read as QueryRead;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Instant;

/// Reads per batch held in memory; batches are split across the thread pool.
const BATCH_SIZE: usize = 4096;
/// Reads handed to one classifier instance within a batch.
const CHUNK_SIZE: usize = 256;

fn open_maybe_gz(path: &str) -> TaxvoteResult<Box<dyn Read + Send>> {
    let mut file = File::open(Path::new(path))?;
    let mut magic = [0u8; 2];
    let read_len = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    if read_len == 2 && magic == [0x1f, 0x8b] {
        let decoder = GzDecoder::new(file)?;
        Ok(Box::new(decoder))
    } else {
        Ok(Box::new(file))
    }
}

enum FastxRecord {
    Fasta(fasta::Record),
    Fastq(fastq::Record),
}

impl FastxRecord {
    fn id(&self) -> &str {
        match *self {
            FastxRecord::Fasta(ref r) => r.id(),
            FastxRecord::Fastq(ref r) => r.id(),
        }
    }

    fn seq(&self) -> &[u8] {
        match *self {
            FastxRecord::Fasta(ref r) => r.seq(),
            FastxRecord::Fastq(ref r) => r.seq(),
        }
    }
}

fn fastx_records(path: &str,
                 input_type: &str)
                 -> TaxvoteResult<Box<dyn Iterator<Item = TaxvoteResult<FastxRecord>>>> {
    let input_type = input_type.to_ascii_uppercase();

    if input_type == "FASTA" {
        let mut reader = fasta::Reader::new(open_maybe_gz(path)?);
        reader.records().next().unwrap()?;
        info!("Test parse of FASTA record successful, reinitializing parser.");
        reader = fasta::Reader::new(open_maybe_gz(path)?);
        Ok(Box::new(reader.records()
            .map(|r| r.map(FastxRecord::Fasta).map_err(TaxvoteError::from))))
    } else if input_type == "FASTQ" {
        let mut reader = fastq::Reader::new(open_maybe_gz(path)?);
        reader.records().next().unwrap()?;
        info!("Test parse of FASTQ record successful, reinitializing parser.");
        reader = fastq::Reader::new(open_maybe_gz(path)?);
        Ok(Box::new(reader.records()
            .map(|r| r.map(FastxRecord::Fastq).map_err(TaxvoteError::from))))
    } else {
        Err(TaxvoteError::InvalidHeader(format!("Unknown input type: {}", input_type)))
    }
}

/// Classify FASTA or FASTQ reads (optionally paired with a second file of
/// mates) against an on-disk index and write one result line per read with
/// any assignments.
///
/// Output order follows input order, and given the same `seed` the output is
/// identical across runs regardless of thread scheduling: each fixed-size
/// chunk of reads is classified by its own deterministically seeded
/// classifier.
pub fn classify_fastx_and_write(input_path: &str,
                                mate_path: Option<&str>,
                                input_type: &str,
                                index_path: &str,
                                results_path: &str,
                                num_threads: usize,
                                params: ClassifyParams,
                                seed: u64)
                                -> TaxvoteResult<()> {

    let mut records = fastx_records(input_path, input_type)?;
    let mut mate_records = match mate_path {
        Some(path) => Some(fastx_records(path, input_type)?),
        None => None,
    };

    info!("Deserializing index ...");
    let index = from_file::<MGIndex>(index_path)?;

    let output_file = File::create(Path::new(results_path))?;
    let mut result_writer = BufWriter::new(output_file);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| TaxvoteError::AnyhowError(e.to_string()))?;

    info!("Beginning queries.");
    let timer = Instant::now();

    let mut metrics = ClassifyMetrics::default();
    let mut batch_index = 0u64;

    loop {
        let batch = next_batch(&mut records, mate_records.as_mut())?;
        if batch.is_empty() {
            break;
        }

        let results: Vec<(Vec<(String, Vec<TaxReport>)>, ClassifyMetrics)> = pool.install(|| {
            batch.par_chunks(CHUNK_SIZE)
                .enumerate()
                .map(|(chunk_index, chunk)| {
                    let rng = chunk_rng(seed, batch_index, chunk_index);
                    let mut classifier = Classifier::new(&index, params, rng);
                    let mut reports = Vec::new();
                    let mut lines = Vec::with_capacity(chunk.len());

                    for &(ref read, ref mate) in chunk {
                        let outcome = match *mate {
                            Some(ref mate) => {
                                classifier.classify_into(&[read, mate], &mut reports)
                            },
                            None => classifier.classify_into(&[read], &mut reports),
                        };

                        match outcome {
                            Ok(()) => lines.push((read.id.clone(), reports.clone())),
                            Err(why) => {
                                error!("Skipping read {}: {}", read.id, why);
                            },
                        }
                    }

                    (lines, classifier.metrics().clone())
                })
                .collect()
        });

        for (lines, chunk_metrics) in results {
            metrics.merge(&chunk_metrics);
            for (header, reports) in lines {
                write_read_reports(&header, &reports, &mut result_writer)?;
            }
        }

        batch_index += 1;
    }

    result_writer.flush()?;

    info!("All batches classified. Took {} seconds.",
          timer.elapsed().as_millis() as f32 / 1000.0);
    info!("Totals: {}", metrics);
    Ok(())
}

type ReadPair = (QueryRead, Option<QueryRead>);

fn next_batch(records: &mut Box<dyn Iterator<Item = TaxvoteResult<FastxRecord>>>,
              mut mates: Option<&mut Box<dyn Iterator<Item = TaxvoteResult<FastxRecord>>>>)
              -> TaxvoteResult<Vec<ReadPair>> {
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    while batch.len() < BATCH_SIZE {
        let record = match records.next() {
            Some(r) => r?,
            None => break,
        };
        let read = QueryRead::new(record.id(), record.seq());

        let mate = match mates {
            Some(ref mut mates) => {
                match mates.next() {
                    Some(m) => {
                        let m = m?;
                        Some(QueryRead::new(m.id(), m.seq()))
                    },
                    None => {
                        return Err(TaxvoteError::AnyhowError(format!(
                            "Mate file exhausted before read file (at read {})",
                            read.id
                        )));
                    },
                }
            },
            None => None,
        };

        batch.push((read, mate));
    }

    Ok(batch)
}

/// Per-chunk PRNG stream derived from the run seed and the chunk position.
fn chunk_rng(seed: u64, batch_index: u64, chunk_index: usize) -> XorShiftRng {
    // last word is never zero, so the seed is always valid
    XorShiftRng::from_seed([seed as u32,
                            (seed >> 32) as u32,
                            batch_index as u32,
                            chunk_index as u32 + 1])
}

/// Write the results for a single read to the Writer specified.
///
/// Writes in the format `READ_ID:GENUS-SPECIES=SCORE,...`. Read header/ID is
/// first, followed by a colon (':'), followed by a comma-separated list of
/// assignments. Reads without assignments produce no line.
pub fn write_read_reports<W: Write>(header: &str,
                                    reports: &[TaxReport],
                                    writer: &mut W)
                                    -> TaxvoteResult<()> {
    if reports.is_empty() {
        return Ok(());
    }

    let assignments = reports.iter()
        .map(|r| format!("{}-{}={}", r.genus.0, r.species.0, r.score))
        .join(",");

    let mut result_line = String::with_capacity(header.len() + 1 + assignments.len() + 1);
    result_line.push_str(header);
    result_line.push(':');
    result_line.push_str(&assignments);
    result_line.push('\n');

    writer.write_all(result_line.as_bytes())?;
    Ok(())
}
