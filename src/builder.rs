//! Build the metagenomic index for classification queries.

use bio::io::fasta;

use crate::error::*;
use crate::index::MGIndex;
use crate::io::{parse_fasta_db, write_to_file};
use std::io;

/// Build and write the metagenomic index to disk.
///
/// The actual construction logic is in `index::MGIndex`, this just handles
/// the I/O and parsing.
pub fn build_and_write_index<R>(records: R,
                                index_path: &str,
                                sample_interval: u32,
                                suffix_sample: usize)
                                -> TaxvoteResult<()>
    where R: Iterator<Item = io::Result<fasta::Record>>
{
    let database = parse_fasta_db(records)?;

    info!("File parsed, building index...");
    let index = MGIndex::new(database, sample_interval, suffix_sample);

    info!("Writing index to file...");
    write_to_file(&index, index_path)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use bio::io::fasta::Reader;
    use tempfile::NamedTempFile;
    use std::io::Cursor;
    use super::build_and_write_index;
    use crate::index::{GenusId, MGIndex, RefId, SeedIndex, SpeciesId};
    use crate::io::from_file;

    #[test]
    fn success() {
        let reference = ">180388626439
TGTCTTAATGATAAAAATTGTTACAAACAGTTTAACATATTTAGCTACCTATTTTGCATATAAAAAACATGCTTGCATACACTATGCAATAAAAATTACAAATTTATATATGATACCACTATGCTTGCTTATCTCTATAGCGCCATTGATACACATTTTTAAATATCTATACTGCCGTTAGAATTTTATCATGTCTTAATTTTCATTAAATATTAATTACTTCATTTTATATAAACCAACAAAAACCCCCTCACTACTATGCAAGTGAGAGGTTATGTTGATGTGCTTTATTTTCAT
\
                         >184683593735
TTTCACCTAGTACATTAAATACACGACCTAATGTTTCGTCACCAACAGGTACACTAATTTCTTTGCCTGTATCTTTTACATCCATGCCTCTTTGGACACCATCAGTTGAATCCATCGCAATTGTACGAACAACGTCGTCACCTAATTGCAGCGCAACTTCTAATGTTAGTTGTATTGTACCTTCTTCTTTAGGCACATCAATAACCAAGGCGTTATTAATTTTAGGAACTTCGTTATGTTCAAATCGAACATCAATTACAGGACCCATAACTTGAGTTACACGGCCAATTCCCATGCTATTTTCCTCCTTTAAATATTATTCAAGCGCTGCGGAACCACCAACAATTTCAGTAATTTGTTGCGTAATTTCTGCTTGTCTCGCTCTGTTATATTCTA";

        let records = Reader::new(Cursor::new(reference.as_bytes())).records();
        let outfile = NamedTempFile::new().unwrap();
        let outfile_path = outfile.path().to_path_buf();
        let outfile_str = outfile_path.to_str().unwrap();

        build_and_write_index(records, outfile_str, 32, 64).unwrap();

        assert!(outfile_path.exists());
        assert!(outfile_path.is_file());

        let metadata = outfile_path.metadata().unwrap();

        assert!(metadata.len() > reference.len() as u64);
    }

    #[test]
    #[should_panic]
    fn fail_empty_header() {
        let reference = ">
TGTCTTAATGATAAAAATTGTTACAAACAGTTTAACATATTTAGCTACCTATTTTGCATATAAAAAACATGCTTGCATACACTATGCAATAAAAATTACAAATTTATATATGATACCACTATGCTTGCTTATCTCTATAGCGCCATTGATACACATTTTTAAATATCTATACTGCCGTTAGAATTTTATCATGTCTTA
\
                         >184683593735
TTTCACCTAGTACATTAAATACACGACCTAATGTTTCGTCACCAACAGGTACACTAATTTCTTTGCCTGTATCTTTTACATCCATGCCTCTTTGGACACCATCAGTTGAATCCATCGCAATTGTACGAACAACGTCGTCACCTAATTGCAGCGCAACTTCTAATGTTAGTTGTATTGTACCTTCTTCTTTAGGCACATCAATAACCAAGGCGTTATTAATTTTAGGAACTTCGTTATGTTCAAATCGAACATCAATTACAGGACCCATAACTTGAGTTACACGGCCAATTCCCATGC";

        let records = Reader::new(Cursor::new(reference.as_bytes())).records();
        let outfile = NamedTempFile::new().unwrap();
        let outfile_path = outfile.path().to_path_buf();
        let outfile_str = outfile_path.to_str().unwrap();

        build_and_write_index(records, outfile_str, 32, 64).unwrap();
    }

    #[test]
    fn build_and_read_back() {
        let reference = ">180388626439\nACGTACGTTT\n>184683593735\nTTTTAAAACC\n";
        let records = Reader::new(Cursor::new(reference.as_bytes())).records();
        let outfile = NamedTempFile::new().unwrap();
        let outfile_path = outfile.path().to_path_buf();
        let outfile_str = outfile_path.to_str().unwrap();

        build_and_write_index(records, outfile_str, 8, 8).unwrap();

        let index: MGIndex = from_file(outfile_str).unwrap();
        assert_eq!(2, index.reference_count());
        assert_eq!(Some((GenusId(7), SpeciesId(42))), index.taxa(RefId(0)));
        assert_eq!(Some((GenusId(7), SpeciesId(43))), index.taxa(RefId(1)));
        assert_eq!(Some("180388626439"), index.reference_name(RefId(0)));
    }
}
