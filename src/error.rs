//! Result and Error types for all taxvote code.
use std::fmt;
use std::io;
use std::str;
use bincode;

#[allow(missing_docs)]
pub type TaxvoteResult<T> = Result<T, TaxvoteError>;

#[allow(missing_docs)]
#[derive(Debug)]
pub enum TaxvoteError {
    Io(io::Error),
    InvalidHeader(String),
    InvalidInteger(String),
    InvalidTaxonomy(String),
    IndexCorrupt(String),
    MissingFile(String),
    MissingHeader,
    Serialize(bincode::Error),
    Utf8(str::Utf8Error),
    FastqReadError,
    AnyhowError(String),
}

impl fmt::Display for TaxvoteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {

        match self {
            &TaxvoteError::Io(ref e) => write!(f, "I/O problem: {}", e),
            &TaxvoteError::InvalidHeader(ref h) => {
                write!(f, "Incorrectly formatted record header: {}", h)
            },
            &TaxvoteError::InvalidInteger(ref s) => {
                write!(f, "Unable to parse \"{}\" as integer", s)
            },
            &TaxvoteError::InvalidTaxonomy(ref s) => {
                write!(f, "Reference name \"{}\" does not encode a taxon", s)
            },
            &TaxvoteError::IndexCorrupt(ref s) => write!(f, "Corrupt index: {}", s),
            &TaxvoteError::MissingFile(ref p) => write!(f, "Unable to find file {}", p),
            &TaxvoteError::MissingHeader => write!(f, "Empty header found in FASTA file"),
            &TaxvoteError::Serialize(ref e) => {
                write!(f, "Unable to serialize/deserialize item: {}", e)
            },
            &TaxvoteError::Utf8(ref e) => write!(f, "Found invalid UTF8 input ({})", e),
            &TaxvoteError::FastqReadError => write!(f, "Error reading FASTQ file"),
            &TaxvoteError::AnyhowError(ref s) => write!(f, "Error: {}", s),
        }
    }
}

impl From<io::Error> for TaxvoteError {
    fn from(e: io::Error) -> Self {
        TaxvoteError::Io(e)
    }
}


impl From<bincode::Error> for TaxvoteError {
    fn from(e: bincode::Error) -> Self {
        TaxvoteError::Serialize(e)
    }
}

impl From<str::Utf8Error> for TaxvoteError {
    fn from(e: str::Utf8Error) -> Self {
        TaxvoteError::Utf8(e)
    }
}


impl From<anyhow::Error> for TaxvoteError {
    fn from(e: anyhow::Error) -> Self {
        TaxvoteError::AnyhowError(e.to_string())
    }
}


impl From<bio::io::fastq::Error> for TaxvoteError {
    fn from(_: bio::io::fastq::Error) -> Self {
        TaxvoteError::FastqReadError
    }
}
