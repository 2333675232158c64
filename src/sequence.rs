//! Symbolic sequence collections and the match kernel.
//!
//! These are the I/O wrappers around the embedding core: reading one
//! whitespace-delimited sequence token per record, a reference similarity that
//! counts equal symbols at equal aligned positions, and rendering of the
//! coordinate matrix as rows of space-separated floats.
//!
//! The core does not assume equal-length items. `MatchKernel` compares over the
//! shorter of the two lengths, which reduces to the position-wise count for the
//! usual equal-length case.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::{debug, info};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use thiserror::Error;

use crate::similarity::{Similarity, SimilarityError};

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("cannot read sequences: {0}")]
    Io(#[from] std::io::Error),

    #[error("no sequences found in input")]
    Empty,
}

/// Ordered collection of symbolic sequences; item `i` is the `i`-th token read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceSet {
    sequences: Vec<String>,
}

impl SequenceSet {
    pub fn new(sequences: Vec<String>) -> Self {
        Self { sequences }
    }

    /// Read every whitespace-delimited token as one sequence.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SequenceError> {
        let mut sequences = Vec::new();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            sequences.extend(line.split_whitespace().map(str::to_string));
        }
        if sequences.is_empty() {
            return Err(SequenceError::Empty);
        }
        debug!("Read {} sequences", sequences.len());
        Ok(Self { sequences })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SequenceError> {
        info!("Reading sequences from {}", path.as_ref().display());
        Self::from_reader(File::open(path)?)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        self.sequences.get(i).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.sequences.iter().map(String::as_str)
    }
}

/// Count of positions holding the same symbol in both sequences.
///
/// ```
/// use kernel_lle::sequence::match_count;
/// assert_eq!(match_count("AAAC", "AAAA"), 3);
/// assert_eq!(match_count("ACG", "AC"), 2);
/// ```
#[inline]
pub fn match_count(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).filter(|(x, y)| x == y).count()
}

/// Match kernel over a borrowed sequence collection.
#[derive(Clone, Copy, Debug)]
pub struct MatchKernel<'a> {
    sequences: &'a SequenceSet,
}

impl<'a> MatchKernel<'a> {
    pub fn new(sequences: &'a SequenceSet) -> Self {
        Self { sequences }
    }
}

impl Similarity for MatchKernel<'_> {
    fn similarity(&self, i: usize, j: usize) -> Result<f64, SimilarityError> {
        match (self.sequences.get(i), self.sequences.get(j)) {
            (Some(a), Some(b)) => Ok(match_count(a, b) as f64),
            _ => Err(SimilarityError::new(format!(
                "item index out of range for {} sequences",
                self.sequences.len()
            ))),
        }
    }
}

/// One line per item, coordinates separated by single spaces.
pub fn format_embedding(coordinates: &DenseMatrix<f64>) -> String {
    let (n, d) = coordinates.shape();
    let mut out = String::with_capacity(n * d * 12);
    for i in 0..n {
        let row: Vec<String> = (0..d)
            .map(|c| format!("{}", coordinates.get((i, c))))
            .collect();
        out.push_str(&row.join(" "));
        out.push('\n');
    }
    out
}
