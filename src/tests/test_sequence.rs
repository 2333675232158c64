use std::io::Cursor;

use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::sequence::{format_embedding, match_count, MatchKernel, SequenceError, SequenceSet};
use crate::similarity::Similarity;
use crate::tests::init;

#[test]
fn test_read_whitespace_tokens() {
    init();
    let input = "AAAA AAAC\n\n  CCCC\tCCCA\n";
    let seqs = SequenceSet::from_reader(Cursor::new(input)).unwrap();
    assert_eq!(seqs.len(), 4);
    assert_eq!(seqs.get(2), Some("CCCC"));
    assert_eq!(
        seqs.iter().collect::<Vec<_>>(),
        vec!["AAAA", "AAAC", "CCCC", "CCCA"]
    );
    assert_eq!(seqs.get(4), None);
}

#[test]
fn test_empty_input_rejected() {
    init();
    assert!(matches!(
        SequenceSet::from_reader(Cursor::new(" \n\n")),
        Err(SequenceError::Empty)
    ));
}

#[test]
fn test_missing_file() {
    init();
    assert!(matches!(
        SequenceSet::from_path("/nonexistent/sequences.dat"),
        Err(SequenceError::Io(_))
    ));
}

#[test]
fn test_from_path() {
    init();
    let path = std::env::temp_dir().join(format!("kernel_lle_seqs_{}.dat", std::process::id()));
    std::fs::write(&path, "ACGU\nUGCA\n").unwrap();
    let seqs = SequenceSet::from_path(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(seqs.len(), 2);
    assert!(!seqs.is_empty());
}

#[test]
fn test_match_kernel() {
    init();
    assert_eq!(match_count("ACGU", "ACGU"), 4);
    assert_eq!(match_count("ACGU", "UGCA"), 0);
    assert_eq!(match_count("", "ACGU"), 0);

    let seqs = SequenceSet::new(vec!["ACGU".into(), "ACCA".into(), "AC".into()]);
    let kernel = MatchKernel::new(&seqs);
    assert_eq!(kernel.similarity(0, 1).unwrap(), 2.0);
    assert_eq!(kernel.similarity(1, 0).unwrap(), 2.0);
    assert_eq!(kernel.similarity(1, 1).unwrap(), 4.0);
    // compared over the shorter length
    assert_eq!(kernel.similarity(0, 2).unwrap(), 2.0);
    assert!(kernel.similarity(0, 3).is_err());
}

#[test]
fn test_format_embedding() {
    init();
    let coords = DenseMatrix::from_2d_vec(&vec![vec![0.5, -0.25], vec![1.0, 0.0]]).unwrap();
    assert_eq!(format_embedding(&coords), "0.5 -0.25\n1 0\n");
}
