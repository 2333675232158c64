//! Embed RNA sequences into two dimensions with the match kernel.
//!
//! Usage: `cargo run --example rna -- <sequences file>`
//!
//! The input holds one whitespace-delimited sequence per token. Output is one
//! line per sequence with its coordinates separated by spaces.
use std::process::ExitCode;

use kernel_lle::builder::{EmbeddingParams, KernelLleBuilder};
use kernel_lle::error::EmbeddingError;
use kernel_lle::sequence::{format_embedding, MatchKernel, SequenceSet};
use log::{error, info, warn};

const NEIGHBORS: usize = 30;
const TARGET_DIMENSION: usize = 2;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: rna <sequences file>");
        return ExitCode::FAILURE;
    };

    let seqs = match SequenceSet::from_path(&path) {
        Ok(seqs) => seqs,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // small inputs cannot afford 30 neighbors or 2 dimensions
    let params = EmbeddingParams {
        k: NEIGHBORS,
        d: TARGET_DIMENSION,
        ..EmbeddingParams::default()
    }
    .fit_to(seqs.len());
    if params.k < NEIGHBORS || params.d < TARGET_DIMENSION {
        warn!(
            "Only {} sequences, using k = {}, d = {}",
            seqs.len(),
            params.k,
            params.d
        );
    }

    let result = KernelLleBuilder::from_params(params)
        .build()
        .map_err(EmbeddingError::from)
        .and_then(|lle| lle.embed(seqs.len(), &MatchKernel::new(&seqs)));

    match result {
        Ok(embedding) => {
            for warning in &embedding.warnings {
                warn!("{}", warning);
            }
            info!(
                "Embedded {} sequences with {} kernel evaluations",
                seqs.len(),
                embedding.kernel_evaluations
            );
            print!("{}", format_embedding(&embedding.coordinates));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
