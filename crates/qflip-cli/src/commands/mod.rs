pub mod evaluate;
pub mod flip;

use crate::error::{CliError, Result};
use qflip::core::io::bvec::BvecFile;
use qflip::core::io::traits::SchemeFile;
use qflip::core::models::scheme::Scheme;
use std::path::PathBuf;
use tracing::info;

/// Reads every input file as one shell, in order. Fails on the first file that does
/// not parse, before anything is solved or written.
pub(crate) fn read_shells(file: &BvecFile, paths: &[PathBuf]) -> Result<Vec<Scheme>> {
    paths
        .iter()
        .map(|path| {
            info!("Loading shell from {:?}", path);
            let shell = file
                .read_from_path(path)
                .map_err(|e| CliError::FileParsing {
                    path: path.clone(),
                    source: e.into(),
                })?;
            info!("Read {} directions from {:?}", shell.len(), path);
            Ok(shell)
        })
        .collect()
}
