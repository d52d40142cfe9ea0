use super::read_shells;
use crate::cli::FlipArgs;
use crate::config::PartialFlipConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use qflip::{
    core::io::{bvec::BvecFile, paths, traits::SchemeFile},
    core::models::scheme::Scheme,
    engine::{milp::MilpModel, progress::ProgressReporter},
    workflows,
};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

pub fn run(args: FlipArgs, verbosity: u8) -> Result<()> {
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    execute(&args, verbosity, &reporter)
}

pub(crate) fn execute(args: &FlipArgs, verbosity: u8, reporter: &ProgressReporter) -> Result<()> {
    let partial_config = PartialFlipConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let app_config = partial_config.merge_with_cli(args, verbosity)?;
    let file = BvecFile::new(app_config.layout);

    let shells = read_shells(&file, &args.input)?;
    let output_paths = paths::output_paths(&args.output, shells.len());

    if let Some(lp_path) = &args.export_lp {
        let milp = workflows::flip::export_model(&shells, &app_config.core_config)?;
        write_lp(&milp, lp_path)?;
        println!("MILP model written to: {}", lp_path.display());
    }

    println!(
        "Optimizing {} shell(s) with the {} criterion...",
        shells.len(),
        app_config.core_config.criterion
    );
    info!("Invoking the core flip workflow...");
    let result = workflows::flip::run(&shells, &app_config.core_config, reporter)?;

    if !result.is_optimal() {
        warn!("Solver stopped at the time limit; the result may not be optimal.");
        println!("Warning: time limit reached, writing the best assignment found.");
    }

    write_shells(&file, &result.shells, &output_paths)?;
    for (mask, path) in result.masks.iter().zip(&output_paths) {
        println!(
            "✓ {} of {} directions flipped, written to: {}",
            mask.flipped_count(),
            mask.len(),
            path.display()
        );
    }
    println!(
        "Objective: {:.6} -> {:.6} ({})",
        result.initial_objective, result.objective, result.status
    );

    Ok(())
}

fn staging_file(target: &Path) -> std::io::Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut builder = tempfile::Builder::new();
    builder.prefix(".qflip-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }
    builder.tempfile_in(dir)
}

/// Writes every shell to a staging file beside its target, then moves them into place.
/// Nothing is left behind when any shell fails to write.
fn write_shells(file: &BvecFile, shells: &[Scheme], paths: &[PathBuf]) -> Result<()> {
    let mut staged = Vec::with_capacity(paths.len());
    for (shell, path) in shells.iter().zip(paths) {
        let to_cli_error = |source: anyhow::Error| CliError::FileWriting {
            path: path.clone(),
            source,
        };
        let mut tmp = staging_file(path).map_err(|e| to_cli_error(e.into()))?;
        let mut writer = BufWriter::new(tmp.as_file_mut());
        file.write_to(shell, &mut writer)
            .map_err(|e| to_cli_error(e.into()))?;
        writer.flush().map_err(|e| to_cli_error(e.into()))?;
        drop(writer);
        staged.push((tmp, path));
    }

    let mut written: Vec<&PathBuf> = Vec::with_capacity(staged.len());
    for (tmp, path) in staged {
        info!("Writing flipped shell to {:?}", path);
        if let Err(e) = tmp.persist(path) {
            for done in &written {
                if let Err(cleanup) = fs::remove_file(done) {
                    warn!("Could not remove {:?} after a failed write: {}", done, cleanup);
                }
            }
            return Err(CliError::FileWriting {
                path: path.clone(),
                source: e.error.into(),
            });
        }
        written.push(path);
    }
    Ok(())
}

fn write_lp(milp: &MilpModel, path: &Path) -> Result<()> {
    let to_cli_error = |e: std::io::Error| CliError::FileWriting {
        path: path.to_path_buf(),
        source: e.into(),
    };
    let mut writer = BufWriter::new(File::create(path).map_err(to_cli_error)?);
    milp.write_lp(&mut writer).map_err(to_cli_error)?;
    writer.flush().map_err(to_cli_error)
}
