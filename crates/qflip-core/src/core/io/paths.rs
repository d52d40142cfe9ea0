use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Output path of shell `shell_index`: `_shell{i}` is inserted before the extension,
/// so `out/flipped.txt` becomes `out/flipped_shell0.txt`.
pub fn shell_output_path(base: &Path, shell_index: usize) -> PathBuf {
    let mut name = base.file_stem().map(OsString::from).unwrap_or_default();
    name.push(format!("_shell{shell_index}"));
    if let Some(ext) = base.extension() {
        name.push(".");
        name.push(ext);
    }
    base.with_file_name(name)
}

/// Output paths for a scheme with `num_shells` shells. A single shell is written to
/// `base` unchanged.
pub fn output_paths(base: &Path, num_shells: usize) -> Vec<PathBuf> {
    if num_shells == 1 {
        return vec![base.to_path_buf()];
    }
    (0..num_shells)
        .map(|i| shell_output_path(base, i))
        .collect()
}
