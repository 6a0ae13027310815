//! Run-file naming and rename promotion.
//!
//! Run files live next to the final output as `<output>.<generation>.<index>`
//! with a dense zero-based index per generation. A promotion target of
//! generation 0 is reserved to mean the final output path itself, so the
//! last surviving run is renamed into place without rewriting a byte.

use std::fs;
use std::path::{Path, PathBuf};

use crate::sort::SortError;

/// Promotion target denoting the final output path.
pub const FINAL_GENERATION: usize = 0;

/// Builds the path of one run file.
pub fn run_file_path(output: &Path, generation: usize, index: usize) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(format!(".{}.{}", generation, index));
    PathBuf::from(name)
}

/// Advances a run to the next generation by renaming it, with no data
/// movement. A `new_generation` of [`FINAL_GENERATION`] renames the run to
/// the output path itself.
pub fn promote_run(
    output: &Path,
    generation: usize,
    index: usize,
    new_generation: usize,
    new_index: usize,
) -> Result<(), SortError> {
    let from = run_file_path(output, generation, index);
    let to = if new_generation == FINAL_GENERATION {
        output.to_path_buf()
    } else {
        run_file_path(output, new_generation, new_index)
    };

    fs::rename(&from, &to).map_err(|err| {
        SortError::io(
            format!("promoting run {} to {}", from.display(), to.display()),
            err,
        )
    })
}

/// Removes a consumed run file.
pub fn remove_run(output: &Path, generation: usize, index: usize) -> Result<(), SortError> {
    let path = run_file_path(output, generation, index);
    fs::remove_file(&path)
        .map_err(|err| SortError::io(format!("removing run {}", path.display()), err))
}
