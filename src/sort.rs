//! Sort orchestration: run generation, the generational merge loop and the
//! public error type.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use log;

use crate::arena::Arena;
use crate::merge::MergeContext;
use crate::naming::{promote_run, remove_run, run_file_path, FINAL_GENERATION};
use crate::run::{write_run, RunProducer, RunReader};

/// Default working-memory size (and thus initial run size): 1 MiB.
pub const DEFAULT_RUN_SIZE: usize = 1 << 20;

/// Default limit on simultaneously open run files during a merge.
pub const DEFAULT_OPEN_FILE_LIMIT: usize = 16;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// The input or configuration is unusable: input size not a multiple of
    /// 4, working memory too small for one element, open-file limit below 2.
    InvalidInput(String),
    /// A file operation failed; the context names the operation and path.
    Io { context: String, source: io::Error },
    /// A merge group or heap insertion exceeded the configured capacity.
    CapacityExceeded { requested: usize, capacity: usize },
    /// The working-memory region could not be allocated as requested.
    Allocation { bytes: usize },
}

impl SortError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        SortError::Io {
            context: context.into(),
            source,
        }
    }
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SortError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortError::InvalidInput(reason) => write!(f, "invalid input: {}", reason),
            SortError::Io { context, source } => write!(f, "{}: {}", context, source),
            SortError::CapacityExceeded { requested, capacity } => {
                write!(f, "capacity exceeded: {} elements requested, capacity is {}", requested, capacity)
            }
            SortError::Allocation { bytes } => {
                write!(f, "unable to allocate {} bytes of working memory", bytes)
            }
        }
    }
}

/// Outcome of a completed sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSummary {
    /// Number of generation-0 runs produced from the input.
    pub runs: usize,
    /// Number of merge generations it took to reduce them to one file.
    pub generations: usize,
}

/// Splits the input file into sorted generation-0 runs named
/// `<output_base>.0.<index>`.
///
/// The input size must be a multiple of 4; this is checked before any run
/// file is created. Returns the number of runs written — zero for an empty
/// input, which is a benign "nothing to sort" outcome, not an error. On
/// failure no further runs are attempted and already-written run files are
/// left in place for the caller to inspect.
pub fn create_runs(
    input_path: &Path,
    output_base: &Path,
    arena: &mut Arena,
) -> Result<usize, SortError> {
    let metadata = fs::metadata(input_path).map_err(|err| {
        SortError::io(format!("reading metadata of {}", input_path.display()), err)
    })?;
    if metadata.len() % 4 != 0 {
        return Err(SortError::InvalidInput(format!(
            "size of {} is {} bytes, not a multiple of 4",
            input_path.display(),
            metadata.len()
        )));
    }

    let input = fs::File::open(input_path)
        .map_err(|err| SortError::io(format!("opening {}", input_path.display()), err))?;
    let mut producer = RunProducer::new(BufReader::new(input), arena);

    let mut num_runs = 0;
    loop {
        let run = match producer
            .next_run()
            .map_err(|err| SortError::io(format!("reading {}", input_path.display()), err))?
        {
            Some(run) => run,
            None => break,
        };

        let run_path = run_file_path(output_base, 0, num_runs);
        let run_file = fs::File::create(&run_path)
            .map_err(|err| SortError::io(format!("creating run {}", run_path.display()), err))?;
        let mut writer = BufWriter::new(run_file);
        write_run(&mut writer, run)
            .map_err(|err| SortError::io(format!("writing run {}", run_path.display()), err))?;
        writer
            .flush()
            .map_err(|err| SortError::io(format!("flushing run {}", run_path.display()), err))?;

        log::debug!("created run {} ({} values)", run_path.display(), run.len());
        num_runs += 1;
    }

    log::debug!("run generation done: {} runs", num_runs);
    Ok(num_runs)
}

/// Merges the generation-0 runs under `output_base` down to the single
/// sorted file at `output_base`.
///
/// Runs are grouped left to right, at most `K = min(heap capacity,
/// open_file_limit)` per group; a trailing group of one run is promoted to
/// the next generation by rename. Returns the number of merge generations
/// taken: `0` when there was at most one run (promotion only), otherwise at
/// least 1. With `num_runs == 0` an empty output file is produced.
///
/// Inputs of a group are removed only once the group's output is complete,
/// so a failure while creating or writing the output leaves them intact. A
/// failure after that point leaves a partially advanced working set behind;
/// no automatic rollback is attempted.
pub fn merge_runs(
    output_base: &Path,
    num_runs: usize,
    arena: &Arena,
    open_file_limit: usize,
) -> Result<usize, SortError> {
    if num_runs == 0 {
        fs::File::create(output_base).map_err(|err| {
            SortError::io(format!("creating empty output {}", output_base.display()), err)
        })?;
        return Ok(0);
    }
    if num_runs == 1 {
        // Nothing to merge; the sole run becomes the output by rename.
        promote_run(output_base, 0, 0, FINAL_GENERATION, 0)?;
        return Ok(0);
    }

    let mut ctx: MergeContext<BufReader<fs::File>> =
        MergeContext::new(arena.byte_size(), open_file_limit)?;

    let mut generation = 0;
    let mut runs_in_generation = num_runs;

    while runs_in_generation >= 2 {
        let next_generation = generation + 1;
        let mut next_runs = 0;
        let mut current = 0;

        while current < runs_in_generation {
            let remaining = runs_in_generation - current;
            if remaining < 2 {
                // A lone trailing run advances by rename; its bytes are
                // never rewritten.
                promote_run(output_base, generation, current, next_generation, next_runs)?;
                current += 1;
            } else {
                let group = remaining.min(ctx.capacity());
                merge_group(
                    &mut ctx,
                    output_base,
                    generation,
                    current,
                    group,
                    next_generation,
                    next_runs,
                )?;
                current += group;
            }
            next_runs += 1;
        }

        log::debug!(
            "generation {}: merged {} runs into {}",
            next_generation,
            runs_in_generation,
            next_runs
        );
        generation = next_generation;
        runs_in_generation = next_runs;
    }

    promote_run(output_base, generation, 0, FINAL_GENERATION, 0)?;
    log::debug!("merge done after {} generations", generation);
    Ok(generation)
}

/// Merges `count` consecutive runs of one generation into a single run of
/// the next. The inputs are removed only after the output run is complete.
fn merge_group(
    ctx: &mut MergeContext<BufReader<fs::File>>,
    output_base: &Path,
    generation: usize,
    first: usize,
    count: usize,
    new_generation: usize,
    new_index: usize,
) -> Result<(), SortError> {
    let out_path = run_file_path(output_base, new_generation, new_index);
    let out_file = fs::File::create(&out_path)
        .map_err(|err| SortError::io(format!("creating run {}", out_path.display()), err))?;
    let mut writer = BufWriter::new(out_file);

    let mut inputs = Vec::with_capacity(count);
    for i in 0..count {
        let path = run_file_path(output_base, generation, first + i);
        let file = fs::File::open(&path)
            .map_err(|err| SortError::io(format!("opening run {}", path.display()), err))?;
        inputs.push(RunReader::new(BufReader::new(file)));
    }

    ctx.merge(inputs, &mut writer)?;
    writer
        .flush()
        .map_err(|err| SortError::io(format!("flushing run {}", out_path.display()), err))?;

    for i in 0..count {
        remove_run(output_base, generation, first + i)?;
    }
    Ok(())
}

/// Convenience front-end wiring both phases together with explicit,
/// caller-visible defaults.
pub struct Sorter {
    run_size: usize,
    open_file_limit: usize,
}

impl Sorter {
    /// Creates a sorter with the default run size and open-file limit.
    pub fn new() -> Self {
        Sorter {
            run_size: DEFAULT_RUN_SIZE,
            open_file_limit: DEFAULT_OPEN_FILE_LIMIT,
        }
    }

    /// Sets the working-memory size in bytes, which is also the size of the
    /// initial runs.
    pub fn with_run_size(mut self, run_size: usize) -> Self {
        self.run_size = run_size;
        self
    }

    /// Sets the limit on simultaneously open run files during merging.
    pub fn with_open_file_limit(mut self, open_file_limit: usize) -> Self {
        self.open_file_limit = open_file_limit;
        self
    }

    /// Sorts `input` into `output` using bounded working memory.
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortSummary, SortError> {
        let mut arena = Arena::new(self.run_size)?;

        let runs = create_runs(input, output, &mut arena)?;
        log::info!("created {} initial runs", runs);

        let generations = merge_runs(output, runs, &arena, self.open_file_limit)?;
        log::info!("merged down to {} in {} generations", output.display(), generations);

        Ok(SortSummary { runs, generations })
    }
}

impl Default for Sorter {
    fn default() -> Self {
        Sorter::new()
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::Cursor;
    use std::path::{Path, PathBuf};

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{create_runs, merge_runs, SortError, Sorter};
    use crate::arena::Arena;
    use crate::naming::run_file_path;
    use crate::run::{read_value, write_run};

    fn write_input(dir: &Path, values: &[u32]) -> PathBuf {
        let path = dir.join("input");
        let mut bytes = Vec::new();
        write_run(&mut bytes, values).unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }

    fn read_values(path: &Path) -> Vec<u32> {
        let mut cursor = Cursor::new(fs::read(path).unwrap());
        let mut values = Vec::new();
        while let Some(value) = read_value(&mut cursor).unwrap() {
            values.push(value);
        }
        values
    }

    fn leftover_run_files(dir: &Path) -> Vec<PathBuf> {
        let mut leftovers: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                name != "input" && name != "output"
            })
            .collect();
        leftovers.sort();
        leftovers
    }

    #[rstest]
    #[case(256, 4)]
    #[case(1024, 2)]
    #[case(400, 16)]
    fn test_sort_is_a_sorted_permutation(#[case] run_size: usize, #[case] open_file_limit: usize) {
        let dir = tempfile::tempdir().unwrap();

        let mut values: Vec<u32> = (0..2000)
            .map(|i| (i * 2_654_435_761u64 % u32::MAX as u64) as u32)
            .collect();
        values.push(u32::MAX);
        values.push(0x8000_0000);
        values.shuffle(&mut rand::thread_rng());

        let input = write_input(dir.path(), &values);
        let output = dir.path().join("output");

        let summary = Sorter::new()
            .with_run_size(run_size)
            .with_open_file_limit(open_file_limit)
            .sort(&input, &output)
            .unwrap();
        assert!(summary.runs >= 1);

        let mut expected = values;
        expected.sort_unstable();
        assert_eq!(read_values(&output), expected);

        // All intermediate run files are gone on success.
        assert!(leftover_run_files(dir.path()).is_empty());
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    fn test_input_not_multiple_of_4_is_rejected(#[case] trailing: usize) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        fs::write(&input, vec![0xABu8; 8 + trailing]).unwrap();
        let output = dir.path().join("output");

        let mut arena = Arena::new(64).unwrap();
        match create_runs(&input, &output, &mut arena) {
            Err(SortError::InvalidInput(_)) => {}
            other => panic!("expected InvalidInput, got {:?}", other),
        }

        // Rejected before any run file or output was created.
        assert!(!output.exists());
        assert!(leftover_run_files(dir.path()).is_empty());
    }

    #[test]
    fn test_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &[]);
        let output = dir.path().join("output");

        let summary = Sorter::new().with_run_size(64).sort(&input, &output).unwrap();
        assert_eq!(summary.runs, 0);
        assert_eq!(summary.generations, 0);

        assert!(output.exists());
        assert_eq!(fs::read(&output).unwrap().len(), 0);
    }

    #[test]
    fn test_single_run_input_is_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &[3, 1, 2]);
        let output = dir.path().join("output");

        let summary = Sorter::new().with_run_size(64).sort(&input, &output).unwrap();
        assert_eq!(summary.runs, 1);
        assert_eq!(summary.generations, 0);
        assert_eq!(read_values(&output), vec![1, 2, 3]);
    }

    #[test]
    fn test_run_size_boundary() {
        // Working memory for exactly m values and an input of m + 1 values:
        // two runs, of m values and 1 value.
        let m = 16;
        let dir = tempfile::tempdir().unwrap();
        let values: Vec<u32> = (0..=m as u32).rev().collect();
        let input = write_input(dir.path(), &values);
        let output = dir.path().join("output");

        let mut arena = Arena::new(m * 4).unwrap();
        let runs = create_runs(&input, &output, &mut arena).unwrap();
        assert_eq!(runs, 2);

        let first = read_values(&run_file_path(&output, 0, 0));
        assert_eq!(first, (1..=m as u32).collect::<Vec<_>>());
        let second = read_values(&run_file_path(&output, 0, 1));
        assert_eq!(second, vec![0]);
    }

    #[test]
    fn test_generation_count_with_group_size_two() {
        // Five single-value runs with a fan-in of 2 take ceil(log2(5)) = 3
        // generations: 5 -> 3 -> 2 -> 1.
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");

        let runs = [vec![40u32], vec![10], vec![50], vec![30], vec![20]];
        for (index, run) in runs.iter().enumerate() {
            let mut bytes = Vec::new();
            write_run(&mut bytes, run).unwrap();
            fs::write(run_file_path(&output, 0, index), bytes).unwrap();
        }

        let arena = Arena::new(1024).unwrap();
        let generations = merge_runs(&output, runs.len(), &arena, 2).unwrap();
        assert_eq!(generations, 3);

        assert_eq!(read_values(&output), vec![10, 20, 30, 40, 50]);
        assert!(leftover_run_files(dir.path()).is_empty());
    }

    #[test]
    fn test_odd_trailing_run_is_promoted_not_rewritten() {
        // Three runs with fan-in 2: the trailing run is renamed into each
        // next generation. Seed it with deliberately mis-sorted content; a
        // rename preserves it bit for bit where any merge would not.
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");

        for (index, run) in [vec![1u32, 5], vec![2, 6]].iter().enumerate() {
            let mut bytes = Vec::new();
            write_run(&mut bytes, run).unwrap();
            fs::write(run_file_path(&output, 0, index), bytes).unwrap();
        }
        let mut marker = Vec::new();
        write_run(&mut marker, &[9, 3, 7]).unwrap();
        fs::write(run_file_path(&output, 0, 2), &marker).unwrap();

        let arena = Arena::new(1024).unwrap();

        // Run one merge pass by hand: gen 1 should hold the merged pair and
        // the renamed marker run, untouched.
        let mut ctx = crate::merge::MergeContext::new(arena.byte_size(), 2).unwrap();
        super::merge_group(&mut ctx, &output, 0, 0, 2, 1, 0).unwrap();
        crate::naming::promote_run(&output, 0, 2, 1, 1).unwrap();

        assert_eq!(read_values(&run_file_path(&output, 1, 0)), vec![1, 2, 5, 6]);
        assert_eq!(fs::read(run_file_path(&output, 1, 1)).unwrap(), marker);
        assert!(!run_file_path(&output, 0, 2).exists());
    }

    #[test]
    fn test_merge_failure_leaves_group_inputs_intact() {
        // A run file missing from the group makes the merge fail before any
        // input is removed, so the surviving inputs stay on disk.
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");

        let mut bytes = Vec::new();
        write_run(&mut bytes, &[42u32]).unwrap();
        fs::write(run_file_path(&output, 0, 0), bytes).unwrap();
        // Run .0.1 is deliberately absent.

        let arena = Arena::new(1024).unwrap();
        match merge_runs(&output, 2, &arena, 2) {
            Err(SortError::Io { .. }) => {}
            other => panic!("expected Io error, got {:?}", other),
        }

        assert!(run_file_path(&output, 0, 0).exists());
        assert_eq!(read_values(&run_file_path(&output, 0, 0)), vec![42]);
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("does-not-exist");
        let output = dir.path().join("output");

        let mut arena = Arena::new(64).unwrap();
        match create_runs(&input, &output, &mut arena) {
            Err(SortError::Io { .. }) => {}
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
