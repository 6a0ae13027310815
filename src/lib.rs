//! `bigsort` is a bounded-memory external merge sort for huge files of
//! unsigned 32-bit integers.
//!
//! External sorting is required when the data being sorted does not fit into
//! the main memory of a computer. `bigsort` works in two phases over a
//! caller-sized working-memory arena. During the first phase it reads the
//! input in arena-sized chunks, sorts each chunk in place and writes it out
//! as a generation-0 run file. During the second phase it repeatedly fans
//! groups of runs into longer next-generation runs with a k-way merge driven
//! by a bounded min-heap, until a single fully sorted file remains. The
//! number of simultaneously open run files is capped by the heap capacity
//! and a configurable open-file limit, and leftover odd runs advance between
//! generations by rename rather than being rewritten.
//!
//! Input and run files are raw sequences of native-endian `u32` values with
//! no header; a valid file's byte length is always a multiple of 4.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use bigsort::Sorter;
//!
//! fn main() {
//!     let summary = Sorter::new()
//!         .with_run_size(64 * 1024 * 1024)
//!         .with_open_file_limit(16)
//!         .sort(Path::new("input.bin"), Path::new("output.bin"))
//!         .unwrap();
//!
//!     println!("{} runs, {} generations", summary.runs, summary.generations);
//! }
//! ```

pub mod arena;
pub mod heap;
pub mod merge;
pub mod naming;
pub mod run;
pub mod sort;

pub use arena::Arena;
pub use heap::MinHeap;
pub use merge::MergeContext;
pub use run::{RunProducer, RunReader};
pub use sort::{create_runs, merge_runs, SortError, SortSummary, Sorter};
