//! K-way merge engine.
//!
//! One [`MergeContext`] is created per sort invocation and reused for every
//! merge group across all generations. Its heap capacity, together with the
//! configured open-file limit, bounds how many runs a group may contain and
//! therefore how many files are ever open at once.

use std::io::{Read, Write};

use crate::heap::MinHeap;
use crate::run::{write_value, RunReader};
use crate::sort::SortError;

/// Reusable state for one merge session: the bounded min-heap and the
/// effective fan-in capacity.
pub struct MergeContext<R: Read> {
    heap: MinHeap<RunReader<R>>,
    capacity: usize,
}

impl<R: Read> MergeContext<R> {
    /// Creates a merge context over the arena's byte budget. The effective
    /// capacity is the smaller of the heap's storage-derived capacity and
    /// `open_file_limit`, which also caps simultaneously open run files.
    pub fn new(budget_bytes: usize, open_file_limit: usize) -> Result<Self, SortError> {
        if open_file_limit < 2 {
            return Err(SortError::InvalidInput(format!(
                "open file limit must be at least 2, got {}",
                open_file_limit
            )));
        }

        let heap = MinHeap::with_byte_budget(budget_bytes)?;
        if heap.capacity() < 2 {
            return Err(SortError::InvalidInput(format!(
                "working memory of {} bytes cannot hold two heap elements",
                budget_bytes
            )));
        }
        let capacity = heap.capacity().min(open_file_limit);

        Ok(MergeContext { heap, capacity })
    }

    /// Largest number of runs one merge group may contain.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Merges a group of sorted runs into `output`, emitting the globally
    /// smallest pending value until every input is exhausted.
    ///
    /// On failure every stream still held, whether in the heap or pending
    /// in `inputs`, is closed before returning.
    pub fn merge<W: Write>(
        &mut self,
        inputs: Vec<RunReader<R>>,
        output: &mut W,
    ) -> Result<(), SortError> {
        if inputs.len() > self.capacity {
            return Err(SortError::CapacityExceeded {
                requested: inputs.len(),
                capacity: self.capacity,
            });
        }

        let result = self.merge_streams(inputs, output);
        if result.is_err() {
            // Dropping the cleared elements closes their streams.
            self.heap.clear();
        }
        result
    }

    fn merge_streams<W: Write>(
        &mut self,
        inputs: Vec<RunReader<R>>,
        output: &mut W,
    ) -> Result<(), SortError> {
        // Prime the heap with the head of each run. An empty run is dropped
        // here and takes no further part in the merge.
        for mut stream in inputs {
            if let Some(value) = stream
                .next_value()
                .map_err(|err| SortError::io("reading the first value of a run", err))?
            {
                self.heap.add(value, stream)?;
            }
        }

        // Pop the minimum, write it, then pull the next value from the same
        // stream. Exhausted streams are dropped instead of re-added, so the
        // heap drains to empty exactly when all input is written.
        while let Some((value, mut stream)) = self.heap.pop() {
            write_value(output, value)
                .map_err(|err| SortError::io("writing a merged value", err))?;

            if let Some(next) = stream
                .next_value()
                .map_err(|err| SortError::io("reading the next value of a run", err))?
            {
                self.heap.add(next, stream)?;
            }
        }

        Ok(())
    }
}
