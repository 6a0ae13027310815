//! Bounded working-memory arena.
//!
//! The arena is the one memory region a sort invocation is allowed to use.
//! It is sized from a caller byte budget at construction and never grows:
//! the run producer fills it with values and sorts them in place, and the
//! merge phase derives its heap capacity from the same budget.

use crate::sort::SortError;

/// Size of a single stored value in bytes.
pub const VALUE_SIZE: usize = std::mem::size_of::<u32>();

/// Fixed-capacity value buffer backing one sort invocation.
pub struct Arena {
    values: Box<[u32]>,
}

impl Arena {
    /// Creates an arena from a byte budget. The capacity is `size_bytes / 4`,
    /// rounded down; a budget too small for a single value is rejected.
    pub fn new(size_bytes: usize) -> Result<Self, SortError> {
        let capacity = size_bytes / VALUE_SIZE;
        if capacity == 0 {
            return Err(SortError::InvalidInput(format!(
                "working memory of {} bytes cannot hold a single value",
                size_bytes
            )));
        }

        let mut values = Vec::new();
        values
            .try_reserve_exact(capacity)
            .map_err(|_| SortError::Allocation { bytes: size_bytes })?;
        values.resize(capacity, 0);

        Ok(Arena {
            values: values.into_boxed_slice(),
        })
    }

    /// Number of values the arena can hold.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// The arena's size in bytes. The merge phase reuses this budget to size
    /// its heap storage.
    pub fn byte_size(&self) -> usize {
        self.values.len() * VALUE_SIZE
    }

    pub(crate) fn values_mut(&mut self) -> &mut [u32] {
        &mut self.values
    }
}

/// Rounds a byte count up to the next multiple of the value size.
pub fn round_up_to_value_size(size_bytes: usize) -> usize {
    (size_bytes + (VALUE_SIZE - 1)) & !(VALUE_SIZE - 1)
}
