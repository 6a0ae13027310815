//! Bounded binary min-heap.
//!
//! The heap drives the k-way merge: each element pairs the next value of a
//! run with the stream it came from, so popping always yields the globally
//! smallest not-yet-written value. Capacity is fixed at construction from a
//! byte budget and the storage never grows, keeping merge memory bounded by
//! the caller's working-memory parameter.

use std::mem;

use crate::sort::SortError;

/// A heap entry: the next value of a run paired with its source stream.
/// The heap owns the payload while the entry is live; popping transfers
/// ownership back to the caller.
pub struct Element<V> {
    pub key: u32,
    pub value: V,
}

/// Array-based binary min-heap with fixed capacity, keyed by `u32`.
///
/// Keys are compared as unsigned integers directly. A subtraction-based
/// comparator would wrap for keys more than half the key range apart and
/// must not be used here.
pub struct MinHeap<V> {
    elements: Vec<Element<V>>,
    capacity: usize,
}

impl<V> MinHeap<V> {
    /// Creates a heap whose capacity is the number of elements that fit in
    /// `budget_bytes`. Fails if the budget cannot hold a single element.
    pub fn with_byte_budget(budget_bytes: usize) -> Result<Self, SortError> {
        let capacity = budget_bytes / mem::size_of::<Element<V>>();
        if capacity == 0 {
            return Err(SortError::InvalidInput(format!(
                "working memory of {} bytes cannot hold a single heap element",
                budget_bytes
            )));
        }

        let mut elements = Vec::new();
        elements
            .try_reserve_exact(capacity)
            .map_err(|_| SortError::Allocation { bytes: budget_bytes })?;

        Ok(MinHeap { elements, capacity })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.elements.len() >= self.capacity
    }

    /// Adds an element, sifting it up until the heap property holds again.
    /// Fails with [`SortError::CapacityExceeded`] when the heap is full,
    /// leaving the existing elements untouched.
    pub fn add(&mut self, key: u32, value: V) -> Result<(), SortError> {
        if self.is_full() {
            return Err(SortError::CapacityExceeded {
                requested: self.capacity + 1,
                capacity: self.capacity,
            });
        }

        self.elements.push(Element { key, value });

        let mut current = self.elements.len() - 1;
        while current != 0 {
            let parent = (current - 1) / 2;
            if self.elements[current].key < self.elements[parent].key {
                self.elements.swap(current, parent);
                current = parent;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Removes and returns the minimum element, or `None` if the heap is
    /// empty. The last element replaces the root and sifts down toward the
    /// smaller child until neither child is smaller.
    pub fn pop(&mut self) -> Option<(u32, V)> {
        if self.elements.is_empty() {
            return None;
        }

        let last = self.elements.len() - 1;
        self.elements.swap(0, last);
        let root = self.elements.pop()?;
        self.sift_down();

        Some((root.key, root.value))
    }

    /// Discards all elements. Payloads are dropped, so stream handles held
    /// by the heap are closed here.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    fn sift_down(&mut self) {
        let count = self.elements.len();
        if count <= 1 {
            return;
        }

        let mut current = 0;
        loop {
            let mut smallest = current;
            let left = 2 * current + 1;
            let right = 2 * current + 2;

            if left < count && self.elements[left].key < self.elements[smallest].key {
                smallest = left;
            }
            if right < count && self.elements[right].key < self.elements[smallest].key {
                smallest = right;
            }
            if smallest == current {
                break;
            }

            self.elements.swap(current, smallest);
            current = smallest;
        }
    }
}
