/// An append-only sequence owned by a single worker.
///
/// Values pile up here during the collect phase and leave in bulk when the
/// worker merges; the allocation survives the merge so later rounds can
/// reuse it.
#[derive(Debug, Clone)]
pub struct Partition<T> {
    values: Vec<T>,
}

impl<T> Default for Partition<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Partition<T> {
    /// Creates a new empty `Partition`.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Creates a new empty `Partition` able to hold `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: T) {
        self.values.push(value);
    }

    /// Appends every value of `values` in iteration order.
    pub fn extend<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.values.extend(values);
    }

    /// Makes sure the partition can hold at least `capacity` values in total.
    pub fn reserve_total(&mut self, capacity: usize) {
        let additional = capacity.saturating_sub(self.values.len());
        self.values.reserve(additional);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// Drops every value while keeping the allocation.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Drops the first `count` values, keeping the rest in order.
    pub fn discard_front(&mut self, count: usize) {
        let count = count.min(self.values.len());
        self.values.drain(..count);
    }
}

/// The capacity each of `workers` partitions needs to hold an even share of
/// `total` values, plus one spare slot.
///
/// # Returns
/// `None` when there are no workers to share with.
pub fn even_capacity(total: usize, workers: usize) -> Option<usize> {
    if workers == 0 {
        return None;
    }

    Some(total.div_ceil(workers) + 1)
}
