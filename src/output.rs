use std::{cell::UnsafeCell, ptr};

use bytemuck::{Pod, Zeroable};

/// The buffer every worker merges its partition into.
///
/// It is shared by all the workers without a lock around its contents: the
/// round state grants each worker a disjoint range, and the buffer is only
/// resized or read while no worker is copying. Callers uphold those rules,
/// so every accessor is `unsafe`.
pub(crate) struct OutputBuffer<T> {
    values: UnsafeCell<Vec<T>>,
}

unsafe impl<T: Send> Send for OutputBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for OutputBuffer<T> {}

impl<T: Pod> OutputBuffer<T> {
    pub fn new() -> Self {
        Self {
            values: UnsafeCell::new(Vec::new()),
        }
    }

    /// Resizes the buffer to hold exactly `len` values.
    ///
    /// # Safety
    /// The caller must hold the round lock and no worker may be copying into
    /// or reading from the buffer.
    pub unsafe fn resize(&self, len: usize) {
        let values = unsafe { &mut *self.values.get() };
        values.resize(len, <T as Zeroable>::zeroed());
    }

    /// Returns a pointer to the start of the range `offset..offset + len`.
    ///
    /// # Safety
    /// The caller must hold the round lock, and the range must lie within the
    /// buffer's current length.
    pub unsafe fn range_ptr(&self, offset: usize, len: usize) -> *mut T {
        let values = unsafe { &mut *self.values.get() };
        debug_assert!(offset + len <= values.len());

        // SAFETY: `Vec::as_mut_ptr` doesn't materialize a reference to the
        //         elements, and `offset` is within the allocation.
        unsafe { values.as_mut_ptr().add(offset) }
    }

    /// Copies `src` into the range starting at `dst`.
    ///
    /// # Safety
    /// `dst` must come from `range_ptr` for a range of `src.len()` values that
    /// is exclusively granted to the caller for the current round.
    pub unsafe fn copy_into(dst: *mut T, src: &[T]) {
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len()) };
    }

    /// Zeroes the `len` values starting at `dst`.
    ///
    /// # Safety
    /// `dst` must come from `range_ptr` for a range of at least `len` values
    /// that is exclusively granted to the caller for the current round.
    pub unsafe fn zero_fill(dst: *mut T, len: usize) {
        // SAFETY: All-zero bytes are a valid `T` for any `Pod` type.
        unsafe { ptr::write_bytes(dst, 0, len) };
    }

    /// Views the merged values.
    ///
    /// # Safety
    /// The caller must hold the round lock while no worker is copying, and
    /// drop the slice before releasing it.
    pub unsafe fn as_slice(&self) -> &[T] {
        unsafe { &*self.values.get() }
    }
}
