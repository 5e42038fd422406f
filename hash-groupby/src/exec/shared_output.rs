//! Output slice written by many workers at the same time

use std::marker::PhantomData;

/// Mutable slice that many workers write into at the same time. Safe code can not
/// express it: each caller proves its indexes are distinct and in bounds
pub(crate) struct SharedOutput<'a, T> {
    ptr: *mut T,
    len: usize,
    _phantom: PhantomData<&'a mut [T]>,
}

// SAFETY: Workers write distinct elements, see `SharedOutput::write`
unsafe impl<T: Send> Send for SharedOutput<'_, T> {}
unsafe impl<T: Send> Sync for SharedOutput<'_, T> {}

impl<'a, T> SharedOutput<'a, T> {
    pub(crate) fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _phantom: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// # Safety
    ///
    /// - `index < self.len()`
    /// - No other thread reads or writes the element in `index` at the same time
    #[inline]
    pub(crate) unsafe fn write(&self, index: usize, value: T) {
        debug_assert!(index < self.len);

        unsafe { self.ptr.add(index).write(value) }
    }
}
