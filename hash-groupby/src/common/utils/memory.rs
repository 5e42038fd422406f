//! Utils for memory allocation
//!
//! Every buffer owned by the groupby is allocated through these functions. They never
//! abort on allocation failure, the [`TryReserveError`] is returned to the caller
//! such that the stage can report it

use std::collections::TryReserveError;

/// Allocate a vector with `len` elements, each element is created by `f`
#[inline]
pub fn try_vec_with<T, F>(len: usize, f: F) -> Result<Vec<T>, TryReserveError>
where
    F: FnMut() -> T,
{
    let mut vec = Vec::new();
    vec.try_reserve_exact(len)?;
    vec.extend(std::iter::repeat_with(f).take(len));
    Ok(vec)
}

/// Allocate a vector with `len` copies of `elem`
#[inline]
pub fn try_vec_from_elem<T: Copy>(elem: T, len: usize) -> Result<Vec<T>, TryReserveError> {
    try_vec_with(len, || elem)
}

/// Allocate a vector that holds a copy of `slice`
#[inline]
pub fn try_vec_from_slice<T: Copy>(slice: &[T]) -> Result<Vec<T>, TryReserveError> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(slice.len())?;
    vec.extend_from_slice(slice);
    Ok(vec)
}
