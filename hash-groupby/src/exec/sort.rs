//! Sort the groupby result by key with a double buffered LSD radix sort
//!
//! The sort primitive follows the two calls protocol of the temporary storage: call
//! [`sort_pairs`] without temporary storage to query the number of words it needs,
//! allocate them, then call it again to sort. The sorted pairs may live in either half
//! of the [`DoubleBuffer`], [`DoubleBuffer::selector`] tells which one.

use std::collections::TryReserveError;

use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};
use snafu::{ResultExt, Snafu, ensure};

use super::atomic::GroupKey;
use super::device::{Device, DeviceError};
use super::shared_output::SharedOutput;
use crate::common::utils::memory::{try_vec_from_elem, try_vec_from_slice};

/// Number of bits sorted by a single pass
pub const RADIX_BITS: usize = 8;
/// Number of buckets of a single pass
pub const RADIX: usize = 1 << RADIX_BITS;
/// Number of keys counted and scattered by a single task of a pass
pub const SORT_TILE_SIZE: usize = 1 << 12;

/// Name of the kernel that sorts the groupby result
pub const SORT_KERNEL: &str = "radix_sort_pairs";

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SortError {
    #[snafu(display("Failed to allocate `{words}` words of temporary storage for the radix sort"))]
    AllocateTempStorage {
        words: usize,
        source: TryReserveError,
    },
    #[snafu(display("Failed to allocate the alternate buffers with `{len}` elements"))]
    AllocateAlternate {
        len: usize,
        source: TryReserveError,
    },
    #[snafu(display(
        "Radix sort requires `{required}` words of temporary storage, found `{provided}` words"
    ))]
    TempStorageTooSmall { required: usize, provided: usize },
    #[snafu(display(
        "Radix sort `{num_items}` items, however the keys buffer has `{keys_len}` elements and the values buffer has `{values_len}` elements"
    ))]
    BufferLengthMismatch {
        num_items: usize,
        keys_len: usize,
        values_len: usize,
    },
    #[snafu(display("Failed to synchronize the radix sort"))]
    Synchronize { source: DeviceError },
}

type Result<T> = std::result::Result<T, SortError>;

/// Pair of buffers the radix passes ping-pong between
#[derive(Debug)]
pub struct DoubleBuffer<'a, T> {
    buffers: [&'a mut [T]; 2],
    selector: usize,
}

impl<'a, T> DoubleBuffer<'a, T> {
    /// Create a new double buffer, `current` holds the data
    pub fn new(current: &'a mut [T], alternate: &'a mut [T]) -> Self {
        Self {
            buffers: [current, alternate],
            selector: 0,
        }
    }

    /// Index of the buffer that holds the data: 0 for the `current` passed to
    /// [`DoubleBuffer::new`], 1 for the `alternate`
    #[inline]
    pub fn selector(&self) -> usize {
        self.selector
    }

    /// Buffer that holds the data
    #[inline]
    pub fn current(&self) -> &[T] {
        self.buffers[self.selector]
    }

    #[inline]
    fn len(&self) -> usize {
        self.buffers[0].len().min(self.buffers[1].len())
    }

    /// Split into the current buffer and the alternate buffer
    #[inline]
    fn split(&mut self) -> (&[T], &mut [T]) {
        let [first, second] = &mut self.buffers;
        if self.selector == 0 {
            (&**first, &mut **second)
        } else {
            (&**second, &mut **first)
        }
    }

    #[inline]
    fn flip(&mut self) {
        self.selector ^= 1;
    }
}

#[inline]
fn digit<K: GroupKey>(key: K, pass: usize) -> usize {
    ((key.to_radix_bits() >> (pass * RADIX_BITS)) as usize) & (RADIX - 1)
}

/// Number of words of temporary storage [`sort_pairs`] needs to sort `num_items` keys:
/// a histogram for every pass and a histogram for every tile
#[inline]
pub fn required_temp_storage_words<K: GroupKey>(num_items: usize) -> usize {
    (K::RADIX_BYTES + num_items.div_ceil(SORT_TILE_SIZE)) * RADIX
}

/// Sort the first `num_items` pairs of the double buffers by key, ascending.
///
/// When `temp_storage` is `None`, the function only writes the number of words the sort
/// needs into `temp_storage_words` and returns. Otherwise the sort is performed with the
/// given temporary storage. Histograms of all the passes are computed in parallel with a
/// single read of the keys, passes where every key has the same digit are skipped. Each
/// remaining pass splits the keys into tiles of [`SORT_TILE_SIZE`]: tiles count their
/// digits in parallel, the counts are scanned in digit major order such that every tile
/// owns a disjoint range of each bucket, then tiles scatter their pairs from the current
/// buffer into the alternate buffer in parallel and the selectors flip. The sort is
/// stable
pub fn sort_pairs<K, V>(
    temp_storage: Option<&mut [usize]>,
    temp_storage_words: &mut usize,
    keys: &mut DoubleBuffer<'_, K>,
    values: &mut DoubleBuffer<'_, V>,
    num_items: usize,
) -> Result<()>
where
    K: GroupKey,
    V: Copy + Send + Sync,
{
    let required = required_temp_storage_words::<K>(num_items);
    let Some(temp_storage) = temp_storage else {
        *temp_storage_words = required;
        return Ok(());
    };

    ensure!(
        temp_storage.len() >= required,
        TempStorageTooSmallSnafu {
            required,
            provided: temp_storage.len()
        }
    );
    ensure!(
        keys.len() >= num_items && values.len() >= num_items,
        BufferLengthMismatchSnafu {
            num_items,
            keys_len: keys.len(),
            values_len: values.len()
        }
    );

    let (histograms, tile_offsets) =
        temp_storage[..required].split_at_mut(K::RADIX_BYTES * RADIX);
    {
        let src_keys = &keys.current()[..num_items];
        histograms
            .par_chunks_mut(RADIX)
            .enumerate()
            .for_each(|(pass, counts)| {
                counts.fill(0);
                src_keys
                    .iter()
                    .for_each(|&key| counts[digit(key, pass)] += 1);
            });
    }

    let num_tiles = num_items.div_ceil(SORT_TILE_SIZE);
    for (pass, counts) in histograms.chunks(RADIX).enumerate() {
        if counts.iter().any(|&count| count == num_items) {
            continue;
        }

        let (src_keys, dst_keys) = keys.split();
        let (src_values, dst_values) = values.split();
        let src_keys = &src_keys[..num_items];
        let src_values = &src_values[..num_items];

        tile_offsets
            .par_chunks_mut(RADIX)
            .zip(src_keys.par_chunks(SORT_TILE_SIZE))
            .for_each(|(tile_counts, tile_keys)| {
                tile_counts.fill(0);
                tile_keys
                    .iter()
                    .for_each(|&key| tile_counts[digit(key, pass)] += 1);
            });

        // Exclusive scan in digit major order, tile counts become the start offsets of
        // the tile's range in each bucket
        let mut offset = 0;
        for bucket in 0..RADIX {
            for tile in 0..num_tiles {
                let count = &mut tile_offsets[tile * RADIX + bucket];
                let start = offset;
                offset += *count;
                *count = start;
            }
        }
        debug_assert_eq!(offset, num_items);

        let dst_keys = SharedOutput::new(dst_keys);
        let dst_values = SharedOutput::new(dst_values);
        tile_offsets
            .par_chunks_mut(RADIX)
            .zip(src_keys.par_chunks(SORT_TILE_SIZE))
            .zip(src_values.par_chunks(SORT_TILE_SIZE))
            .for_each(|((positions, tile_keys), tile_values)| {
                tile_keys
                    .iter()
                    .zip(tile_values)
                    .for_each(|(&key, &value)| {
                        let position = &mut positions[digit(key, pass)];
                        // SAFETY: The scan hands every tile a disjoint range of each bucket,
                        // ranges cover `0..num_items` and the alternate buffers hold at least
                        // `num_items` elements
                        unsafe {
                            dst_keys.write(*position, key);
                            dst_values.write(*position, value);
                        }
                        *position += 1;
                    });
            });

        keys.flip();
        values.flip();
    }

    Ok(())
}

/// Sort the first `out_size` elements of the output columns by key. The sorted result
/// is copied back into the output columns if it ends up in the alternate buffers. All of
/// the alternate buffers and the temporary storage are released before returning
pub fn sort_groupby_result<K, V>(
    device: &Device,
    out_groupby_column: &mut [K],
    out_aggregation_column: &mut [V],
    out_size: usize,
) -> Result<()>
where
    K: GroupKey,
    V: Copy + Send + Sync,
{
    if out_size <= 1 {
        return Ok(());
    }

    let out_groupby_column = &mut out_groupby_column[..out_size];
    let out_aggregation_column = &mut out_aggregation_column[..out_size];

    let mut groupby_alt =
        try_vec_from_slice(out_groupby_column).context(AllocateAlternateSnafu { len: out_size })?;
    let mut aggregation_alt = try_vec_from_slice(out_aggregation_column)
        .context(AllocateAlternateSnafu { len: out_size })?;

    let (keys_in_alternate, values_in_alternate) = {
        let mut keys = DoubleBuffer::new(out_groupby_column, &mut groupby_alt);
        let mut values = DoubleBuffer::new(out_aggregation_column, &mut aggregation_alt);

        // Query the size of the temporary storage
        let mut temp_storage_words = 0;
        sort_pairs(
            None,
            &mut temp_storage_words,
            &mut keys,
            &mut values,
            out_size,
        )?;

        let mut temp_storage = try_vec_from_elem(0_usize, temp_storage_words).context(
            AllocateTempStorageSnafu {
                words: temp_storage_words,
            },
        )?;

        device
            .install(SORT_KERNEL, || {
                sort_pairs(
                    Some(temp_storage.as_mut_slice()),
                    &mut temp_storage_words,
                    &mut keys,
                    &mut values,
                    out_size,
                )
            })
            .context(SynchronizeSnafu)??;

        (keys.selector() == 1, values.selector() == 1)
    };

    // Sorted output may be in the alternate buffers, the caller only owns the
    // original columns
    if keys_in_alternate {
        out_groupby_column.copy_from_slice(&groupby_alt);
    }
    if values_in_alternate {
        out_aggregation_column.copy_from_slice(&aggregation_alt);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::exec_args::tests::mock_exec_args;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn sort_with_protocol<K: GroupKey, V: Copy + Send + Sync + Default>(
        keys: &mut [K],
        values: &mut [V],
    ) -> (Vec<K>, Vec<V>, usize) {
        let mut keys_alt = vec![K::SENTINEL; keys.len()];
        let mut values_alt = vec![V::default(); values.len()];
        let num_items = keys.len();
        let mut keys = DoubleBuffer::new(keys, &mut keys_alt);
        let mut values = DoubleBuffer::new(values, &mut values_alt);

        let mut words = 0;
        sort_pairs(None, &mut words, &mut keys, &mut values, num_items).unwrap();
        assert_eq!(
            words,
            (K::RADIX_BYTES + num_items.div_ceil(SORT_TILE_SIZE)) * RADIX
        );
        let mut temp_storage = vec![0; words];
        sort_pairs(
            Some(temp_storage.as_mut_slice()),
            &mut words,
            &mut keys,
            &mut values,
            num_items,
        )
        .unwrap();

        let selector = keys.selector();
        assert_eq!(selector, values.selector());
        (keys.current().to_vec(), values.current().to_vec(), selector)
    }

    #[test]
    fn test_sort_pairs_keeps_pairing() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(9);
        let mut keys = (-5000..5000_i32).collect::<Vec<_>>();
        keys.shuffle(&mut rng);
        let mut values = keys.iter().map(|&key| key as i64 * 3).collect::<Vec<_>>();

        let (sorted_keys, sorted_values, _) = sort_with_protocol(&mut keys, &mut values);
        assert_eq!(sorted_keys, (-5000..5000).collect::<Vec<_>>());
        assert!(
            sorted_keys
                .iter()
                .zip(&sorted_values)
                .all(|(&key, &value)| value == key as i64 * 3)
        );
    }

    #[test]
    fn test_sort_pairs_skips_trivial_passes() {
        // Only the lowest byte differs, a single pass sorts them
        let mut keys = vec![3_u64, 1, 2, 0];
        let mut values = vec![30_u8, 10, 20, 0];
        let (sorted_keys, sorted_values, selector) = sort_with_protocol(&mut keys, &mut values);
        assert_eq!(sorted_keys, [0, 1, 2, 3]);
        assert_eq!(sorted_values, [0, 10, 20, 30]);
        assert_eq!(selector, 1);

        // Both bytes differ: two passes, back in the first buffer
        let mut keys = vec![0x0201_u16, 0x0100, 0x0101, 0x0200];
        let mut values = vec![4_u32, 1, 2, 3];
        let (sorted_keys, sorted_values, selector) = sort_with_protocol(&mut keys, &mut values);
        assert_eq!(sorted_keys, [0x0100, 0x0101, 0x0200, 0x0201]);
        assert_eq!(sorted_values, [1, 2, 3, 4]);
        assert_eq!(selector, 0);
    }

    #[test]
    fn test_sort_pairs_temp_storage_too_small() {
        let mut keys = vec![2_u32, 1];
        let mut values = vec![0_u32; 2];
        let mut keys_alt = vec![0; 2];
        let mut values_alt = vec![0; 2];
        let mut keys = DoubleBuffer::new(&mut keys, &mut keys_alt);
        let mut values = DoubleBuffer::new(&mut values, &mut values_alt);
        let mut temp_storage = vec![0; 10];
        let mut words = temp_storage.len();
        let err = sort_pairs(
            Some(temp_storage.as_mut_slice()),
            &mut words,
            &mut keys,
            &mut values,
            2,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SortError::TempStorageTooSmall {
                required: 1280,
                provided: 10
            }
        ));
    }

    #[test]
    fn test_sort_many_tiles_on_pool() {
        let device = Device::try_new(&mock_exec_args()).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(31);
        let num_items = 5 * SORT_TILE_SIZE + 123;
        assert!(required_temp_storage_words::<i32>(num_items) > (i32::RADIX_BYTES + 5) * RADIX);

        // Duplicated keys, values record the input position
        let mut keys = (0..num_items)
            .map(|_| rng.gen_range(-70_000..70_000_i32))
            .collect::<Vec<_>>();
        let mut values = (0..num_items as u32).collect::<Vec<_>>();
        let mut expected = keys.iter().copied().zip(values.iter().copied()).collect::<Vec<_>>();
        expected.sort_by_key(|&(key, _)| key);

        sort_groupby_result(&device, &mut keys, &mut values, num_items).unwrap();
        let actual = keys.into_iter().zip(values).collect::<Vec<_>>();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_sort_groupby_result_copies_back() {
        let device = Device::try_new(&mock_exec_args()).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut keys = (0..1000).map(|_| rng.gen_range(0..u32::MAX)).collect::<Vec<_>>();
        keys.sort_unstable();
        keys.dedup();
        let expected = keys.clone();
        keys.shuffle(&mut rng);
        let mut values = keys.iter().map(|&key| key as f64 / 2.0).collect::<Vec<_>>();
        let out_size = keys.len();

        // Tail of the output columns is not part of the result
        keys.extend([7; 5]);
        values.extend([7.0; 5]);

        sort_groupby_result(&device, &mut keys, &mut values, out_size).unwrap();
        assert_eq!(&keys[..out_size], expected.as_slice());
        assert!(
            keys[..out_size]
                .iter()
                .zip(&values)
                .all(|(&key, &value)| value == key as f64 / 2.0)
        );
        assert_eq!(&keys[out_size..], &[7; 5]);
    }
}
