//! Error in hash groupby

use snafu::Snafu;

use crate::exec::device::DeviceError;
use crate::exec::extract::ExtractError;
use crate::exec::hash_table::HashTableError;
use crate::exec::sort::SortError;

/// Coarse classification of [`GroupbyError`], it plays the role of the status code
/// returned to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Arguments are rejected before any worker is launched
    InvalidArgument,
    /// Allocation of the hash table, the sort buffers or the table slots along a
    /// probe sequence is exhausted
    ResourceExhausted,
    /// A stage failed to launch or to synchronize
    ExecutionFault,
}

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GroupbyError {
    #[snafu(display("Size of the input columns should be positive, found `{size}`"))]
    NonPositiveSize { size: i64 },
    #[snafu(display("Pointer to the `{column}` input column is null"))]
    NullInput { column: &'static str },
    #[snafu(display("Pointer to the `{column}` output column is null"))]
    NullOutput { column: &'static str },
    #[snafu(display(
        "Groupby column has `{groupby_len}` rows, however the aggregation column has `{aggregation_len}` rows"
    ))]
    ColumnLengthMismatch {
        groupby_len: usize,
        aggregation_len: usize,
    },
    #[snafu(display(
        "Output columns should hold at least `{input_size}` elements, found groupby output with `{out_groupby_len}` elements and aggregation output with `{out_aggregation_len}` elements"
    ))]
    OutputTooSmall {
        input_size: usize,
        out_groupby_len: usize,
        out_aggregation_len: usize,
    },
    #[snafu(display("Hash table occupancy should be in range `1..=100`, found `{occupancy}`"))]
    InvalidOccupancy { occupancy: u32 },
    #[snafu(display("Failed to create the device that executes the groupby"))]
    CreateDevice { source: DeviceError },
    #[snafu(display("Failed to allocate the hash table"))]
    AllocateHashTable { source: HashTableError },
    #[snafu(display("Failed to build the aggregation table"))]
    Build { source: HashTableError },
    #[snafu(display("Failed to extract the groupby result"))]
    Extract { source: ExtractError },
    #[snafu(display("Failed to synchronize the `{stage}` stage"))]
    Synchronize {
        stage: &'static str,
        source: DeviceError,
    },
    #[snafu(display("Failed to sort the groupby result"))]
    Sort { source: SortError },
}

impl GroupbyError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NonPositiveSize { .. }
            | Self::NullInput { .. }
            | Self::NullOutput { .. }
            | Self::ColumnLengthMismatch { .. }
            | Self::OutputTooSmall { .. }
            | Self::InvalidOccupancy { .. } => ErrorKind::InvalidArgument,
            Self::AllocateHashTable { .. } => ErrorKind::ResourceExhausted,
            Self::Extract { .. } => ErrorKind::InvalidArgument,
            Self::Build { source } => match source {
                HashTableError::SentinelKey { .. } => ErrorKind::InvalidArgument,
                HashTableError::Allocate { .. } | HashTableError::CapacityExceeded { .. } => {
                    ErrorKind::ResourceExhausted
                }
            },
            Self::CreateDevice { .. } | Self::Synchronize { .. } => ErrorKind::ExecutionFault,
            Self::Sort { source } => match source {
                SortError::AllocateTempStorage { .. } | SortError::AllocateAlternate { .. } => {
                    ErrorKind::ResourceExhausted
                }
                SortError::TempStorageTooSmall { .. }
                | SortError::BufferLengthMismatch { .. }
                | SortError::Synchronize { .. } => ErrorKind::ExecutionFault,
            },
        }
    }
}

/// Result type of the groupby
pub type Result<T> = std::result::Result<T, GroupbyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let err = GroupbyError::ColumnLengthMismatch {
            groupby_len: 3,
            aggregation_len: 2,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let expect = expect_test::expect![
            "Groupby column has `3` rows, however the aggregation column has `2` rows"
        ];
        expect.assert_eq(&err.to_string());
    }

    #[test]
    fn test_build_error_kind() {
        let err = GroupbyError::Build {
            source: HashTableError::CapacityExceeded {
                key: "7".to_string(),
                capacity: 4,
            },
        };
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);

        let err = GroupbyError::Build {
            source: HashTableError::SentinelKey {
                key: "255".to_string(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_extract_error_kind() {
        let err = GroupbyError::Extract {
            source: ExtractError::OutputTooSmall {
                index: 1,
                out_groupby_len: 1,
                out_aggregation_len: 1,
            },
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
