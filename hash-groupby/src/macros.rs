//! Macros

macro_rules! shared_output_write_safety {
    () => {
        // SAFETY: The index is fetched from the write cursor with `fetch_add`, each live
        // slot gets a distinct index. It is checked against the length of both output
        // columns right before the write
    };
}

pub(crate) use shared_output_write_safety;
