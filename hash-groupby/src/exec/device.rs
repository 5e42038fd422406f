//! [`Device`] launches kernels: a kernel is a closure executed by one logical worker per
//! work item. Workers are grouped into fixed size blocks, each block is a task of the
//! rayon pool. Launching returns after all of the workers have finished, it is the
//! global barrier between the stages.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use snafu::{ResultExt, Snafu};

use crate::common::exec_args::ExecArgs;
use crate::common::types::ParallelismDegree;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DeviceError {
    #[snafu(display("Failed to build the thread pool with `{parallelism}` threads"))]
    BuildThreadPool {
        parallelism: ParallelismDegree,
        source: ThreadPoolBuildError,
    },
    #[snafu(display("Worker of kernel `{kernel}` panicked: {message}"))]
    Synchronize {
        kernel: &'static str,
        message: String,
    },
}

type Result<T> = std::result::Result<T, DeviceError>;

/// Executor of the kernels
#[derive(Debug)]
pub struct Device {
    /// `None` means the global rayon pool
    pool: Option<ThreadPool>,
    block_size: NonZeroUsize,
}

impl Device {
    /// Try to create a new device from the exec args
    pub fn try_new(exec_args: &ExecArgs) -> Result<Self> {
        let pool = exec_args
            .parallelism
            .map(|parallelism| {
                ThreadPoolBuilder::new()
                    .num_threads(parallelism.get() as usize)
                    .thread_name(|index| format!("hash-groupby-worker-{index}"))
                    .build()
                    .context(BuildThreadPoolSnafu { parallelism })
            })
            .transpose()?;

        Ok(Self {
            pool,
            block_size: exec_args.block_size,
        })
    }

    /// Number of threads that execute the workers
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Number of blocks needed to cover `work_items` workers
    #[inline]
    pub fn grid_size(&self, work_items: usize) -> usize {
        work_items.div_ceil(self.block_size.get())
    }

    /// Launch the `kernel` with `work_items` logical workers and wait for all of them.
    /// The worker is called with the index of its work item, there is no ordering
    /// between the workers.
    ///
    /// The outer result reports a fault of the device: a panicked worker. The inner
    /// result is the first error returned by a worker, the remaining blocks are not
    /// started after a worker failed. Work done before the failure is not rolled back
    pub fn launch<E, F>(
        &self,
        kernel: &'static str,
        work_items: usize,
        worker: F,
    ) -> Result<std::result::Result<(), E>>
    where
        E: Send,
        F: Fn(usize) -> std::result::Result<(), E> + Send + Sync,
    {
        let block_size = self.block_size.get();
        let grid_size = self.grid_size(work_items);
        tracing::trace!(
            "Launch kernel `{}` with `{}` blocks of `{}` workers",
            kernel,
            grid_size,
            block_size
        );

        let execute = || {
            (0..grid_size).into_par_iter().try_for_each(|block| {
                let start = block * block_size;
                let end = std::cmp::min(start + block_size, work_items);
                (start..end).try_for_each(&worker)
            })
        };

        self.install(kernel, execute)
    }

    /// Execute `op` in the pool of the device and wait for it. Rayon parallel iterators
    /// used inside `op` run on the pool of the device
    pub fn install<R, OP>(&self, kernel: &'static str, op: OP) -> Result<R>
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        std::panic::catch_unwind(AssertUnwindSafe(|| match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }))
        .map_err(|payload| DeviceError::Synchronize {
            kernel,
            message: panic_message(payload.as_ref()),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
