//! Example: hash groupby with the Max aggregation operator

use hash_groupby::GroupbyHash;
use hash_groupby::common::exec_args::ExecArgs;
use hash_groupby::common::types::ParallelismDegree;
use hash_groupby::exec::aggregate::min_max::Max;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const COUNT: u64 = 100_000_000;
const PARALLELISM: ParallelismDegree = ParallelismDegree::new(10).unwrap();

/// Max of `number % 7` grouped by `number % 1000`, run with `RUST_LOG=debug` to see
/// the metrics
fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let keys = (0..COUNT).map(|number| number % 1000).collect::<Vec<_>>();
    let values = (0..COUNT).map(|number| number % 7).collect::<Vec<_>>();
    let mut out_keys = vec![0; keys.len()];
    let mut out_values = vec![0; values.len()];

    let exec_args = ExecArgs {
        parallelism: Some(PARALLELISM),
        ..ExecArgs::default()
    };

    let now = std::time::Instant::now();
    let groupby = GroupbyHash::try_new(Max {}, exec_args, true).unwrap();
    let output = groupby
        .execute(&keys, &values, &mut out_keys, &mut out_values)
        .unwrap();

    println!(
        "Groupby {} rows into {} groups takes {:?}",
        COUNT,
        output.out_size,
        now.elapsed()
    );
    out_keys[..output.out_size]
        .iter()
        .zip(&out_values[..output.out_size])
        .take(5)
        .for_each(|(key, value)| println!("{key}: {value}"));
}
