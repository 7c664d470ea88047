//! Conditional fan-out of per-member work onto the rayon pool.

use crate::config::BillingConfig;

/// Maps `f` over `items`, in parallel when the `parallel` feature is on,
/// `config.parallel` is set and the lot reaches `config.parallel_threshold`.
///
/// Output order always matches input order.
#[allow(unused_variables)]
pub fn maybe_parallel_map<T, U, F>(items: &[T], config: &BillingConfig, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        if config.should_parallelize(items.len()) {
            return items.par_iter().map(f).collect();
        }
    }

    items.iter().map(f).collect()
}
