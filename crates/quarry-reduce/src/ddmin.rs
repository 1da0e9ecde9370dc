//! Delta debugging over an item list.
//!
//! Zeller's ddmin, complement-flavored: split the list into chunks, try
//! dropping each chunk; when a drop still reproduces the failure, restart
//! at the coarsest granularity over the smaller list; when no chunk can
//! be dropped, double the partition count until chunks are single items.

use tracing::debug;

/// Minimizes `items` under `still_fails`, bounded by `max_rounds` test
/// runs. The predicate receives a candidate subset and returns whether
/// the failure still reproduces. `items` itself is assumed to fail.
pub fn ddmin<T: Clone>(
    items: Vec<T>,
    max_rounds: usize,
    mut still_fails: impl FnMut(&[T]) -> bool,
) -> Vec<T> {
    let mut current = items;
    let mut granularity = 2usize;
    let mut rounds = 0usize;

    'outer: while current.len() >= 2 && granularity <= current.len() {
        let chunk = current.len().div_ceil(granularity);
        let mut start = 0;
        while start < current.len() {
            if rounds >= max_rounds {
                debug!(rounds, remaining = current.len(), "ddmin round budget spent");
                break 'outer;
            }
            let end = (start + chunk).min(current.len());
            let mut candidate = Vec::with_capacity(current.len() - (end - start));
            candidate.extend_from_slice(&current[..start]);
            candidate.extend_from_slice(&current[end..]);

            rounds += 1;
            if !candidate.is_empty() && still_fails(&candidate) {
                current = candidate;
                granularity = 2;
                continue 'outer;
            }
            start = end;
        }

        if granularity >= current.len() {
            break;
        }
        granularity = (granularity * 2).min(current.len());
    }

    current
}
