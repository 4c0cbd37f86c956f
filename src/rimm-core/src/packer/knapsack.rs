//! The 0/1 knapsack DP shared by `CostKnapsackBin` and `PriorityKnapsackBin`.
//! Bottom-up table `T[w][i]`, `O(N*W)` time and memory (`N` = queue length,
//! `W` = `binsize`) — this is quadratic in `binsize` and is only reasonable
//! because `binsize` models a microsecond budget in the low hundreds, not
//! an arbitrary capacity.

use crate::model::Task;

/// Returns the indices (into `queue`) of the subset maximizing
/// `sum(value_of(task))` subject to `sum(task.cost) <= binsize`.
///
/// Ties are broken with a strict `<` ("beat the previous best") test, so
/// among equal-value choices the earlier-indexed (insertion order) items
/// are preferred.
pub(super) fn select_knapsack<F: Fn(&Task) -> u64>(queue: &[Task], binsize: u64, value_of: F) -> Vec<usize> {
    let n = queue.len();
    if n == 0 || binsize == 0 {
        return Vec::new();
    }
    let w_max = binsize as usize;

    // dp_value[w][i] / dp_included[w][i]: best value using items 0..=i with
    // capacity w, and whether item i was included to reach it.
    let mut dp_value = vec![vec![0u64; n]; w_max + 1];
    let mut dp_included = vec![vec![false; n]; w_max + 1];

    for w in 0..=w_max {
        let cost0 = queue[0].cost as usize;
        if cost0 <= w {
            dp_value[w][0] = value_of(&queue[0]);
            dp_included[w][0] = true;
        }
    }

    for i in 1..n {
        let cost_i = queue[i].cost as usize;
        for w in 0..=w_max {
            let without = dp_value[w][i - 1];
            if cost_i <= w {
                let with = dp_value[w - cost_i][i - 1] + value_of(&queue[i]);
                if without < with {
                    dp_value[w][i] = with;
                    dp_included[w][i] = true;
                    continue;
                }
            }
            dp_value[w][i] = without;
            dp_included[w][i] = false;
        }
    }

    let mut chosen = Vec::new();
    let mut w = w_max;
    let mut i = n - 1;
    loop {
        if dp_included[w][i] {
            chosen.push(i);
            w -= queue[i].cost as usize;
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }
    chosen
}
