//! Shared machinery for the ordered-prefix packer family (`DefaultBin`,
//! `AgingBin`, `RandomBin`, `LeastRecentBin`): a `Vec` kept sorted
//! ascending by a per-task numeric key, consumed greedily from the front.

use crate::model::Task;

/// Inserts `task` keyed by `key`, at the rightmost position among entries
/// with an equal key (so among ties, earlier insertions stay in front).
pub(super) fn insert_sorted<K: PartialOrd + Copy>(entries: &mut Vec<(K, Task)>, key: K, task: Task) {
    let ix = entries.partition_point(|(k, _)| *k <= key);
    entries.insert(ix, (key, task));
}

/// Greedily consumes a prefix of `entries` whose costs fit within
/// `binsize`, stopping as soon as the head task doesn't fit (never
/// skipping ahead, to preserve the ordering discipline).
pub(super) fn greedy_prefix<K>(entries: &mut Vec<(K, Task)>, binsize: u64) -> Vec<Task> {
    let mut bin_cost = 0u64;
    let mut taken = Vec::new();
    while let Some((_, task)) = entries.first() {
        if bin_cost + task.cost <= binsize {
            let (_, task) = entries.remove(0);
            bin_cost += task.cost;
            taken.push(task);
        } else {
            break;
        }
    }
    taken
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Check;

    fn task(cost: u64, priority: u8) -> Task {
        let check = Check::new("G", "C", cost, priority);
        Task::new(check.id, 0, cost, 0, priority)
    }

    #[test]
    fn insert_sorted_keeps_ascending_order_and_ties_after_existing() {
        let mut entries: Vec<(i64, Task)> = Vec::new();
        insert_sorted(&mut entries, 5, task(10, 5));
        insert_sorted(&mut entries, 1, task(10, 1));
        insert_sorted(&mut entries, 5, task(10, 5));
        let keys: Vec<_> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 5, 5]);
    }

    #[test]
    fn greedy_prefix_stops_at_first_non_fitting_task() {
        let mut entries: Vec<(i64, Task)> = vec![(0, task(60, 1)), (1, task(60, 1)), (2, task(10, 1))];
        let taken = greedy_prefix(&mut entries, 100);
        // second task doesn't fit after the first (60+60 > 100); the third
        // task, although it would fit, must not be skipped ahead to.
        assert_eq!(taken.len(), 1);
        assert_eq!(entries.len(), 2);
    }
}
