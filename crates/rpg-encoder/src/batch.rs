//! Token-aware batch planning for LLM extraction.
//!
//! Estimation is ~1 token per 4 bytes of source plus a fixed per-entity
//! overhead. Entities are appended in input order while within budget; a
//! single oversized entity is isolated; an undersized final batch is merged
//! into its predecessor when the merge stays within the maximum.

/// Bytes per estimated token.
const BYTES_PER_TOKEN: usize = 4;
/// Fixed prompt overhead per entity (name, kind, framing).
const ENTITY_OVERHEAD_TOKENS: usize = 16;

/// Estimated token cost of one entity's source fragment.
pub fn estimate_tokens(source_len: usize) -> usize {
    source_len / BYTES_PER_TOKEN + ENTITY_OVERHEAD_TOKENS
}

/// Plan batches over entity token costs, returning index runs in input order.
pub fn plan_batches(costs: &[usize], min_tokens: usize, max_tokens: usize) -> Vec<Vec<usize>> {
    if costs.is_empty() {
        return Vec::new();
    }

    let mut batches: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_total = 0usize;

    for (idx, &cost) in costs.iter().enumerate() {
        if cost > max_tokens {
            // Oversized entity: isolate it.
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                current_total = 0;
            }
            batches.push(vec![idx]);
            continue;
        }
        if current_total + cost > max_tokens && !current.is_empty() {
            batches.push(std::mem::take(&mut current));
            current_total = 0;
        }
        current.push(idx);
        current_total += cost;
    }
    if !current.is_empty() {
        batches.push(current);
    }

    // Undersized final batch merges into its predecessor when within budget.
    if batches.len() >= 2 {
        let last_total: usize = batches[batches.len() - 1].iter().map(|&i| costs[i]).sum();
        if last_total < min_tokens {
            let prev_total: usize = batches[batches.len() - 2].iter().map(|&i| costs[i]).sum();
            if prev_total + last_total <= max_tokens {
                let last = batches.pop().expect("checked len");
                batches.last_mut().expect("checked len").extend(last);
            }
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flatten(batches: &[Vec<usize>]) -> Vec<usize> {
        batches.iter().flatten().copied().collect()
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(plan_batches(&[], 10, 100).is_empty());
    }

    #[test]
    fn preserves_input_order() {
        let costs = vec![30, 30, 30, 30, 30];
        let batches = plan_batches(&costs, 10, 70);
        assert_eq!(flatten(&batches), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn oversized_entity_is_isolated() {
        let costs = vec![10, 500, 10];
        let batches = plan_batches(&costs, 5, 100);
        assert!(batches.contains(&vec![1]));
        assert_eq!(flatten(&batches), vec![0, 1, 2]);
    }

    #[test]
    fn respects_max_budget() {
        let costs = vec![40, 40, 40];
        let batches = plan_batches(&costs, 10, 100);
        for batch in &batches {
            let total: usize = batch.iter().map(|&i| costs[i]).sum();
            assert!(total <= 100 || batch.len() == 1);
        }
    }

    #[test]
    fn undersized_tail_merges_into_predecessor() {
        // Two batches of 80, then a tail of 5; the tail merges since 85 <= 100.
        let costs = vec![80, 80, 5];
        let batches = plan_batches(&costs, 20, 100);
        assert_eq!(batches, vec![vec![0], vec![1, 2]]);
    }

    #[test]
    fn undersized_tail_kept_when_merge_would_overflow() {
        let costs = vec![95, 95, 10];
        let batches = plan_batches(&costs, 20, 100);
        assert_eq!(batches, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn single_entity_single_batch() {
        assert_eq!(plan_batches(&[42], 10, 100), vec![vec![0]]);
    }

    #[test]
    fn estimate_scales_with_source() {
        assert!(estimate_tokens(4000) > estimate_tokens(40));
        assert_eq!(estimate_tokens(0), ENTITY_OVERHEAD_TOKENS);
    }
}
