//! Minimum-raggedness line breaking.
//!
//! Dynamic program over word widths: every non-last line costs its squared
//! slack, the last line is free, and the partition with the smallest total
//! wins. A word wider than the line is placed alone instead of failing.

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

/// Cost sentinel for "no usable partition from here".
pub const MAX_COST: i32 = i32::MAX;

/// Cost of placing words `start..=end` on one line, `None` if they overflow.
///
/// The final line of a paragraph (`end == widths.len() - 1`) costs nothing.
pub fn line_cost(
    widths: &[i32],
    start: usize,
    end: usize,
    page_width: i32,
    space_width: i32,
    rest_cost: i32,
) -> Option<i32> {
    let content: i64 = widths[start..=end].iter().map(|&w| w as i64).sum::<i64>()
        + (end - start) as i64 * space_width as i64;
    if content > page_width as i64 {
        return None;
    }
    if end + 1 == widths.len() {
        return Some(0);
    }
    let slack = page_width as i64 - content;
    let cost = slack * slack + rest_cost as i64;
    Some(cost.min(MAX_COST as i64) as i32)
}

/// Break `widths` into lines no wider than `page_width`.
///
/// Returns exclusive end indices, one per line; the last entry is always
/// `widths.len()`. Empty input yields no lines.
pub fn compute_line_breaks(widths: &[i32], page_width: i32, space_width: i32) -> Vec<usize> {
    let n = widths.len();
    if n == 0 {
        return Vec::new();
    }

    let mut dp = vec![0i32; n];
    let mut next = vec![0usize; n];
    next[n - 1] = n - 1;

    for i in (0..n - 1).rev() {
        let mut best: Option<(i32, usize)> = None;

        for j in i..n {
            let rest = if j + 1 < n { dp[j + 1] } else { 0 };
            let Some(cost) = line_cost(widths, i, j, page_width, space_width, rest) else {
                break;
            };
            if best.map_or(true, |(c, _)| cost < c) {
                best = Some((cost, j));
            }
        }

        match best {
            Some((cost, j)) => {
                dp[i] = cost;
                next[i] = j;
            }
            None => {
                // Word alone is wider than the line: give it its own line.
                log::warn!(
                    "[PTX] Word {} is {}px, wider than {}px line",
                    i,
                    widths[i],
                    page_width
                );
                dp[i] = dp[i + 1];
                next[i] = i;
            }
        }
    }

    let mut breaks = Vec::new();
    let mut i = 0;
    while i < n {
        let end = (next[i] + 1).max(i + 1);
        breaks.push(end);
        i = end;
    }
    breaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition_cost(widths: &[i32], breaks: &[usize], page: i32, space: i32) -> Option<i64> {
        let mut start = 0;
        let mut total = 0i64;
        for (idx, &end) in breaks.iter().enumerate() {
            let content: i64 = widths[start..end].iter().map(|&w| w as i64).sum::<i64>()
                + (end - start - 1) as i64 * space as i64;
            if content > page as i64 {
                return None;
            }
            if idx + 1 != breaks.len() {
                let slack = page as i64 - content;
                total += slack * slack;
            }
            start = end;
        }
        Some(total)
    }

    fn brute_force_best(widths: &[i32], page: i32, space: i32) -> i64 {
        let n = widths.len();
        let mut best = i64::MAX;
        for mask in 0u32..(1 << (n - 1)) {
            let mut breaks = Vec::new();
            for bit in 0..n - 1 {
                if mask & (1 << bit) != 0 {
                    breaks.push(bit + 1);
                }
            }
            breaks.push(n);
            if let Some(cost) = partition_cost(widths, &breaks, page, space) {
                best = best.min(cost);
            }
        }
        best
    }

    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: i32) -> i32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 33) % bound as u64) as i32
        }
    }

    #[test]
    fn test_empty_input_has_no_lines() {
        assert!(compute_line_breaks(&[], 100, 5).is_empty());
    }

    #[test]
    fn test_single_word() {
        assert_eq!(compute_line_breaks(&[30], 100, 5), [1]);
    }

    #[test]
    fn test_everything_fits_on_one_line() {
        assert_eq!(compute_line_breaks(&[10, 10, 10], 100, 5), [3]);
    }

    #[test]
    fn test_prefers_balanced_lines() {
        // Greedy would put three words on the first line and leave a tail.
        let widths = [30, 30, 30, 60];
        let breaks = compute_line_breaks(&widths, 100, 5);
        assert_eq!(
            partition_cost(&widths, &breaks, 100, 5),
            Some(brute_force_best(&widths, 100, 5))
        );
    }

    #[test]
    fn test_matches_brute_force_for_small_inputs() {
        let mut rng = Lcg(0x5eed);
        for _ in 0..400 {
            let n = 1 + rng.next(8) as usize;
            let page = 60 + rng.next(140);
            let space = 1 + rng.next(10);
            let widths: Vec<i32> = (0..n).map(|_| 1 + rng.next(page)).collect();

            let breaks = compute_line_breaks(&widths, page, space);
            assert_eq!(*breaks.last().unwrap(), n);
            let cost = partition_cost(&widths, &breaks, page, space)
                .expect("line breaker produced an overflowing line");
            assert_eq!(
                cost,
                brute_force_best(&widths, page, space),
                "widths {:?} page {} space {}",
                widths,
                page,
                space
            );
        }
    }

    #[test]
    fn test_oversized_word_gets_its_own_line() {
        let widths = [20, 20, 500, 20, 20];
        let breaks = compute_line_breaks(&widths, 100, 5);
        assert_eq!(breaks, [2, 3, 5]);
    }

    #[test]
    fn test_oversized_first_and_last_words() {
        assert_eq!(compute_line_breaks(&[500, 10, 500], 100, 5), [1, 2, 3]);
    }

    #[test]
    fn test_breaks_strictly_increase() {
        let widths = [200; 12];
        let breaks = compute_line_breaks(&widths, 100, 5);
        assert_eq!(breaks.len(), 12);
        assert!(breaks.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_cost_saturates_instead_of_overflowing() {
        let widths = [1, 1, 1];
        let breaks = compute_line_breaks(&widths, i32::MAX / 2, 0);
        assert_eq!(breaks, [3]);
        assert_eq!(line_cost(&widths, 0, 0, i32::MAX, 0, MAX_COST), Some(MAX_COST));
    }
}
