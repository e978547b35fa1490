// src/partition/splitter.rs

//! Interval splitting along the service's own bucketing rules.

use crate::models::{DimensionRules, Interval};

/// Upper bound on sub-intervals produced per split.
pub const MAX_BUCKETS: i64 = 5;

/// Split `[min, max]` into contiguous, ordered sub-intervals.
///
/// - a breakpoint strictly inside the range always yields exactly two halves
///   meeting at the breakpoint;
/// - otherwise up to [`MAX_BUCKETS`] buckets of equal width are produced, the
///   width snapped down to the granularity floor (never below it) and the last
///   bucket absorbing the remainder up to `max`.
///
/// A single interval back means the range is already minimal.
pub fn split(rules: &DimensionRules, min: i64, max: i64) -> Vec<Interval> {
    if min >= max {
        return vec![Interval::new(min, max)];
    }

    if let Some(breakpoint) = rules.breakpoint {
        if min < breakpoint && breakpoint < max {
            return vec![
                Interval::new(min, breakpoint),
                Interval::new(breakpoint, max),
            ];
        }
    }

    let range = max - min;
    let step = rules.step_for(min);
    let width = (range / MAX_BUCKETS / step * step).max(step);
    let buckets = (range / width).clamp(1, MAX_BUCKETS);

    (0..buckets)
        .map(|i| {
            let lo = min + i * width;
            let hi = if i == buckets - 1 { max } else { lo + width };
            Interval::new(lo, hi)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(intervals: Vec<Interval>) -> Vec<(i64, i64)> {
        intervals.into_iter().map(|iv| (iv.min, iv.max)).collect()
    }

    #[test]
    fn test_area_splits() {
        let area = DimensionRules::area();
        assert_eq!(pairs(split(&area, 1000, 1010)), vec![(1000, 1010)]);
        assert_eq!(
            pairs(split(&area, 1000, 1500)),
            vec![(1000, 1100), (1100, 1200), (1200, 1300), (1300, 1400), (1400, 1500)]
        );
        assert_eq!(
            pairs(split(&area, 1000, 1320)),
            vec![(1000, 1060), (1060, 1120), (1120, 1180), (1180, 1240), (1240, 1320)]
        );
        assert_eq!(pairs(split(&area, 10, 10)), vec![(10, 10)]);
        assert_eq!(pairs(split(&area, 10, 13)), vec![(10, 11), (11, 12), (12, 13)]);
        assert_eq!(pairs(split(&area, 10, 12_000)), vec![(10, 1000), (1000, 12_000)]);
    }

    #[test]
    fn test_price_splits() {
        let price = DimensionRules::price();
        assert_eq!(pairs(split(&price, 10, 10)), vec![(10, 10)]);
        assert_eq!(
            pairs(split(&price, 10, 2_000_000)),
            vec![(10, 1_000_000), (1_000_000, 2_000_000)]
        );
        assert_eq!(
            pairs(split(&price, 10_000, 310_000)),
            vec![
                (10_000, 70_000),
                (70_000, 130_000),
                (130_000, 190_000),
                (190_000, 250_000),
                (250_000, 310_000)
            ]
        );
        assert_eq!(
            pairs(split(&price, 1_200_000, 2_000_000)),
            vec![
                (1_200_000, 1_360_000),
                (1_360_000, 1_520_000),
                (1_520_000, 1_680_000),
                (1_680_000, 1_840_000),
                (1_840_000, 2_000_000)
            ]
        );
        assert_eq!(
            pairs(split(&price, 1_200_000, 1_220_000)),
            vec![(1_200_000, 1_210_000), (1_210_000, 1_220_000)]
        );
        assert_eq!(
            pairs(split(&price, 1000, 4000)),
            vec![(1000, 2000), (2000, 3000), (3000, 4000)]
        );
    }

    #[test]
    fn test_remainder_merges_into_last_bucket() {
        let price = DimensionRules::price();
        assert_eq!(
            pairs(split(&price, 1000, 4500)),
            vec![(1000, 2000), (2000, 3000), (3000, 4500)]
        );
        // Width snaps to the floor, so the bucket count is capped instead.
        assert_eq!(
            pairs(split(&price, 0, 9000)),
            vec![(0, 1000), (1000, 2000), (2000, 3000), (3000, 4000), (4000, 9000)]
        );
    }

    #[test]
    fn test_narrower_than_floor_is_minimal() {
        let area = DimensionRules::area();
        assert_eq!(pairs(split(&area, 1000, 1005)), vec![(1000, 1005)]);
        assert_eq!(split(&area, 1000, 1020).len(), 2);
    }

    #[test]
    fn test_year_splits() {
        let year = DimensionRules::year();
        assert_eq!(
            pairs(split(&year, 1980, 1983)),
            vec![(1980, 1981), (1981, 1982), (1982, 1983)]
        );
        assert_eq!(
            pairs(split(&year, 1900, 2000)),
            vec![(1900, 1920), (1920, 1940), (1940, 1960), (1960, 1980), (1980, 2000)]
        );
        assert_eq!(pairs(split(&year, 1999, 2000)), vec![(1999, 2000)]);
    }

    #[test]
    fn test_splits_cover_range_contiguously() {
        let all_rules = [
            DimensionRules::price(),
            DimensionRules::area(),
            DimensionRules::year(),
        ];
        let bounds = [
            0, 1, 7, 10, 13, 999, 1000, 1001, 1005, 1010, 1320, 4_500, 12_000, 99_999,
            999_000, 1_000_000, 1_015_000, 2_000_000, 7_654_321,
        ];

        for rules in &all_rules {
            for &min in &bounds {
                for &max in bounds.iter().filter(|&&m| m >= min) {
                    let parts = split(rules, min, max);
                    assert!(
                        (1..=MAX_BUCKETS as usize).contains(&parts.len()),
                        "{min}..{max}: {parts:?}"
                    );
                    assert_eq!(parts.first().unwrap().min, min);
                    assert_eq!(parts.last().unwrap().max, max);
                    for pair in parts.windows(2) {
                        assert_eq!(pair[0].max, pair[1].min, "gap in {min}..{max}");
                        assert!(pair[0].min < pair[0].max, "empty bucket in {min}..{max}");
                    }
                    if parts.len() > 1 {
                        assert!(parts.iter().all(|p| p.width() < max - min));
                    }
                }
            }
        }
    }
}
