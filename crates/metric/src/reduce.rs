//! Ready-made reduction functions for [`RollingPolicy::reduce`].
//!
//! [`RollingPolicy::reduce`]: crate::RollingPolicy::reduce

use crate::window::Bucket;

/// Sum of every point in the live window.
pub fn sum(iter: &mut dyn Iterator<Item = &Bucket>) -> f64 {
    iter.map(|b| b.points.iter().sum::<f64>()).sum()
}

/// Total number of accumulated values in the live window.
pub fn count(iter: &mut dyn Iterator<Item = &Bucket>) -> f64 {
    iter.map(|b| b.count as f64).sum()
}

/// Point sum divided by the accumulated count; `0.0` for an empty window.
pub fn avg(iter: &mut dyn Iterator<Item = &Bucket>) -> f64 {
    let (total, n) = iter.fold((0.0, 0u64), |(total, n), b| {
        (total + b.points.iter().sum::<f64>(), n + b.count)
    });
    if n == 0 {
        return 0.0;
    }
    total / n as f64
}

/// Smallest point in the live window; `0.0` if there are no points.
pub fn min(iter: &mut dyn Iterator<Item = &Bucket>) -> f64 {
    extremum(iter, |candidate, current| candidate < current)
}

/// Largest point in the live window; `0.0` if there are no points.
pub fn max(iter: &mut dyn Iterator<Item = &Bucket>) -> f64 {
    extremum(iter, |candidate, current| candidate > current)
}

fn extremum(
    iter: &mut dyn Iterator<Item = &Bucket>,
    better: impl Fn(f64, f64) -> bool,
) -> f64 {
    let mut result: Option<f64> = None;
    for bucket in iter {
        for &point in &bucket.points {
            match result {
                Some(current) if !better(point, current) => {}
                _ => result = Some(point),
            }
        }
    }
    result.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buckets(values: &[&[f64]]) -> Vec<Bucket> {
        values
            .iter()
            .map(|points| Bucket {
                points: points.to_vec(),
                count: points.len() as u64,
            })
            .collect()
    }

    #[test]
    fn sum_and_count() {
        let b = buckets(&[&[1.0, 2.0], &[], &[4.0]]);
        assert_eq!(sum(&mut b.iter()), 7.0);
        assert_eq!(count(&mut b.iter()), 3.0);
    }

    #[test]
    fn avg_ignores_empty_buckets() {
        let b = buckets(&[&[2.0], &[], &[4.0]]);
        assert_eq!(avg(&mut b.iter()), 3.0);
        assert_eq!(avg(&mut buckets(&[&[], &[]]).iter()), 0.0);
    }

    #[test]
    fn min_and_max() {
        let b = buckets(&[&[3.0], &[-1.0, 8.0], &[5.0]]);
        assert_eq!(min(&mut b.iter()), -1.0);
        assert_eq!(max(&mut b.iter()), 8.0);
        assert_eq!(min(&mut buckets(&[]).iter()), 0.0);
    }
}
