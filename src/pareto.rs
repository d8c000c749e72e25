//! Pareto dominance and front filtering.
//!
//! All metrics are maximized. A point **dominates** another when its score
//! is strictly greater in *every* metric — strictly stronger than the usual
//! "no worse anywhere, better somewhere" relation, which keeps ties and
//! incomparable points on the front rather than breaking them.
//!
//! The front filter is the O(n²) pairwise prune used by
//! [`MultiObjectiveEngine::pareto_front`](crate::MultiObjectiveEngine::pareto_front)
//! over a dense prediction grid.

/// Returns `true` if `a` dominates `b`: strictly greater in every metric.
#[must_use]
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).all(|(&av, &bv)| av > bv)
}

/// Indices of the non-dominated subset of `scores`, in input order.
///
/// O(n²) pairwise comparison; no tie-breaking beyond the dominance test.
#[must_use]
pub fn non_dominated_indices(scores: &[Vec<f64>]) -> Vec<usize> {
    let n = scores.len();
    let mut on_front = vec![true; n];
    for i in 0..n {
        for j in 0..i {
            if !on_front[i] || !on_front[j] {
                continue;
            }
            if dominates(&scores[i], &scores[j]) {
                on_front[j] = false;
            } else if dominates(&scores[j], &scores[i]) {
                on_front[i] = false;
            }
        }
    }
    (0..n).filter(|&i| on_front[i]).collect()
}

/// Orders a two-metric front by polar angle around its per-metric minima,
/// which traces the front monotonically for reporting.
///
/// Each entry is `(point, score)`; only the first two score components are
/// consulted.
pub fn sort_front_by_polar_angle(front: &mut [(Vec<f64>, Vec<f64>)]) {
    let min0 = front
        .iter()
        .map(|(_, s)| s[0])
        .fold(f64::INFINITY, f64::min);
    let min1 = front
        .iter()
        .map(|(_, s)| s[1])
        .fold(f64::INFINITY, f64::min);

    front.sort_by(|(_, a), (_, b)| {
        let angle_a = (a[1] - min1).atan2(a[0] - min0);
        let angle_b = (b[1] - min1).atan2(b[0] - min0);
        angle_a
            .partial_cmp(&angle_b)
            .unwrap_or(core::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominance_requires_strict_in_every_metric() {
        assert!(dominates(&[2.0, 2.0], &[1.0, 1.0]));
        // Equal in one metric is not dominance.
        assert!(!dominates(&[2.0, 1.0], &[1.0, 1.0]));
        assert!(!dominates(&[1.0, 1.0], &[1.0, 1.0]));
        // Incomparable.
        assert!(!dominates(&[2.0, 0.0], &[1.0, 1.0]));
    }

    #[test]
    fn front_members_do_not_dominate_each_other() {
        let scores = vec![
            vec![1.0, 5.0],
            vec![5.0, 1.0],
            vec![3.0, 3.0],
            vec![2.0, 2.0], // dominated by (3, 3)
            vec![0.5, 0.5], // dominated by all others
        ];
        let front = non_dominated_indices(&scores);
        assert_eq!(front, vec![0, 1, 2]);
        for &i in &front {
            for &j in &front {
                if i != j {
                    assert!(!dominates(&scores[i], &scores[j]));
                }
            }
        }
    }

    #[test]
    fn excluded_points_are_dominated_by_someone() {
        let scores = vec![
            vec![1.0, 5.0],
            vec![5.0, 1.0],
            vec![3.0, 3.0],
            vec![2.0, 2.0],
        ];
        let front = non_dominated_indices(&scores);
        for i in 0..scores.len() {
            if !front.contains(&i) {
                assert!(scores.iter().any(|s| dominates(s, &scores[i])));
            }
        }
    }

    #[test]
    fn ties_stay_on_front() {
        let scores = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        assert_eq!(non_dominated_indices(&scores), vec![0, 1]);
    }

    #[test]
    fn polar_sort_orders_two_metric_front() {
        let mut front = vec![
            (vec![0.0], vec![3.0, 3.0]),
            (vec![1.0], vec![5.0, 1.0]),
            (vec![2.0], vec![1.0, 5.0]),
        ];
        sort_front_by_polar_angle(&mut front);
        // Ascending polar angle: closest to the first-metric axis first.
        assert_eq!(front[0].1, vec![5.0, 1.0]);
        assert_eq!(front[2].1, vec![1.0, 5.0]);
    }
}
