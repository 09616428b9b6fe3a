use std::cmp::Ordering;

use crate::domain::PhotoId;
use crate::scoring::{Metric, MetricVector};

/// Elect the keeper of a duplicate group from its members' metric vectors.
///
/// Priority:
/// 1. Scored photos before unscored ones
/// 2. Highest `laplacian_var` (sharpest)
/// 3. Highest `entropy`
/// 4. Lowest photo id
///
/// A missing metric compares below any present value.
pub fn elect_best(members: &[(PhotoId, MetricVector)]) -> Option<PhotoId> {
    members
        .iter()
        .min_by(|(a_id, a), (b_id, b)| {
            a.is_empty()
                .cmp(&b.is_empty())
                .then_with(|| descending(a.get(Metric::LaplacianVar), b.get(Metric::LaplacianVar)))
                .then_with(|| descending(a.get(Metric::Entropy), b.get(Metric::Entropy)))
                .then(a_id.cmp(b_id))
        })
        .map(|(id, _)| *id)
}

fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: i64, laplacian: f64, entropy: f64) -> (PhotoId, MetricVector) {
        let vector = [(Metric::LaplacianVar, laplacian), (Metric::Entropy, entropy)]
            .into_iter()
            .collect();
        (PhotoId(id), vector)
    }

    #[test]
    fn test_sharpest_wins() {
        let members = vec![scored(1, 10.0, 7.0), scored(2, 250.0, 5.0)];
        assert_eq!(elect_best(&members), Some(PhotoId(2)));
    }

    #[test]
    fn test_entropy_breaks_sharpness_tie() {
        let members = vec![scored(1, 100.0, 6.0), scored(2, 100.0, 7.5)];
        assert_eq!(elect_best(&members), Some(PhotoId(2)));
    }

    #[test]
    fn test_lowest_id_breaks_full_tie() {
        let members = vec![scored(9, 100.0, 6.0), scored(3, 100.0, 6.0)];
        assert_eq!(elect_best(&members), Some(PhotoId(3)));
    }

    #[test]
    fn test_unscored_ranks_last() {
        let members = vec![(PhotoId(1), MetricVector::new()), scored(2, 0.0, 0.0)];
        assert_eq!(elect_best(&members), Some(PhotoId(2)));
    }

    #[test]
    fn test_empty_group() {
        assert_eq!(elect_best(&[]), None);
    }
}
