//! DBSCAN over fingerprints with an integer Hamming radius.

use rayon::prelude::*;

use crate::hasher::Fingerprint;

/// Neighbours of one point within the radius: `(index, distance)`, self excluded.
pub type Neighborhood = Vec<(usize, u32)>;

/// Rows handed to one rayon task when building neighbourhoods.
const ROW_BLOCK: usize = 64;

/// Every point's neighbours within `eps`. Rows are computed in parallel
/// blocks; the result is complete before it is returned.
pub fn neighborhoods(fingerprints: &[Fingerprint], eps: u32) -> Vec<Neighborhood> {
    let n = fingerprints.len();
    (0..n)
        .into_par_iter()
        .with_min_len(ROW_BLOCK)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i)
                .filter_map(|j| {
                    let dist = fingerprints[i].distance(&fingerprints[j]);
                    (dist <= eps).then_some((j, dist))
                })
                .collect()
        })
        .collect()
}

/// Cluster label per point; `None` marks noise.
///
/// A point is a core point when it has at least `min_samples` points
/// (itself included) within `eps`. Clusters are grown from core points in
/// index order, so a fixed input order gives a fixed labelling.
pub fn dbscan(neighbors: &[Neighborhood], min_samples: usize) -> Vec<Option<usize>> {
    let n = neighbors.len();
    let is_core: Vec<bool> = neighbors
        .iter()
        .map(|nb| nb.len() + 1 >= min_samples)
        .collect();

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut next_label = 0;

    for start in 0..n {
        if labels[start].is_some() || !is_core[start] {
            continue;
        }
        let label = next_label;
        next_label += 1;
        labels[start] = Some(label);

        let mut stack = vec![start];
        while let Some(p) = stack.pop() {
            for &(q, _) in &neighbors[p] {
                if labels[q].is_none() {
                    labels[q] = Some(label);
                    if is_core[q] {
                        stack.push(q);
                    }
                }
            }
        }
    }

    labels
}

/// Largest nearest-neighbour distance among a cluster's members, i.e. the
/// distance at which its loosest member is attached.
pub fn loosest_link(members: &[usize], neighbors: &[Neighborhood]) -> u32 {
    members
        .iter()
        .filter_map(|&i| {
            neighbors[i]
                .iter()
                .filter(|(j, _)| members.contains(j))
                .map(|&(_, d)| d)
                .min()
        })
        .max()
        .unwrap_or(0)
}
