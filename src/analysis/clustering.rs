//! Density clustering of extrema into candidate price levels.
//!
//! DBSCAN over one dimension with the relative metric `|p1 - p2| / p1`, run
//! independently per extremum kind so peaks and valleys never merge. Density
//! chains can stretch further than `eps` from their own mean, so each cluster
//! is finally cut into contiguous price segments whose members all sit within
//! `eps` of the segment centroid. Segments smaller than `min_samples` are noise.

use crate::models::{ExtremumKind, ExtremumPoint, LevelCluster};
use crate::utils::maths_utils::relative_distance;

const UNVISITED: usize = usize::MAX;
const NOISE: usize = usize::MAX - 1;

/// Cluster peaks and valleys separately. Output is sorted by centroid within each kind,
/// resistance (peak) clusters first.
pub fn cluster_extrema(points: &[ExtremumPoint], eps: f64, min_samples: usize) -> Vec<LevelCluster> {
    let mut clusters = Vec::new();
    for kind in [ExtremumKind::Peak, ExtremumKind::Valley] {
        let same_kind: Vec<ExtremumPoint> =
            points.iter().filter(|p| p.kind == kind).copied().collect();
        clusters.extend(cluster_one_kind(kind, &same_kind, eps, min_samples));
    }
    clusters
}

fn cluster_one_kind(
    kind: ExtremumKind,
    points: &[ExtremumPoint],
    eps: f64,
    min_samples: usize,
) -> Vec<LevelCluster> {
    let min_samples = min_samples.max(1);
    if points.len() < min_samples {
        return Vec::new();
    }

    let labels = dbscan_labels(points, eps, min_samples);
    let n_clusters = labels.iter().filter(|&&l| l < NOISE).max().map_or(0, |m| m + 1);

    let mut clusters: Vec<LevelCluster> = (0..n_clusters)
        .flat_map(|label| {
            let members: Vec<ExtremumPoint> = points
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == label)
                .map(|(p, _)| *p)
                .collect();
            split_to_tolerance(kind, members, eps, min_samples)
        })
        .collect();

    clusters.sort_by(|a, b| a.centroid.total_cmp(&b.centroid));
    clusters
}

/// Classic DBSCAN labelling. The neighbourhood of `p` includes `p` itself.
fn dbscan_labels(points: &[ExtremumPoint], eps: f64, min_samples: usize) -> Vec<usize> {
    let neighbours = |i: usize| -> Vec<usize> {
        (0..points.len())
            .filter(|&j| relative_distance(points[i].price, points[j].price) <= eps)
            .collect()
    };

    let mut labels = vec![UNVISITED; points.len()];
    let mut next_label = 0usize;

    for i in 0..points.len() {
        if labels[i] != UNVISITED {
            continue;
        }
        let seeds = neighbours(i);
        if seeds.len() < min_samples {
            labels[i] = NOISE;
            continue;
        }

        let label = next_label;
        next_label += 1;
        labels[i] = label;

        let mut queue = seeds;
        let mut cursor = 0;
        while cursor < queue.len() {
            let j = queue[cursor];
            cursor += 1;
            if labels[j] == NOISE {
                // Border point
                labels[j] = label;
            }
            if labels[j] != UNVISITED {
                continue;
            }
            labels[j] = label;
            let expansion = neighbours(j);
            if expansion.len() >= min_samples {
                queue.extend(expansion);
            }
        }
    }
    labels
}

/// Cut a density cluster into price-contiguous segments whose members all lie within
/// `eps` of the segment centroid.
fn split_to_tolerance(
    kind: ExtremumKind,
    mut members: Vec<ExtremumPoint>,
    eps: f64,
    min_samples: usize,
) -> Vec<LevelCluster> {
    members.sort_by(|a, b| a.price.total_cmp(&b.price).then(a.index.cmp(&b.index)));

    let mut segments: Vec<Vec<ExtremumPoint>> = Vec::new();
    let mut current: Vec<ExtremumPoint> = Vec::new();

    for point in members {
        current.push(point);
        if !within_tolerance(&current, eps) {
            let overflow = current.pop();
            segments.push(std::mem::take(&mut current));
            current.extend(overflow);
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
        .into_iter()
        .filter(|segment| segment.len() >= min_samples)
        .filter_map(|mut segment| {
            segment.sort_by_key(|p| p.index);
            LevelCluster::from_members(kind, segment)
        })
        .collect()
}

/// Members are price-sorted, so only the extremes need checking.
fn within_tolerance(sorted_members: &[ExtremumPoint], eps: f64) -> bool {
    let (Some(lowest), Some(highest)) = (sorted_members.first(), sorted_members.last()) else {
        return true;
    };
    let centroid =
        sorted_members.iter().map(|p| p.price).sum::<f64>() / sorted_members.len() as f64;
    relative_distance(centroid, lowest.price) <= eps
        && relative_distance(centroid, highest.price) <= eps
}
