//! Volume-at-price profile and the merge of volume nodes with price clusters.

use crate::models::{LevelCluster, LevelKind, LevelOrigin, OhlcvTimeSeries};
use crate::utils::maths_utils::{RangeF64, percentile, percentile_rank, relative_distance};

// Uniform profiles sit exactly on their mean; nothing there is "disproportionately high".
const MEAN_MARGIN: f64 = 1e-9;

/// Traded volume accumulated into equal-width price bins.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeProfile {
    pub price_range: RangeF64,
    pub volumes: Vec<f64>,
}

/// A bin with disproportionately high traded volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeNode {
    pub bin_index: usize,
    /// Bin midpoint
    pub price: f64,
    pub volume: f64,
    /// 0..=100
    pub percentile: f64,
}

/// A level awaiting historical validation.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelCandidate {
    pub price: f64,
    pub kind: LevelKind,
    pub origin: LevelOrigin,
    /// Extrema behind the candidate; zero for standalone volume nodes
    pub cluster_touches: usize,
    pub volume: f64,
    pub volume_percentile: f64,
    pub has_volume_confirmation: bool,
}

impl VolumeProfile {
    /// Spread every bar's volume evenly across the bins its high-low range covers.
    ///
    /// Returns `None` for an empty series or one whose whole range is a single price.
    pub fn build(series: &OhlcvTimeSeries, bins: usize) -> Option<Self> {
        let (min_price, max_price) = series.price_bounds()?;
        if max_price <= min_price || bins == 0 {
            return None;
        }

        let mut profile = Self {
            price_range: RangeF64::new(min_price, max_price, bins),
            volumes: vec![0.0; bins],
        };
        for bar in series.bars() {
            profile.add_volume_spread(bar.low, bar.high, bar.volume);
        }
        Some(profile)
    }

    fn add_volume_spread(&mut self, low: f64, high: f64, volume: f64) {
        if volume <= 0.0 {
            return;
        }
        if low == high {
            let index = self.price_range.chunk_index(low);
            self.volumes[index] += volume;
            return;
        }

        let num_chunks = self.price_range.count_intersecting_chunks(low, high);
        if num_chunks == 0 {
            log::warn!("Bar range [{}, {}] covers no profile bins. Skipping.", low, high);
            return;
        }

        let quantity_per_bin = volume / num_chunks as f64;
        let start_chunk = self.price_range.chunk_index(low);
        self.volumes
            .iter_mut()
            .skip(start_chunk)
            .take(num_chunks)
            .for_each(|v| *v += quantity_per_bin);
    }

    pub fn total_volume(&self) -> f64 {
        self.volumes.iter().sum()
    }

    /// Volume of the bin containing `price` (zero outside the profiled range).
    pub fn volume_at(&self, price: f64) -> f64 {
        if !self.price_range.contains(price) {
            return 0.0;
        }
        self.volumes[self.price_range.chunk_index(price)]
    }

    /// Percentile rank (0..=100) of the bin containing `price` among all bins.
    pub fn percentile_at(&self, price: f64) -> f64 {
        if !self.price_range.contains(price) {
            return 0.0;
        }
        percentile_rank(&self.volumes, self.volume_at(price))
    }

    /// Bins in the top `top_fraction` of the volume distribution that also trade above the mean.
    pub fn high_volume_nodes(&self, top_fraction: f64) -> Vec<VolumeNode> {
        if self.volumes.is_empty() {
            return Vec::new();
        }

        let mut sorted = self.volumes.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let threshold = percentile(&sorted, 1.0 - top_fraction.clamp(0.0, 1.0));
        let mean = self.total_volume() / self.volumes.len() as f64;

        self.volumes
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > 0.0 && v >= threshold && v > mean * (1.0 + MEAN_MARGIN))
            .map(|(bin_index, &volume)| VolumeNode {
                bin_index,
                price: self.price_range.chunk_mid(bin_index),
                volume,
                percentile: percentile_rank(&self.volumes, volume),
            })
            .collect()
    }
}

/// Merge clustered levels with volume nodes into one candidate list.
///
/// A cluster within `eps` of a node takes the nearest node's volume and is marked
/// volume-confirmed. Nodes matching no cluster become standalone candidates; adjacent
/// unmatched bins collapse to their heaviest bin so one shelf of volume yields one level.
pub fn merge_candidates(
    clusters: &[LevelCluster],
    nodes: &[VolumeNode],
    profile: Option<&VolumeProfile>,
    eps: f64,
    current_price: f64,
) -> Vec<LevelCandidate> {
    let mut matched = vec![false; nodes.len()];
    let mut candidates = Vec::with_capacity(clusters.len() + nodes.len());

    for cluster in clusters {
        let nearest = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| relative_distance(cluster.centroid, node.price) <= eps)
            .min_by(|(_, a), (_, b)| {
                (a.price - cluster.centroid)
                    .abs()
                    .total_cmp(&(b.price - cluster.centroid).abs())
            });

        let (volume, volume_percentile, confirmed) = match nearest {
            Some((node_index, node)) => {
                matched[node_index] = true;
                (node.volume, node.percentile, true)
            }
            None => match profile {
                Some(profile) => (
                    profile.volume_at(cluster.centroid),
                    profile.percentile_at(cluster.centroid),
                    false,
                ),
                None => (0.0, 0.0, false),
            },
        };

        candidates.push(LevelCandidate {
            price: cluster.centroid,
            kind: cluster.level_kind(),
            origin: LevelOrigin::PriceCluster,
            cluster_touches: cluster.len(),
            volume,
            volume_percentile,
            has_volume_confirmation: confirmed,
        });
    }

    let unmatched: Vec<VolumeNode> = nodes
        .iter()
        .zip(&matched)
        .filter(|(_, m)| !**m)
        .map(|(node, _)| *node)
        .collect();

    for node in heaviest_per_run(&unmatched) {
        candidates.push(LevelCandidate {
            price: node.price,
            kind: LevelKind::relative_to(node.price, current_price),
            origin: LevelOrigin::VolumeNode,
            cluster_touches: 0,
            volume: node.volume,
            volume_percentile: node.percentile,
            has_volume_confirmation: true,
        });
    }

    candidates
}

/// Nodes are in bin order; keep the heaviest of each run of adjacent bins.
fn heaviest_per_run(nodes: &[VolumeNode]) -> Vec<VolumeNode> {
    let mut result: Vec<VolumeNode> = Vec::new();
    let mut previous_bin: Option<usize> = None;

    for node in nodes {
        let continues_run = previous_bin.is_some_and(|bin| node.bin_index == bin + 1);
        match result.last_mut() {
            Some(best) if continues_run => {
                if node.volume > best.volume {
                    *best = *node;
                }
            }
            _ => result.push(*node),
        }
        previous_bin = Some(node.bin_index);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtremumKind, ExtremumPoint};
    use crate::test_support::{double_bottom_series, series_from_closes};

    #[test]
    fn test_volume_is_conserved() {
        let series = double_bottom_series("X");
        let profile = VolumeProfile::build(&series, 50).unwrap();
        let traded: f64 = series.volumes.iter().sum();
        assert!((profile.total_volume() - traded).abs() < 1e-6);
        assert_eq!(profile.volumes.len(), 50);
    }

    #[test]
    fn test_flat_series_has_no_high_volume_nodes() {
        let series = series_from_closes("X", &[100.0; 30]);
        let profile = VolumeProfile::build(&series, 50).unwrap();
        assert!(profile.high_volume_nodes(0.4).is_empty());
    }

    #[test]
    fn test_congestion_zone_is_a_node() {
        // Long congestion around 100, then a one-way run to 140
        let congestion = [100.0, 100.4, 99.8, 100.2, 100.0, 99.9, 100.1, 100.3, 99.7, 100.0];
        let mut closes: Vec<f64> = congestion.iter().cycle().take(30).copied().collect();
        closes.extend([110.0, 120.0, 130.0, 140.0]);
        let series = series_from_closes("X", &closes);
        let profile = VolumeProfile::build(&series, 20).unwrap();
        let nodes = profile.high_volume_nodes(0.4);

        assert!(!nodes.is_empty());
        assert!(nodes.iter().all(|n| n.price < 105.0));
        assert!(nodes.iter().all(|n| (0.0..=100.0).contains(&n.percentile)));
        assert!(profile.percentile_at(100.0) > profile.percentile_at(125.0));
    }

    fn cluster_at(price: f64) -> LevelCluster {
        let members = vec![
            ExtremumPoint {
                index: 3,
                price,
                kind: ExtremumKind::Valley,
            },
            ExtremumPoint {
                index: 9,
                price,
                kind: ExtremumKind::Valley,
            },
        ];
        LevelCluster::from_members(ExtremumKind::Valley, members).unwrap()
    }

    fn node(bin_index: usize, price: f64, volume: f64) -> VolumeNode {
        VolumeNode {
            bin_index,
            price,
            volume,
            percentile: 90.0,
        }
    }

    #[test]
    fn test_merge_confirms_cluster_near_node() {
        let clusters = vec![cluster_at(100.0)];
        let nodes = vec![node(10, 101.0, 5_000.0)];
        let candidates = merge_candidates(&clusters, &nodes, None, 0.02, 110.0);

        assert_eq!(candidates.len(), 1);
        let merged = &candidates[0];
        assert_eq!(merged.origin, LevelOrigin::PriceCluster);
        assert_eq!(merged.kind, LevelKind::Support);
        assert!(merged.has_volume_confirmation);
        assert_eq!(merged.volume, 5_000.0);
        assert_eq!(merged.price, 100.0);
    }

    #[test]
    fn test_unmatched_nodes_become_standalone_candidates() {
        let clusters = vec![cluster_at(100.0)];
        let nodes = vec![
            node(30, 120.0, 3_000.0),
            node(31, 120.5, 4_000.0),
            node(40, 90.0, 2_000.0),
        ];
        let candidates = merge_candidates(&clusters, &nodes, None, 0.02, 110.0);

        let standalone: Vec<&LevelCandidate> = candidates
            .iter()
            .filter(|c| c.origin == LevelOrigin::VolumeNode)
            .collect();
        assert_eq!(standalone.len(), 2);
        assert!(standalone.iter().all(|c| c.has_volume_confirmation && c.cluster_touches == 0));

        let above = standalone.iter().find(|c| c.price > 110.0).unwrap();
        assert_eq!(above.kind, LevelKind::Resistance);
        assert_eq!(above.price, 120.5);
        let below = standalone.iter().find(|c| c.price < 110.0).unwrap();
        assert_eq!(below.kind, LevelKind::Support);
    }
}
