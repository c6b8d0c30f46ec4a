//! Clustering of raw cascade hits into final detections.
//!
//! Every window that passes the cascade is a candidate; true faces produce
//! many nearly-identical candidates across neighbouring positions and scales,
//! while spurious hits tend to be isolated. Candidates are partitioned with a
//! union-find over a similarity predicate, averaged per cluster, and clusters
//! that are too small or nested inside stronger ones are dropped.

use std::collections::HashMap;

use crate::shared::region::Region;

/// Relative edge tolerance for two candidates to be considered the same hit.
pub const GROUP_EPS: f64 = 0.2;

/// Whether all four edges of `a` and `b` lie within
/// `eps * (min width + min height) / 2` of each other.
pub fn similar(a: &Region, b: &Region, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    ((a.x - b.x).abs() as f64) <= delta
        && ((a.y - b.y).abs() as f64) <= delta
        && ((a.right() - b.right()).abs() as f64) <= delta
        && ((a.bottom() - b.bottom()).abs() as f64) <= delta
}

/// Find root of element `i` with path halving for amortized near-O(1).
fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge the sets containing `a` and `b`.
fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Labels each candidate with a cluster id. Ids are dense and numbered in
/// order of the first candidate of each cluster.
pub fn partition(rects: &[Region], eps: f64) -> (Vec<usize>, usize) {
    let mut parent: Vec<usize> = (0..rects.len()).collect();
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if similar(&rects[i], &rects[j], eps) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut class_of_root: HashMap<usize, usize> = HashMap::new();
    let mut labels = Vec::with_capacity(rects.len());
    for i in 0..rects.len() {
        let root = find(&mut parent, i);
        let next = class_of_root.len();
        labels.push(*class_of_root.entry(root).or_insert(next));
    }
    (labels, class_of_root.len())
}

/// Groups candidates into detections.
///
/// A cluster survives when it has more than `min_neighbors` members and is
/// not nested inside a stronger cluster. With `min_neighbors == 0` the
/// candidates are returned unchanged.
pub fn group_rectangles(rects: &[Region], min_neighbors: usize, eps: f64) -> Vec<Region> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let (labels, nclasses) = partition(rects, eps);
    let mut sums = vec![[0i64; 4]; nclasses];
    let mut counts = vec![0usize; nclasses];
    for (r, &label) in rects.iter().zip(&labels) {
        let s = &mut sums[label];
        s[0] += r.x as i64;
        s[1] += r.y as i64;
        s[2] += r.width as i64;
        s[3] += r.height as i64;
        counts[label] += 1;
    }

    let averaged: Vec<Region> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let avg = |v: i64| (v as f64 / n as f64).round() as i32;
            Region::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3]))
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }
        let nested = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.width as f64 * eps).round() as i32;
            let dy = (r2.height as f64 * eps).round() as i32;
            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.right() <= r2.right() + dx
                && r1.bottom() <= r2.bottom() + dy
                && (n2 > n1.max(3) || n1 < 3)
        });
        if !nested {
            grouped.push(*r1);
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn jittered(base: Region, count: i32) -> Vec<Region> {
        (0..count)
            .map(|i| Region::new(base.x + i % 3, base.y + i % 2, base.width, base.height))
            .collect()
    }

    #[rstest]
    #[case::identical(Region::new(0, 0, 100, 100), Region::new(0, 0, 100, 100), true)]
    #[case::small_shift(Region::new(0, 0, 100, 100), Region::new(10, 10, 100, 100), true)]
    #[case::large_shift(Region::new(0, 0, 100, 100), Region::new(30, 0, 100, 100), false)]
    #[case::different_scale(Region::new(0, 0, 100, 100), Region::new(0, 0, 200, 200), false)]
    fn test_similar(#[case] a: Region, #[case] b: Region, #[case] expected: bool) {
        assert_eq!(similar(&a, &b, GROUP_EPS), expected);
        assert_eq!(similar(&b, &a, GROUP_EPS), expected);
    }

    #[test]
    fn test_partition_transitive() {
        // a~b and b~c but a and c are too far apart: still one cluster.
        let rects = vec![
            Region::new(0, 0, 100, 100),
            Region::new(15, 0, 100, 100),
            Region::new(30, 0, 100, 100),
        ];
        let (labels, n) = partition(&rects, GROUP_EPS);
        assert_eq!(n, 1);
        assert_eq!(labels, vec![0, 0, 0]);
    }

    #[test]
    fn test_partition_labels_in_first_seen_order() {
        let rects = vec![
            Region::new(500, 500, 50, 50),
            Region::new(0, 0, 50, 50),
            Region::new(501, 500, 50, 50),
        ];
        let (labels, n) = partition(&rects, GROUP_EPS);
        assert_eq!(n, 2);
        assert_eq!(labels, vec![0, 1, 0]);
    }

    #[test]
    fn test_zero_min_neighbors_returns_raw_candidates() {
        let rects = jittered(Region::new(10, 10, 40, 40), 4);
        assert_eq!(group_rectangles(&rects, 0, GROUP_EPS), rects);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_rectangles(&[], 5, GROUP_EPS).is_empty());
    }

    #[test]
    fn test_cluster_needs_more_than_min_neighbors() {
        let five = jittered(Region::new(10, 10, 40, 40), 5);
        assert!(group_rectangles(&five, 5, GROUP_EPS).is_empty());

        let six = jittered(Region::new(10, 10, 40, 40), 6);
        assert_eq!(group_rectangles(&six, 5, GROUP_EPS).len(), 1);
    }

    #[test]
    fn test_cluster_is_averaged() {
        let rects = vec![
            Region::new(10, 10, 40, 40),
            Region::new(12, 10, 40, 40),
            Region::new(14, 12, 44, 40),
        ];
        let grouped = group_rectangles(&rects, 2, GROUP_EPS);
        assert_eq!(grouped, vec![Region::new(12, 11, 41, 40)]);
    }

    #[test]
    fn test_isolated_hits_are_dropped() {
        let mut rects = jittered(Region::new(100, 100, 60, 60), 8);
        rects.push(Region::new(0, 0, 24, 24));
        let grouped = group_rectangles(&rects, 3, GROUP_EPS);
        assert_eq!(grouped.len(), 1);
        assert!(grouped[0].x >= 100);
    }

    #[test]
    fn test_weaker_nested_cluster_is_suppressed() {
        let mut rects = jittered(Region::new(100, 100, 100, 100), 10);
        rects.extend(jittered(Region::new(130, 130, 30, 30), 4));
        let grouped = group_rectangles(&rects, 3, GROUP_EPS);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].width, 100);
    }

    #[test]
    fn test_separate_faces_both_kept() {
        let mut rects = jittered(Region::new(0, 0, 50, 50), 6);
        rects.extend(jittered(Region::new(300, 0, 50, 50), 6));
        let grouped = group_rectangles(&rects, 5, GROUP_EPS);
        assert_eq!(grouped.len(), 2);
    }
}
