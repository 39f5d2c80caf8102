use num_traits::Float;

/// Elementwise means of the points in each cluster, for labels in `0..n_clusters`. Noise
/// (`-1`) and out of range labels are ignored. Empty clusters get a zero vector and a count
/// of zero, leaving the caller to decide how to handle them.
pub(crate) fn calc_centroids<T: Float>(
    data: &[Vec<T>],
    labels: &[i32],
    n_clusters: usize,
) -> (Vec<Vec<T>>, Vec<usize>) {
    assert_eq!(data.len(), labels.len());
    let n_dims = data.first().map_or(0, Vec::len);
    let mut sums = vec![vec![T::zero(); n_dims]; n_clusters];
    let mut counts = vec![0_usize; n_clusters];

    for (datapoint, &label) in data.iter().zip(labels) {
        if label < 0 || label as usize >= n_clusters {
            continue;
        }
        let cluster = label as usize;
        counts[cluster] += 1;
        for (sum, &element) in sums[cluster].iter_mut().zip(datapoint) {
            *sum = *sum + element;
        }
    }

    for (sum, &count) in sums.iter_mut().zip(&counts) {
        if count == 0 {
            continue;
        }
        let count = T::from(count).unwrap_or_else(T::one);
        for element in sum.iter_mut() {
            *element = *element / count;
        }
    }
    (sums, counts)
}

/// Elementwise mean of all points.
pub(crate) fn calc_global_centroid<T: Float>(data: &[Vec<T>]) -> Vec<T> {
    let labels = vec![0; data.len()];
    let (mut centroids, _) = calc_centroids(data, &labels, 1);
    centroids.swap_remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroids() {
        let data = vec![vec![1.0, 1.0], vec![3.0, 3.0], vec![10.0, 0.0], vec![99.0, 99.0]];
        let (centroids, counts) = calc_centroids(&data, &[0, 0, 1, -1], 3);
        assert_eq!(vec![2.0, 2.0], centroids[0]);
        assert_eq!(vec![10.0, 0.0], centroids[1]);
        assert_eq!(vec![0.0, 0.0], centroids[2]);
        assert_eq!(vec![2, 1, 0], counts);
    }

    #[test]
    fn global_centroid() {
        let data = vec![vec![0.0, 2.0], vec![2.0, 4.0]];
        assert_eq!(vec![1.0, 3.0], calc_global_centroid(&data));
    }
}
