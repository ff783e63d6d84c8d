//! Link selection over a pairwise similarity matrix.

use std::collections::BTreeMap;

use ndarray::Array2;

/// Selected link targets per document, keyed by the identifiers the caller
/// passed in.
pub type LinkMap = BTreeMap<String, Vec<String>>;

/// Thresholds and bounds for [`select_links`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkOptions {
    /// Minimum similarity for the primary pass.
    pub threshold: f32,

    /// Below this many links the document gets none at all. The fallback
    /// pass admits below-threshold candidates to reach it.
    pub min_links: usize,

    /// Hard cap per document.
    pub max_links: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            min_links: 0,
            max_links: 9,
        }
    }
}

/// Pick link targets for every document from a similarity matrix.
///
/// Candidates are ranked by descending similarity with ties broken by input
/// order. The primary pass takes candidates at or above the threshold, up to
/// `max_links`. When that yields fewer than `min_links`, the fallback pass
/// keeps taking from the same ranking regardless of threshold; a document
/// that still cannot reach `min_links` gets an empty list rather than a
/// partial one. With `cluster_labels`, candidates outside the document's
/// cluster are discarded before ranking.
///
/// `matrix` must be square with one row per entry of `documents`, and
/// `cluster_labels` (when given) one label per entry.
pub fn select_links(
    matrix: &Array2<f32>,
    documents: &[String],
    options: &LinkOptions,
    cluster_labels: Option<&[usize]>,
) -> LinkMap {
    debug_assert_eq!(matrix.nrows(), documents.len());
    debug_assert_eq!(matrix.nrows(), matrix.ncols());
    if let Some(labels) = cluster_labels {
        debug_assert_eq!(labels.len(), documents.len());
    }

    let n = documents.len();
    let mut links = LinkMap::new();

    for i in 0..n {
        let mut ranked: Vec<usize> = (0..n)
            .filter(|&j| j != i)
            .filter(|&j| cluster_labels.map_or(true, |labels| labels[j] == labels[i]))
            .collect();
        ranked.sort_by(|&a, &b| matrix[[i, b]].total_cmp(&matrix[[i, a]]).then(a.cmp(&b)));

        let mut picked: Vec<usize> = ranked
            .iter()
            .copied()
            .take_while(|&j| matrix[[i, j]] >= options.threshold)
            .take(options.max_links)
            .collect();

        // The primary picks form a prefix of the ranking, so the fallback
        // resumes right after them.
        if picked.len() < options.min_links {
            for &j in ranked.iter().skip(picked.len()) {
                if picked.len() >= options.min_links || picked.len() >= options.max_links {
                    break;
                }
                picked.push(j);
            }
        }

        if picked.len() < options.min_links {
            picked.clear();
        }

        links.insert(
            documents[i].clone(),
            picked.into_iter().map(|j| documents[j].clone()).collect(),
        );
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(values: &[&[f32]]) -> Array2<f32> {
        let n = values.len();
        let mut matrix = Array2::zeros((n, n));
        for (i, row) in values.iter().enumerate() {
            assert_eq!(row.len(), n);
            for (j, v) in row.iter().enumerate() {
                matrix[[i, j]] = *v;
            }
        }
        matrix
    }

    fn docs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ranked_descending_above_threshold() {
        // X sees the others at 0.9, 0.95, 0.1.
        let matrix = square(&[
            &[0.0, 0.9, 0.95, 0.1],
            &[0.9, 0.0, 0.0, 0.0],
            &[0.95, 0.0, 0.0, 0.0],
            &[0.1, 0.0, 0.0, 0.0],
        ]);
        let documents = docs(&["x", "a", "b", "c"]);
        let options = LinkOptions {
            threshold: 0.6,
            min_links: 0,
            max_links: 2,
        };

        let links = select_links(&matrix, &documents, &options, None);
        assert_eq!(links["x"], docs(&["b", "a"]));
    }

    #[test]
    fn test_fallback_admits_below_threshold_to_reach_min() {
        let matrix = square(&[
            &[0.0, 0.85, 0.5],
            &[0.85, 0.0, 0.2],
            &[0.5, 0.2, 0.0],
        ]);
        let documents = docs(&["x", "a", "b"]);
        let options = LinkOptions {
            threshold: 0.8,
            min_links: 2,
            max_links: 9,
        };

        let links = select_links(&matrix, &documents, &options, None);
        assert_eq!(links["x"], docs(&["a", "b"]));
    }

    #[test]
    fn test_unreachable_min_yields_empty() {
        let matrix = square(&[&[0.0, 0.85], &[0.85, 0.0]]);
        let documents = docs(&["x", "a"]);
        let options = LinkOptions {
            threshold: 0.8,
            min_links: 2,
            max_links: 9,
        };

        let links = select_links(&matrix, &documents, &options, None);
        assert!(links["x"].is_empty());
        assert!(links["a"].is_empty());
    }

    #[test]
    fn test_every_document_gets_an_entry() {
        let matrix = square(&[&[0.0, 0.1], &[0.1, 0.0]]);
        let documents = docs(&["x", "a"]);

        let links = select_links(&matrix, &documents, &LinkOptions::default(), None);
        assert_eq!(links.len(), 2);
        assert!(links.contains_key("x"));
        assert!(links.contains_key("a"));
    }

    #[test]
    fn test_max_links_bounds_every_result() {
        let matrix = square(&[
            &[0.0, 0.9, 0.8, 0.7, 0.65],
            &[0.9, 0.0, 0.9, 0.9, 0.9],
            &[0.8, 0.9, 0.0, 0.9, 0.9],
            &[0.7, 0.9, 0.9, 0.0, 0.9],
            &[0.65, 0.9, 0.9, 0.9, 0.0],
        ]);
        let documents = docs(&["x", "a", "b", "c", "d"]);
        let options = LinkOptions {
            threshold: 0.6,
            min_links: 0,
            max_links: 3,
        };

        let links = select_links(&matrix, &documents, &options, None);
        for targets in links.values() {
            assert!(targets.len() <= 3);
        }
        assert_eq!(links["x"], docs(&["a", "b", "c"]));
    }

    #[test]
    fn test_fallback_respects_max_links() {
        // min_links above max_links can never be satisfied.
        let matrix = square(&[
            &[0.0, 0.5, 0.4, 0.3],
            &[0.5, 0.0, 0.1, 0.1],
            &[0.4, 0.1, 0.0, 0.1],
            &[0.3, 0.1, 0.1, 0.0],
        ]);
        let documents = docs(&["x", "a", "b", "c"]);
        let options = LinkOptions {
            threshold: 0.9,
            min_links: 3,
            max_links: 2,
        };

        let links = select_links(&matrix, &documents, &options, None);
        assert!(links["x"].is_empty());
    }

    #[test]
    fn test_cluster_labels_discard_cross_cluster_candidates() {
        // b is the most similar to x but sits in the other cluster.
        let matrix = square(&[
            &[0.0, 0.7, 0.99],
            &[0.7, 0.0, 0.1],
            &[0.99, 0.1, 0.0],
        ]);
        let documents = docs(&["x", "a", "b"]);
        let options = LinkOptions {
            threshold: 0.6,
            min_links: 0,
            max_links: 9,
        };

        let links = select_links(&matrix, &documents, &options, Some(&[0, 0, 1]));
        assert_eq!(links["x"], docs(&["a"]));
        assert!(links["b"].is_empty());
    }

    #[test]
    fn test_ties_break_by_input_order() {
        let matrix = square(&[
            &[0.0, 0.8, 0.8, 0.8],
            &[0.8, 0.0, 0.0, 0.0],
            &[0.8, 0.0, 0.0, 0.0],
            &[0.8, 0.0, 0.0, 0.0],
        ]);
        let documents = docs(&["x", "a", "b", "c"]);
        let options = LinkOptions {
            threshold: 0.6,
            min_links: 0,
            max_links: 2,
        };

        let links = select_links(&matrix, &documents, &options, None);
        assert_eq!(links["x"], docs(&["a", "b"]));
    }
}
