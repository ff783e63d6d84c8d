//! Pairwise cosine similarity over embedding matrices.

use ndarray::{Array2, ArrayView1};

use crate::error::SimilarityError;

/// Stack per-document embedding vectors into a row-major matrix.
///
/// Row order follows input order. All rows must share one dimension; an
/// empty input yields a 0x0 matrix.
pub fn embedding_matrix(rows: &[Vec<f32>]) -> Result<Array2<f32>, SimilarityError> {
    let dim = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut matrix = Array2::zeros((rows.len(), dim));
    for (row, values) in rows.iter().enumerate() {
        if values.len() != dim {
            return Err(SimilarityError::DimensionMismatch {
                row,
                expected: dim,
                found: values.len(),
            });
        }
        matrix
            .row_mut(row)
            .assign(&ArrayView1::from(values.as_slice()));
    }
    Ok(matrix)
}

/// Cosine similarity between every pair of rows, diagonal forced to zero.
///
/// Rows are L2-normalized first; a zero-norm row divides by 1 instead, so a
/// degenerate vector is dissimilar to everything rather than NaN.
pub fn cosine_similarity_matrix(embeddings: &Array2<f32>) -> Array2<f32> {
    let mut normalized = embeddings.clone();
    for mut row in normalized.rows_mut() {
        let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
    let mut matrix = normalized.dot(&normalized.t());
    matrix.diag_mut().fill(0.0);
    matrix
}

/// Weighted sum of similarity matrices from multiple embedding sources.
///
/// Weights are normalized to sum to 1 over the sources that carry a
/// positive weight; non-positive weights are ignored entirely, shape
/// included.
pub fn combine_matrices(
    sources: &[(Array2<f32>, f32)],
) -> Result<Array2<f32>, SimilarityError> {
    let shape = sources
        .iter()
        .find(|(_, weight)| *weight > 0.0)
        .map(|(matrix, _)| matrix.dim())
        .ok_or(SimilarityError::NoSources)?;
    let total: f32 = sources
        .iter()
        .filter(|(_, weight)| *weight > 0.0)
        .map(|(_, weight)| *weight)
        .sum();

    let mut combined = Array2::zeros(shape);
    for (matrix, weight) in sources {
        if *weight <= 0.0 {
            continue;
        }
        if matrix.dim() != shape {
            return Err(SimilarityError::ShapeMismatch {
                first: shape,
                other: matrix.dim(),
            });
        }
        combined.scaled_add(*weight / total, matrix);
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-5,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_embedding_matrix_preserves_row_order() {
        let matrix = embedding_matrix(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(matrix.dim(), (2, 2));
        assert_eq!(matrix[[0, 1]], 2.0);
        assert_eq!(matrix[[1, 0]], 3.0);
    }

    #[test]
    fn test_embedding_matrix_rejects_ragged_rows() {
        let err = embedding_matrix(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            SimilarityError::DimensionMismatch {
                row: 1,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_identical_rows_score_one() {
        let matrix = embedding_matrix(&[vec![1.0, 0.0], vec![2.0, 0.0]]).unwrap();
        let sim = cosine_similarity_matrix(&matrix);
        assert_close(sim[[0, 1]], 1.0);
        assert_close(sim[[1, 0]], 1.0);
    }

    #[test]
    fn test_orthogonal_rows_score_zero() {
        let matrix = embedding_matrix(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let sim = cosine_similarity_matrix(&matrix);
        assert_close(sim[[0, 1]], 0.0);
    }

    #[test]
    fn test_opposite_rows_score_negative_one() {
        let matrix = embedding_matrix(&[vec![1.0, 0.0], vec![-1.0, 0.0]]).unwrap();
        let sim = cosine_similarity_matrix(&matrix);
        assert_close(sim[[0, 1]], -1.0);
    }

    #[test]
    fn test_diagonal_is_zero() {
        let matrix =
            embedding_matrix(&[vec![1.0, 1.0], vec![0.5, 0.2], vec![0.0, 3.0]]).unwrap();
        let sim = cosine_similarity_matrix(&matrix);
        for i in 0..3 {
            assert_eq!(sim[[i, i]], 0.0);
        }
    }

    #[test]
    fn test_zero_vector_is_dissimilar_not_nan() {
        let matrix = embedding_matrix(&[vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
        let sim = cosine_similarity_matrix(&matrix);
        assert_eq!(sim[[0, 1]], 0.0);
        assert_eq!(sim[[1, 0]], 0.0);
        assert!(sim.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_combine_normalizes_weights() {
        let a = embedding_matrix(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let b = embedding_matrix(&[vec![1.0, 0.0], vec![1.0, 0.0]]).unwrap();
        let sim_a = cosine_similarity_matrix(&a);
        let sim_b = cosine_similarity_matrix(&b);

        let fractional =
            combine_matrices(&[(sim_a.clone(), 0.75), (sim_b.clone(), 0.25)]).unwrap();
        let scaled = combine_matrices(&[(sim_a, 3.0), (sim_b, 1.0)]).unwrap();
        for (x, y) in fractional.iter().zip(scaled.iter()) {
            assert_close(*x, *y);
        }
        assert_close(fractional[[0, 1]], 0.25);
    }

    #[test]
    fn test_combine_skips_zero_weight_sources() {
        let main = cosine_similarity_matrix(
            &embedding_matrix(&[vec![1.0, 0.0], vec![1.0, 0.0]]).unwrap(),
        );
        // Wrong shape, but weight zero means it is never consulted.
        let ignored = Array2::zeros((3, 3));

        let combined = combine_matrices(&[(main.clone(), 1.0), (ignored, 0.0)]).unwrap();
        assert_close(combined[[0, 1]], main[[0, 1]]);
    }

    #[test]
    fn test_combine_without_positive_weight_errors() {
        let sim = Array2::zeros((2, 2));
        let err = combine_matrices(&[(sim, 0.0)]).unwrap_err();
        assert!(matches!(err, SimilarityError::NoSources));
    }

    #[test]
    fn test_combine_rejects_shape_mismatch() {
        let a = Array2::zeros((2, 2));
        let b = Array2::zeros((3, 3));
        let err = combine_matrices(&[(a, 0.5), (b, 0.5)]).unwrap_err();
        assert!(matches!(err, SimilarityError::ShapeMismatch { .. }));
    }
}
