//! Dense distance matrix in kilometres.

/// A dense n×n distance matrix stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    data: Vec<f64>,
    size: usize,
}

impl DistanceMatrix {
    /// Creates a zero matrix of the given size.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0.0; size * size],
            size,
        }
    }

    /// Builds a matrix from rows. Returns `None` unless the rows form a square.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return None;
        }
        Some(Self {
            data: rows.into_iter().flatten().collect(),
            size,
        })
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.data[from * self.size + to]
    }

    pub fn set(&mut self, from: usize, to: usize, distance: f64) {
        self.data[from * self.size + to] = distance;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.size.max(1)).map(<[f64]>::to_vec).collect()
    }

    /// True when every entry is finite and non-negative.
    pub fn is_well_formed(&self) -> bool {
        self.data.iter().all(|v| v.is_finite() && *v >= 0.0)
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.size).all(|i| {
            self.get(i, i) == 0.0 && (i + 1..self.size).all(|j| self.get(i, j) == self.get(j, i))
        })
    }

    /// Averages both directions of every pair and zeroes the diagonal.
    pub fn symmetrized(mut self) -> Self {
        for i in 0..self.size {
            self.set(i, i, 0.0);
            for j in i + 1..self.size {
                let mean = (self.get(i, j) + self.get(j, i)) / 2.0;
                self.set(i, j, mean);
                self.set(j, i, mean);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_requires_square() {
        assert!(DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0]]).is_none());
        let matrix = DistanceMatrix::from_rows(vec![vec![0.0, 2.0], vec![3.0, 0.0]]).unwrap();
        assert_eq!(matrix.size(), 2);
        assert_eq!(matrix.get(1, 0), 3.0);
    }

    #[test]
    fn test_symmetrized_averages_directions() {
        let matrix = DistanceMatrix::from_rows(vec![
            vec![0.1, 2.0, 4.0],
            vec![4.0, 0.0, 1.0],
            vec![4.0, 3.0, 0.0],
        ])
        .unwrap();
        assert!(!matrix.is_symmetric());

        let matrix = matrix.symmetrized();
        assert!(matrix.is_symmetric());
        assert_eq!(matrix.get(0, 0), 0.0);
        assert_eq!(matrix.get(0, 1), 3.0);
        assert_eq!(matrix.get(2, 1), 2.0);
    }

    #[test]
    fn test_well_formed_rejects_negative_and_nan() {
        let mut matrix = DistanceMatrix::new(2);
        assert!(matrix.is_well_formed());
        matrix.set(0, 1, -1.0);
        assert!(!matrix.is_well_formed());
        matrix.set(0, 1, f64::NAN);
        assert!(!matrix.is_well_formed());
    }

    #[test]
    fn test_rows() {
        let matrix = DistanceMatrix::from_rows(vec![vec![0.0, 5.5], vec![5.5, 0.0]]).unwrap();
        assert_eq!(matrix.rows(), vec![vec![0.0, 5.5], vec![5.5, 0.0]]);
    }
}
