use crate::math::{Mat3x3, Vec3};
use serde::{Deserialize, Serialize};

/// A linear correction mapping raw sensor channels into a reference colour space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub matrix: Mat3x3,
}

impl Calibration {
    pub const fn identity() -> Self {
        Self {
            matrix: Mat3x3::identity(),
        }
    }

    pub const fn from_matrix(matrix: Mat3x3) -> Self {
        Self { matrix }
    }

    /// Returns a calibration equivalent to applying `self` and then `next`.
    pub fn then(&self, next: &Calibration) -> Calibration {
        Calibration::from_matrix(next.matrix.multiply(&self.matrix))
    }

    pub fn apply(&self, raw: &Vec3) -> Vec3 {
        self.matrix.vector_multiply(raw)
    }

    /// The calibration undoing this one, if the matrix is invertible.
    pub fn inverse(&self) -> Option<Calibration> {
        self.matrix.reciprocal().map(Calibration::from_matrix)
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::identity()
    }
}
