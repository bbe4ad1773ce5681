//! Small fixed-size linear algebra used to turn raw sensor readings into calibrated values.
//!
//! Everything here is single precision, matching what the sensors report, and works on plain
//! `Copy` values so matrices can be passed around freely.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Relative tolerance used by [`Mat3x3::reciprocal`]: a determinant no larger than this times
/// the cube of the largest cell counts as zero.
const SINGULAR_TOLERANCE: f32 = f32::EPSILON;

/// A three component vector, typically a raw or calibrated tristimulus reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub v0: f32,
    pub v1: f32,
    pub v2: f32,
}

impl Vec3 {
    pub const fn new(v0: f32, v1: f32, v2: f32) -> Self {
        Self { v0, v1, v2 }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.v0 + other.v0, self.v1 + other.v1, self.v2 + other.v2)
    }

    pub fn scalar_multiply(&self, value: f32) -> Vec3 {
        Vec3::new(self.v0 * value, self.v1 * value, self.v2 * value)
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.v0, self.v1, self.v2]
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6} {:.6} {:.6}", self.v0, self.v1, self.v2)
    }
}

/// A 3x3 matrix, cells named `m<row><column>`.
///
/// Serialises as an array of three rows, e.g. `[[1, 0, 0], [0, 1, 0], [0, 0, 1]]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f32; 3]; 3]", into = "[[f32; 3]; 3]")]
pub struct Mat3x3 {
    pub m00: f32,
    pub m01: f32,
    pub m02: f32,
    pub m10: f32,
    pub m11: f32,
    pub m12: f32,
    pub m20: f32,
    pub m21: f32,
    pub m22: f32,
}

impl Mat3x3 {
    pub const fn zero() -> Self {
        Self::from_rows([[0.0; 3]; 3])
    }

    pub const fn identity() -> Self {
        Self::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    pub const fn from_rows(rows: [[f32; 3]; 3]) -> Self {
        Self {
            m00: rows[0][0],
            m01: rows[0][1],
            m02: rows[0][2],
            m10: rows[1][0],
            m11: rows[1][1],
            m12: rows[1][2],
            m20: rows[2][0],
            m21: rows[2][1],
            m22: rows[2][2],
        }
    }

    pub const fn to_rows(&self) -> [[f32; 3]; 3] {
        [
            [self.m00, self.m01, self.m02],
            [self.m10, self.m11, self.m12],
            [self.m20, self.m21, self.m22],
        ]
    }

    /// The nine cells in row-major order.
    pub const fn as_array(&self) -> [f32; 9] {
        [
            self.m00, self.m01, self.m02, self.m10, self.m11, self.m12, self.m20, self.m21,
            self.m22,
        ]
    }

    /// Sets every cell to exactly `0.0`.
    pub fn clear(&mut self) {
        *self = Self::zero();
    }

    /// # Panics
    /// If `row` or `column` is greater than 2.
    pub fn get(&self, row: usize, column: usize) -> f32 {
        self.to_rows()[row][column]
    }

    /// # Panics
    /// If `row` or `column` is greater than 2.
    pub fn set(&mut self, row: usize, column: usize, value: f32) {
        let mut rows = self.to_rows();
        rows[row][column] = value;
        *self = Self::from_rows(rows);
    }

    /// Returns `self × other`.
    pub fn multiply(&self, other: &Mat3x3) -> Mat3x3 {
        let a = self.to_rows();
        let b = other.to_rows();

        let mut result = [[0.0f32; 3]; 3];
        for (i, row) in result.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Self::from_rows(result)
    }

    pub fn scalar_multiply(&self, value: f32) -> Mat3x3 {
        let mut rows = self.to_rows();
        rows.iter_mut()
            .flat_map(|row| row.iter_mut())
            .for_each(|cell| *cell *= value);
        Self::from_rows(rows)
    }

    /// Returns `self × vector`.
    pub fn vector_multiply(&self, vector: &Vec3) -> Vec3 {
        Vec3::new(
            self.m00 * vector.v0 + self.m01 * vector.v1 + self.m02 * vector.v2,
            self.m10 * vector.v0 + self.m11 * vector.v1 + self.m12 * vector.v2,
            self.m20 * vector.v0 + self.m21 * vector.v1 + self.m22 * vector.v2,
        )
    }

    pub fn determinant(&self) -> f32 {
        self.m00 * (self.m11 * self.m22 - self.m12 * self.m21)
            - self.m01 * (self.m10 * self.m22 - self.m12 * self.m20)
            + self.m02 * (self.m10 * self.m21 - self.m11 * self.m20)
    }

    /// The inverse of this matrix, or `None` if it is (close to) singular.
    pub fn reciprocal(&self) -> Option<Mat3x3> {
        let det = self.determinant();
        let scale = self
            .as_array()
            .iter()
            .fold(0.0f32, |largest, cell| largest.max(cell.abs()));
        if !det.is_finite() || det.abs() <= SINGULAR_TOLERANCE * scale * scale * scale {
            return None;
        }

        let inv = 1.0 / det;
        Some(Self::from_rows([
            [
                (self.m11 * self.m22 - self.m12 * self.m21) * inv,
                (self.m02 * self.m21 - self.m01 * self.m22) * inv,
                (self.m01 * self.m12 - self.m02 * self.m11) * inv,
            ],
            [
                (self.m12 * self.m20 - self.m10 * self.m22) * inv,
                (self.m00 * self.m22 - self.m02 * self.m20) * inv,
                (self.m02 * self.m10 - self.m00 * self.m12) * inv,
            ],
            [
                (self.m10 * self.m21 - self.m11 * self.m20) * inv,
                (self.m01 * self.m20 - self.m00 * self.m21) * inv,
                (self.m00 * self.m11 - self.m01 * self.m10) * inv,
            ],
        ]))
    }

    pub fn approx_eq(&self, other: &Mat3x3, epsilon: f32) -> bool {
        self.as_array()
            .iter()
            .zip(other.as_array().iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

/// Writes `a × b` into `result`.
///
/// `a` and `b` may be the same matrix; `result` is always distinct from both.
pub fn matrix_multiply(a: &Mat3x3, b: &Mat3x3, result: &mut Mat3x3) {
    *result = a.multiply(b);
}

impl Index<(usize, usize)> for Mat3x3 {
    type Output = f32;

    fn index(&self, (row, column): (usize, usize)) -> &f32 {
        match (row, column) {
            (0, 0) => &self.m00,
            (0, 1) => &self.m01,
            (0, 2) => &self.m02,
            (1, 0) => &self.m10,
            (1, 1) => &self.m11,
            (1, 2) => &self.m12,
            (2, 0) => &self.m20,
            (2, 1) => &self.m21,
            (2, 2) => &self.m22,
            _ => panic!("Matrix cell ({}, {}) is out of range", row, column),
        }
    }
}

impl From<[[f32; 3]; 3]> for Mat3x3 {
    fn from(rows: [[f32; 3]; 3]) -> Self {
        Self::from_rows(rows)
    }
}

impl From<Mat3x3> for [[f32; 3]; 3] {
    fn from(matrix: Mat3x3) -> Self {
        matrix.to_rows()
    }
}

impl fmt::Display for Mat3x3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.to_rows();
        for (index, row) in rows.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{:.6} {:.6} {:.6}", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn clear_zeroes_every_cell() {
        let mut mat = Mat3x3::identity();
        mat.m00 = 1.0;
        mat.m12 = -7.5;
        mat.clear();
        for row in 0..3 {
            for column in 0..3 {
                assert_eq!(mat[(row, column)], 0.0);
            }
        }
    }

    #[test]
    fn squaring_a_matrix() {
        let mut src = Mat3x3::zero();
        src.m01 = 2.0;
        src.m10 = 2.0;

        let mut mat = Mat3x3::identity();
        matrix_multiply(&src, &src, &mut mat);

        assert!(mat.m00 < 4.1 && mat.m00 > 3.9);
        assert!(mat.m11 < 4.1 && mat.m11 > 3.9);
        assert!(mat.m22 < 0.001 && mat.m22 > -0.001);
    }

    #[test]
    fn identity_is_neutral() {
        let a = Mat3x3::from_rows([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        assert_eq!(a.multiply(&Mat3x3::identity()), a);
        assert_eq!(Mat3x3::identity().multiply(&a), a);
    }

    #[test]
    fn product_is_row_by_column() {
        let a = Mat3x3::from_rows([[1.0, 2.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let b = Mat3x3::from_rows([[1.0, 0.0, 0.0], [3.0, 1.0, 0.0], [0.0, 0.0, 2.0]]);
        let product = a.multiply(&b);
        assert_eq!(
            product.to_rows(),
            [[7.0, 2.0, 0.0], [3.0, 1.0, 0.0], [0.0, 0.0, 2.0]]
        );
        // And the other way round, which is different.
        assert_eq!(
            b.multiply(&a).to_rows(),
            [[1.0, 2.0, 0.0], [3.0, 7.0, 0.0], [0.0, 0.0, 2.0]]
        );
    }

    #[test]
    fn reciprocal_round_trip() {
        let a = Mat3x3::from_rows([[2.0, 0.0, 1.0], [1.0, 3.0, 0.0], [0.0, 1.0, 4.0]]);
        let inverse = a.reciprocal().expect("matrix should be invertible");
        assert!(a.multiply(&inverse).approx_eq(&Mat3x3::identity(), EPSILON));
    }

    #[test]
    fn singular_matrix_has_no_reciprocal() {
        let a = Mat3x3::from_rows([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 1.0, 1.0]]);
        assert!(a.determinant().abs() < EPSILON);
        assert!(a.reciprocal().is_none());
    }

    #[test]
    fn small_scale_matrix_still_inverts() {
        let a = Mat3x3::identity().scalar_multiply(0.05);
        let inverse = a.reciprocal().expect("a scaled identity is invertible");
        assert!(inverse.approx_eq(&Mat3x3::identity().scalar_multiply(20.0), 1e-3));

        let tiny = Mat3x3::from_rows([[0.02, 0.001, 0.0], [0.0, 0.03, 0.002], [0.001, 0.0, 0.04]]);
        let inverse = tiny.reciprocal().expect("well conditioned");
        assert!(tiny.multiply(&inverse).approx_eq(&Mat3x3::identity(), 1e-4));
    }

    #[test]
    fn zero_matrix_has_no_reciprocal() {
        assert!(Mat3x3::zero().reciprocal().is_none());
    }

    #[test]
    fn determinant_of_diagonal() {
        let a = Mat3x3::from_rows([[2.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 4.0]]);
        assert!((a.determinant() - 24.0).abs() < EPSILON);
    }

    #[test]
    fn vector_and_scalar_multiply() {
        let a = Mat3x3::from_rows([[1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.0, 0.0, 2.0]]);
        let v = a.vector_multiply(&Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(v, Vec3::new(6.0, 1.0, 2.0));

        let doubled = a.scalar_multiply(2.0);
        assert_eq!(doubled.m02, 6.0);
        assert_eq!(doubled.m22, 4.0);
    }

    #[test]
    fn get_and_set_address_the_same_cell() {
        let mut a = Mat3x3::zero();
        a.set(1, 2, 5.0);
        assert_eq!(a.m12, 5.0);
        assert_eq!(a.get(1, 2), 5.0);
        assert_eq!(a.as_array()[5], 5.0);
    }

    #[test]
    fn display_lists_rows() {
        let text = Mat3x3::identity().to_string();
        assert_eq!(
            text,
            "1.000000 0.000000 0.000000\n0.000000 1.000000 0.000000\n0.000000 0.000000 1.000000"
        );
    }

    #[test]
    fn vec3_helpers() {
        let mut v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.add(&v).as_array(), [2.0, 4.0, 6.0]);
        assert_eq!(v.scalar_multiply(0.5).as_array(), [0.5, 1.0, 1.5]);
        v.clear();
        assert_eq!(v, Vec3::default());
    }
}
