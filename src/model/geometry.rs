//! Rectangles and affine matrices in PDF user space.

use lopdf::Object;
use serde::{Deserialize, Serialize};

/// A rectangle in PDF user space (origin at the lower-left corner).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl Rectangle {
    /// US Letter, the fallback page size.
    pub const LETTER: Rectangle = Rectangle {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    /// Create a rectangle from its origin and size.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            llx: x,
            lly: y,
            urx: x + width,
            ury: y + height,
        }
    }

    /// Create a rectangle from two corners.
    pub fn from_corners(llx: f32, lly: f32, urx: f32, ury: f32) -> Self {
        Self { llx, lly, urx, ury }
    }

    /// Read a `[llx lly urx ury]` array, normalizing swapped corners.
    pub fn from_array(array: &[Object]) -> Option<Self> {
        if array.len() < 4 {
            return None;
        }
        let mut values = [0.0f32; 4];
        for (slot, obj) in values.iter_mut().zip(array) {
            *slot = obj.as_float().ok()?;
        }
        Some(Self::from_corners(values[0], values[1], values[2], values[3]).normalized())
    }

    /// Write as a PDF array.
    pub fn to_array(&self) -> Vec<Object> {
        vec![
            Object::Real(self.llx),
            Object::Real(self.lly),
            Object::Real(self.urx),
            Object::Real(self.ury),
        ]
    }

    /// Swap corners so that `llx <= urx` and `lly <= ury`.
    pub fn normalized(&self) -> Self {
        Self {
            llx: self.llx.min(self.urx),
            lly: self.lly.min(self.ury),
            urx: self.llx.max(self.urx),
            ury: self.lly.max(self.ury),
        }
    }

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// Inclusive containment test.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.llx && x <= self.urx && y >= self.lly && y <= self.ury
    }
}

impl Default for Rectangle {
    fn default() -> Self {
        Rectangle::LETTER
    }
}

/// An affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Counter-clockwise rotation by `degrees`.
    pub fn rotate(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Raw `a` component; negative when the x axis is mirrored.
    pub fn scale_x(&self) -> f32 {
        self.a
    }

    /// Raw `d` component; negative when the y axis is mirrored.
    pub fn scale_y(&self) -> f32 {
        self.d
    }

    pub fn translate_x(&self) -> f32 {
        self.e
    }

    pub fn translate_y(&self) -> f32 {
        self.f
    }

    /// Length of the transformed unit x vector.
    pub fn scaling_factor_x(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Length of the transformed unit y vector.
    pub fn scaling_factor_y(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Read six numeric operands (`cm`, `Tm`, `/Matrix`).
    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let mut v = [0.0f32; 6];
        for (slot, obj) in v.iter_mut().zip(operands) {
            *slot = obj.as_float().ok()?;
        }
        Some(Self::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }

    pub fn to_operands(&self) -> Vec<Object> {
        vec![
            Object::Real(self.a),
            Object::Real(self.b),
            Object::Real(self.c),
            Object::Real(self.d),
            Object::Real(self.e),
            Object::Real(self.f),
        ]
    }
}
