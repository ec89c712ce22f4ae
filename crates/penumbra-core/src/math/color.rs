// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the `LinearRgba` color type.

use crate::math::vector::Vec4;
use serde::{Deserialize, Serialize};

/// A color in linear RGBA space with `f32` components.
///
/// Light records store their ambient, diffuse and specular terms as four floats,
/// so this type converts straight into the `[f32; 4]` slots they expose.
#[derive(
    Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct LinearRgba {
    /// The red component in linear space.
    pub r: f32,
    /// The green component in linear space.
    pub g: f32,
    /// The blue component in linear space.
    pub b: f32,
    /// The alpha component.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white (`[1.0, 1.0, 1.0, 1.0]`).
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque black (`[0.0, 0.0, 0.0, 1.0]`).
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Fully transparent black (`[0.0, 0.0, 0.0, 0.0]`).
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a new `LinearRgba` with explicit RGBA values.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a new opaque `LinearRgba` (alpha = 1.0).
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Returns a copy with the RGB channels multiplied by `factor`, alpha untouched.
    #[inline]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor, self.a)
    }

    /// Returns the color as a `[r, g, b, a]` array.
    #[inline]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for LinearRgba {
    /// Returns transparent black, matching a zero-initialized light record.
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

impl From<LinearRgba> for [f32; 4] {
    #[inline]
    fn from(color: LinearRgba) -> Self {
        color.to_array()
    }
}

impl From<LinearRgba> for Vec4 {
    #[inline]
    fn from(color: LinearRgba) -> Self {
        Vec4::new(color.r, color.g, color.b, color.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_keeps_alpha() {
        let c = LinearRgba::new(0.5, 0.25, 1.0, 0.75).scaled(2.0);
        assert_eq!(c, LinearRgba::new(1.0, 0.5, 2.0, 0.75));
    }

    #[test]
    fn test_default_is_zeroed() {
        assert_eq!(LinearRgba::default().to_array(), [0.0; 4]);
    }
}
