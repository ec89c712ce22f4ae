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

//! GPU-visible light and material records.
//!
//! Every record here is copied verbatim into shader constant memory, where data is
//! packed into 16-byte registers. Two rules follow: the record size is a multiple
//! of 16 bytes, and no field may cross a 16-byte boundary. Both rules are checked
//! at compile time for each record below, and the field table each record exposes
//! through [`GpuRecord`] lets the same check be run against custom records.

use crate::math::{LinearRgba, Vec3};
use bytemuck::Zeroable;

/// The register width of shader constant memory, in bytes.
pub const CONSTANT_REGISTER_SIZE: usize = 16;

/// The byte span of a single field inside a [`GpuRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    /// Field name, as declared.
    pub name: &'static str,
    /// Byte offset from the start of the record.
    pub offset: usize,
    /// Size of the field in bytes.
    pub size: usize,
}

impl FieldSpan {
    /// Returns `true` if the field crosses a 16-byte register boundary.
    pub const fn straddles_register(&self) -> bool {
        if self.size == 0 {
            return false;
        }
        let first = self.offset / CONSTANT_REGISTER_SIZE;
        let last = (self.offset + self.size - 1) / CONSTANT_REGISTER_SIZE;
        first != last
    }
}

/// A plain-data record that is uploaded into shader constant memory.
pub trait GpuRecord: bytemuck::Pod {
    /// Every field of the record, in declaration order.
    const FIELDS: &'static [FieldSpan];
}

/// Checks the constant-register packing rules for a record of `size` bytes.
///
/// The fields must tile the record exactly, in order, and none may cross a
/// register boundary.
pub const fn is_register_packed(size: usize, fields: &[FieldSpan]) -> bool {
    if size % CONSTANT_REGISTER_SIZE != 0 {
        return false;
    }
    let mut cursor = 0;
    let mut i = 0;
    while i < fields.len() {
        let field = fields[i];
        if field.offset != cursor || field.straddles_register() {
            return false;
        }
        cursor += field.size;
        i += 1;
    }
    cursor == size
}

macro_rules! field_spans {
    ($record:ty { $($field:ident : $ty:ty),+ $(,)? }) => {
        &[$(FieldSpan {
            name: stringify!($field),
            offset: std::mem::offset_of!($record, $field),
            size: std::mem::size_of::<$ty>(),
        }),+]
    };
}

macro_rules! assert_register_packed {
    ($($record:ty),+) => {
        $(const _: () = assert!(is_register_packed(
            std::mem::size_of::<$record>(),
            <$record as GpuRecord>::FIELDS,
        ));)+
    };
}

/// A directional light, such as the sun. Casts parallel rays with no falloff.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLight {
    /// Ambient contribution.
    pub ambient: [f32; 4],
    /// Diffuse contribution.
    pub diffuse: [f32; 4],
    /// Specular contribution.
    pub specular: [f32; 4],
    /// Direction the light travels in, normalized.
    pub direction: [f32; 3],
    /// Pads the record to a full register.
    pub _pad: f32,
}

impl DirectionalLight {
    /// Creates a directional light. `direction` is normalized.
    pub fn new(
        ambient: LinearRgba,
        diffuse: LinearRgba,
        specular: LinearRgba,
        direction: Vec3,
    ) -> Self {
        Self {
            ambient: ambient.into(),
            diffuse: diffuse.into(),
            specular: specular.into(),
            direction: direction.normalize().to_array(),
            _pad: 0.0,
        }
    }

    /// Returns the direction as a vector.
    pub fn direction(&self) -> Vec3 {
        let [x, y, z] = self.direction;
        Vec3::new(x, y, z)
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl GpuRecord for DirectionalLight {
    const FIELDS: &'static [FieldSpan] = field_spans!(DirectionalLight {
        ambient: [f32; 4],
        diffuse: [f32; 4],
        specular: [f32; 4],
        direction: [f32; 3],
        _pad: f32,
    });
}

/// A point light that attenuates with distance and has no effect beyond `range`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLight {
    /// Ambient contribution.
    pub ambient: [f32; 4],
    /// Diffuse contribution.
    pub diffuse: [f32; 4],
    /// Specular contribution.
    pub specular: [f32; 4],
    /// World-space position.
    pub position: [f32; 3],
    /// Maximum distance the light reaches.
    pub range: f32,
    /// Constant, linear and quadratic attenuation coefficients.
    pub attenuation: [f32; 3],
    /// Pads the record to a full register.
    pub _pad: f32,
}

impl PointLight {
    /// Creates a point light.
    pub fn new(
        ambient: LinearRgba,
        diffuse: LinearRgba,
        specular: LinearRgba,
        position: Vec3,
        range: f32,
        attenuation: Vec3,
    ) -> Self {
        Self {
            ambient: ambient.into(),
            diffuse: diffuse.into(),
            specular: specular.into(),
            position: position.to_array(),
            range,
            attenuation: attenuation.to_array(),
            _pad: 0.0,
        }
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl GpuRecord for PointLight {
    const FIELDS: &'static [FieldSpan] = field_spans!(PointLight {
        ambient: [f32; 4],
        diffuse: [f32; 4],
        specular: [f32; 4],
        position: [f32; 3],
        range: f32,
        attenuation: [f32; 3],
        _pad: f32,
    });
}

/// A spot light: a point light restricted to a cone, sharpened by `spot`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpotLight {
    /// Ambient contribution.
    pub ambient: [f32; 4],
    /// Diffuse contribution.
    pub diffuse: [f32; 4],
    /// Specular contribution.
    pub specular: [f32; 4],
    /// World-space position.
    pub position: [f32; 3],
    /// Maximum distance the light reaches.
    pub range: f32,
    /// Direction of the cone axis, normalized.
    pub direction: [f32; 3],
    /// Cone falloff exponent.
    pub spot: f32,
    /// Constant, linear and quadratic attenuation coefficients.
    pub attenuation: [f32; 3],
    /// Pads the record to a full register.
    pub _pad: f32,
}

impl SpotLight {
    /// Creates a spot light. `direction` is normalized.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ambient: LinearRgba,
        diffuse: LinearRgba,
        specular: LinearRgba,
        position: Vec3,
        range: f32,
        direction: Vec3,
        spot: f32,
        attenuation: Vec3,
    ) -> Self {
        Self {
            ambient: ambient.into(),
            diffuse: diffuse.into(),
            specular: specular.into(),
            position: position.to_array(),
            range,
            direction: direction.normalize().to_array(),
            spot,
            attenuation: attenuation.to_array(),
            _pad: 0.0,
        }
    }

    /// Returns the position as a vector.
    pub fn position(&self) -> Vec3 {
        let [x, y, z] = self.position;
        Vec3::new(x, y, z)
    }

    /// Returns the cone axis as a vector.
    pub fn direction(&self) -> Vec3 {
        let [x, y, z] = self.direction;
        Vec3::new(x, y, z)
    }
}

impl Default for SpotLight {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl GpuRecord for SpotLight {
    const FIELDS: &'static [FieldSpan] = field_spans!(SpotLight {
        ambient: [f32; 4],
        diffuse: [f32; 4],
        specular: [f32; 4],
        position: [f32; 3],
        range: f32,
        direction: [f32; 3],
        spot: f32,
        attenuation: [f32; 3],
        _pad: f32,
    });
}

/// Surface reflectance. The `w` component of `specular` holds the shininess.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Material {
    /// Ambient reflectance.
    pub ambient: [f32; 4],
    /// Diffuse reflectance.
    pub diffuse: [f32; 4],
    /// Specular reflectance, `w` = shininess.
    pub specular: [f32; 4],
    /// Environment reflectivity.
    pub reflect: [f32; 4],
}

impl Material {
    /// Creates a material, storing `shininess` in the specular `w` slot.
    pub fn new(
        ambient: LinearRgba,
        diffuse: LinearRgba,
        specular: LinearRgba,
        shininess: f32,
        reflect: LinearRgba,
    ) -> Self {
        let [r, g, b, _] = specular.to_array();
        Self {
            ambient: ambient.into(),
            diffuse: diffuse.into(),
            specular: [r, g, b, shininess],
            reflect: reflect.into(),
        }
    }

    /// The specular exponent.
    pub fn shininess(&self) -> f32 {
        self.specular[3]
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl GpuRecord for Material {
    const FIELDS: &'static [FieldSpan] = field_spans!(Material {
        ambient: [f32; 4],
        diffuse: [f32; 4],
        specular: [f32; 4],
        reflect: [f32; 4],
    });
}

assert_register_packed!(DirectionalLight, PointLight, SpotLight, Material);

#[cfg(test)]
mod tests {
    use super::*;

    fn check_record<T: GpuRecord>() {
        let size = std::mem::size_of::<T>();
        assert_eq!(size % CONSTANT_REGISTER_SIZE, 0);
        for field in T::FIELDS {
            assert!(
                !field.straddles_register(),
                "field '{}' at {}..{} straddles a register",
                field.name,
                field.offset,
                field.offset + field.size
            );
        }
        assert!(is_register_packed(size, T::FIELDS));
    }

    #[test]
    fn test_records_are_register_packed() {
        check_record::<DirectionalLight>();
        check_record::<PointLight>();
        check_record::<SpotLight>();
        check_record::<Material>();
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<DirectionalLight>(), 64);
        assert_eq!(std::mem::size_of::<PointLight>(), 80);
        assert_eq!(std::mem::size_of::<SpotLight>(), 96);
        assert_eq!(std::mem::size_of::<Material>(), 64);
    }

    #[test]
    fn test_default_is_zero_initialized() {
        assert!(bytemuck::bytes_of(&SpotLight::default())
            .iter()
            .all(|b| *b == 0));
        assert!(bytemuck::bytes_of(&Material::default())
            .iter()
            .all(|b| *b == 0));
    }

    #[test]
    fn test_straddling_layout_is_rejected() {
        // A float3 placed at offset 8 would cross into the second register.
        let fields = [
            FieldSpan {
                name: "a",
                offset: 0,
                size: 8,
            },
            FieldSpan {
                name: "b",
                offset: 8,
                size: 12,
            },
            FieldSpan {
                name: "c",
                offset: 20,
                size: 12,
            },
        ];
        assert!(fields[1].straddles_register());
        assert!(!is_register_packed(32, &fields));
        // Size not a multiple of 16.
        assert!(!is_register_packed(
            12,
            &[FieldSpan {
                name: "d",
                offset: 0,
                size: 12
            }]
        ));
    }

    #[test]
    fn test_material_shininess_lives_in_specular_w() {
        let m = Material::new(
            LinearRgba::WHITE,
            LinearRgba::WHITE,
            LinearRgba::rgb(0.5, 0.5, 0.5),
            16.0,
            LinearRgba::BLACK,
        );
        assert_eq!(m.specular, [0.5, 0.5, 0.5, 16.0]);
        assert_eq!(m.shininess(), 16.0);
    }

    #[test]
    fn test_directional_light_normalizes_direction() {
        let light = DirectionalLight::new(
            LinearRgba::BLACK,
            LinearRgba::WHITE,
            LinearRgba::WHITE,
            Vec3::new(0.0, -4.0, 0.0),
        );
        assert_eq!(light.direction(), Vec3::new(0.0, -1.0, 0.0));
    }
}
