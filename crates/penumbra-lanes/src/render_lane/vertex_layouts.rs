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

//! The vertex layout registry.
//!
//! Every mesh shares one 44-byte vertex. Instanced variants add a second stream
//! carrying one 4x4 world matrix per instance, split into four `WORLD` rows.

use penumbra_core::math::Mat4;
use penumbra_core::renderer::api::{
    InputElementDescriptor, InputStepMode, VertexFormat, VertexLayoutDescriptor, INSTANCE_SLOT,
    VERTEX_SLOT,
};
use penumbra_core::renderer::RenderError;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// The named vertex formats known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayoutKind {
    /// Lit shapes: mesh vertex plus instanced world transform.
    Shape,
    /// Lit floor: mesh vertex only.
    Floor,
    /// Shadow-pass shapes: mesh vertex plus instanced world transform.
    ShadowShape,
    /// Shadow-pass floor: mesh vertex only.
    ShadowFloor,
}

impl VertexLayoutKind {
    /// Every known layout.
    pub const ALL: [VertexLayoutKind; 4] = [
        VertexLayoutKind::Shape,
        VertexLayoutKind::Floor,
        VertexLayoutKind::ShadowShape,
        VertexLayoutKind::ShadowFloor,
    ];

    /// The canonical name accepted by [`describe_layout_by_name`].
    pub const fn name(self) -> &'static str {
        match self {
            VertexLayoutKind::Shape => "shape",
            VertexLayoutKind::Floor => "floor",
            VertexLayoutKind::ShadowShape => "shadow-shape",
            VertexLayoutKind::ShadowFloor => "shadow-floor",
        }
    }

    /// Returns `true` if the layout reads a per-instance transform stream.
    pub const fn is_instanced(self) -> bool {
        matches!(self, VertexLayoutKind::Shape | VertexLayoutKind::ShadowShape)
    }
}

impl fmt::Display for VertexLayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VertexLayoutKind {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| RenderError::UnknownFormat(s.to_string()))
    }
}

/// The per-vertex record every mesh buffer is made of.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Object-space tangent.
    pub tangent: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

/// One element of an instance transform stream.
///
/// `rows[i]` feeds the attribute `WORLD i`. The rows are the columns of the
/// column-major world matrix in memory order, so the bytes are exactly those of a
/// [`Mat4`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceTransform {
    /// The four `WORLD` rows.
    pub rows: [[f32; 4]; 4],
}

impl From<Mat4> for InstanceTransform {
    fn from(world: Mat4) -> Self {
        Self {
            rows: world.cols.map(|c| c.to_array()),
        }
    }
}

/// Byte size of [`MeshVertex`], the vertex slot stride.
pub const MESH_VERTEX_STRIDE: u32 = std::mem::size_of::<MeshVertex>() as u32;
/// Byte size of [`InstanceTransform`], the instance slot stride.
pub const INSTANCE_STRIDE: u32 = std::mem::size_of::<InstanceTransform>() as u32;

const _: () = assert!(MESH_VERTEX_STRIDE == 44);
const _: () = assert!(INSTANCE_STRIDE == 64);

fn vertex_element(name: &'static str, format: VertexFormat, offset: u32) -> InputElementDescriptor {
    InputElementDescriptor {
        semantic_name: Cow::Borrowed(name),
        semantic_index: 0,
        format,
        input_slot: VERTEX_SLOT,
        byte_offset: offset,
        step_mode: InputStepMode::Vertex,
        step_rate: 0,
    }
}

fn world_row(index: u32) -> InputElementDescriptor {
    InputElementDescriptor {
        semantic_name: Cow::Borrowed("WORLD"),
        semantic_index: index,
        format: VertexFormat::Float32x4,
        input_slot: INSTANCE_SLOT,
        byte_offset: index * 16,
        step_mode: InputStepMode::Instance,
        step_rate: 1,
    }
}

/// Returns the attribute layout for a vertex format.
pub fn describe_layout(kind: VertexLayoutKind) -> VertexLayoutDescriptor {
    let mut elements = vec![
        vertex_element("POSITION", VertexFormat::Float32x3, 0),
        vertex_element("NORMAL", VertexFormat::Float32x3, 12),
        vertex_element("TANGENT", VertexFormat::Float32x3, 24),
        vertex_element("TEXCOORD", VertexFormat::Float32x2, 36),
    ];
    if kind.is_instanced() {
        elements.extend((0..4).map(world_row));
    }
    VertexLayoutDescriptor {
        name: kind.name(),
        elements,
    }
}

/// Returns the attribute layout for a vertex format given by name.
///
/// # Errors
/// [`RenderError::UnknownFormat`] if `name` is not one of the four known formats.
pub fn describe_layout_by_name(name: &str) -> Result<VertexLayoutDescriptor, RenderError> {
    name.parse().map(describe_layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_layout_is_valid() {
        for kind in VertexLayoutKind::ALL {
            let layout = describe_layout(kind);
            assert!(layout.validate().is_ok(), "{kind} failed validation");
            assert_eq!(layout.is_instanced(), kind.is_instanced());
        }
    }

    #[test]
    fn test_strides_match_attribute_sums() {
        for kind in VertexLayoutKind::ALL {
            let layout = describe_layout(kind);
            for slot in [VERTEX_SLOT, INSTANCE_SLOT] {
                let sum: u32 = layout
                    .elements_in_slot(slot)
                    .map(|e| e.format.size() as u32)
                    .sum();
                assert_eq!(layout.stride(slot), sum, "{kind} slot {slot}");
            }
            assert_eq!(layout.stride(VERTEX_SLOT), MESH_VERTEX_STRIDE);
            let expected_instance = if kind.is_instanced() { INSTANCE_STRIDE } else { 0 };
            assert_eq!(layout.stride(INSTANCE_SLOT), expected_instance);
        }
    }

    #[test]
    fn test_instance_attributes_follow_vertex_attributes() {
        for kind in VertexLayoutKind::ALL {
            let layout = describe_layout(kind);
            let last_vertex = layout
                .elements
                .iter()
                .rposition(|e| e.step_mode == InputStepMode::Vertex);
            let first_instance = layout
                .elements
                .iter()
                .position(|e| e.step_mode == InputStepMode::Instance);
            if let (Some(v), Some(i)) = (last_vertex, first_instance) {
                assert!(v < i);
            }
        }
    }

    #[test]
    fn test_world_rows() {
        let layout = describe_layout(VertexLayoutKind::ShadowShape);
        let rows: Vec<_> = layout.elements_in_slot(INSTANCE_SLOT).collect();
        assert_eq!(rows.len(), 4);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.semantic_name, "WORLD");
            assert_eq!(row.semantic_index, i as u32);
            assert_eq!(row.byte_offset, i as u32 * 16);
            assert_eq!(row.step_rate, 1);
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let layout = describe_layout_by_name("shadow-floor").unwrap();
        assert_eq!(layout.name, "shadow-floor");
        assert!(!layout.is_instanced());
        match describe_layout_by_name("terrain") {
            Err(RenderError::UnknownFormat(name)) => assert_eq!(name, "terrain"),
            other => panic!("expected UnknownFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_instance_transform_matches_matrix_bytes() {
        let world = Mat4::from_translation(penumbra_core::math::Vec3::new(1.0, 2.0, 3.0));
        let instance = InstanceTransform::from(world);
        assert_eq!(bytemuck::bytes_of(&instance), bytemuck::bytes_of(&world));
    }
}
