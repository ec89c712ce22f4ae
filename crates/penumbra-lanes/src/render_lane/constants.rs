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

//! Per-frame constant records and the ring buffer they are written into.

use penumbra_core::math::{Mat4, Vec3};
use penumbra_core::renderer::api::{BufferDescriptor, BufferId, BufferUsage};
use penumbra_core::renderer::{DirectionalLight, GraphicsDevice, Material, ResourceError};
use std::borrow::Cow;

/// Maximum number of directional lights the lit shaders read.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 3;

/// Number of frames whose constants may be in flight at once.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Constants shared by every draw of one pass (register block 0).
///
/// In the shadow pass `view_proj` is the light's view-projection; in the main
/// pass it is the camera's, and `shadow_transform` projects into the shadow map.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PassConstants {
    /// View-projection used to transform vertices in this pass.
    pub view_proj: Mat4,
    /// World to shadow-map `(u, v, depth)`.
    pub shadow_transform: Mat4,
    /// Eye position in world space.
    pub eye_position: [f32; 3],
    /// Number of valid entries in `lights`.
    pub light_count: u32,
    /// Directional lights, zero-filled past `light_count`.
    pub lights: [DirectionalLight; MAX_DIRECTIONAL_LIGHTS],
}

impl PassConstants {
    /// Builds pass constants, keeping at most [`MAX_DIRECTIONAL_LIGHTS`] lights.
    pub fn new(
        view_proj: Mat4,
        shadow_transform: Mat4,
        eye: Vec3,
        lights: &[DirectionalLight],
    ) -> Self {
        let mut packed = [DirectionalLight::default(); MAX_DIRECTIONAL_LIGHTS];
        let count = lights.len().min(MAX_DIRECTIONAL_LIGHTS);
        packed[..count].copy_from_slice(&lights[..count]);
        Self {
            view_proj,
            shadow_transform,
            eye_position: eye.to_array(),
            light_count: count as u32,
            lights: packed,
        }
    }
}

/// Constants for a single draw (register block 1).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectConstants {
    /// Object to world. Identity for instanced draws, whose transforms come from the stream.
    pub world: Mat4,
    /// Inverse-transpose of `world`, for normals.
    pub world_inv_transpose: Mat4,
    /// Surface material.
    pub material: Material,
}

impl ObjectConstants {
    /// Builds object constants. A singular `world` falls back to an identity normal matrix.
    pub fn new(world: Mat4, material: Material) -> Self {
        let world_inv_transpose = world
            .inverse()
            .map(|inv| inv.transpose())
            .unwrap_or(Mat4::IDENTITY);
        Self {
            world,
            world_inv_transpose,
            material,
        }
    }
}

const _: () = assert!(std::mem::size_of::<PassConstants>() % 16 == 0);
const _: () = assert!(std::mem::size_of::<ObjectConstants>() % 16 == 0);

/// A slice of a constant buffer holding one pushed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantSlice {
    /// The buffer the record lives in.
    pub buffer: BufferId,
    /// Byte offset of the record.
    pub offset: u64,
    /// Byte size of the record.
    pub size: u64,
}

#[derive(Debug)]
struct BufferChunk {
    buffer: BufferId,
    capacity: u64,
    cursor: u64,
}

#[derive(Debug)]
struct RingSlot {
    chunks: Vec<BufferChunk>,
    active: usize,
}

/// A ring of constant buffers, one slot per frame in flight.
///
/// Records are appended at aligned offsets. When a slot runs out of room a new,
/// larger chunk is appended to it and kept for later frames.
#[derive(Debug)]
pub struct ConstantRing {
    slots: Vec<RingSlot>,
    current: usize,
    alignment: u64,
    label: &'static str,
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn create_chunk(
    device: &dyn GraphicsDevice,
    label: String,
    capacity: u64,
) -> Result<BufferChunk, ResourceError> {
    let buffer = device.create_buffer(&BufferDescriptor {
        label: Some(Cow::Owned(label)),
        size: capacity,
        usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
    })?;
    Ok(BufferChunk {
        buffer,
        capacity,
        cursor: 0,
    })
}

impl ConstantRing {
    /// Creates a ring with room for `elements` records of `element_size` bytes per frame.
    pub fn new(
        device: &dyn GraphicsDevice,
        element_size: u64,
        elements: u64,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let alignment = device.min_constant_buffer_offset_alignment().max(16);
        let capacity = align_up(element_size, alignment) * elements.max(1);

        let mut slots: Vec<RingSlot> = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for i in 0..FRAMES_IN_FLIGHT {
            match create_chunk(device, format!("{label} [slot {i}]"), capacity) {
                Ok(chunk) => slots.push(RingSlot {
                    chunks: vec![chunk],
                    active: 0,
                }),
                Err(e) => {
                    let partial = Self {
                        slots,
                        current: 0,
                        alignment,
                        label,
                    };
                    partial.destroy(device);
                    return Err(e);
                }
            }
        }

        Ok(Self {
            slots,
            current: 0,
            alignment,
            label,
        })
    }

    /// Moves to the next frame's slot and rewinds it.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
        let slot = &mut self.slots[self.current];
        for chunk in &mut slot.chunks {
            chunk.cursor = 0;
        }
        slot.active = 0;
    }

    /// Writes `data` into the current slot and returns where it landed.
    pub fn push(
        &mut self,
        device: &dyn GraphicsDevice,
        data: &[u8],
    ) -> Result<ConstantSlice, ResourceError> {
        let size = data.len() as u64;
        let aligned = align_up(size, self.alignment);
        let current = self.current;
        let slot = &mut self.slots[current];

        let fits = |chunk: &BufferChunk| chunk.cursor + aligned <= chunk.capacity;
        if !fits(&slot.chunks[slot.active]) {
            if slot.active + 1 < slot.chunks.len() && slot.chunks[slot.active + 1].capacity >= aligned {
                slot.active += 1;
            } else {
                let new_capacity = (slot.chunks[slot.active].capacity * 2).max(aligned * 16);
                let index = slot.chunks.len();
                let chunk = create_chunk(
                    device,
                    format!("{} [slot {} chunk {}]", self.label, current, index),
                    new_capacity,
                )?;
                log::debug!(
                    "ConstantRing({}): grew slot {} to {} chunks",
                    self.label,
                    current,
                    index + 1
                );
                slot.chunks.push(chunk);
                slot.active = index;
            }
        }

        let chunk = &mut slot.chunks[slot.active];
        let offset = chunk.cursor;
        device.write_buffer(chunk.buffer, offset, data)?;
        chunk.cursor += aligned;

        Ok(ConstantSlice {
            buffer: chunk.buffer,
            offset,
            size,
        })
    }

    /// Pushes a plain-data record.
    pub fn push_record<T: bytemuck::Pod>(
        &mut self,
        device: &dyn GraphicsDevice,
        record: &T,
    ) -> Result<ConstantSlice, ResourceError> {
        self.push(device, bytemuck::bytes_of(record))
    }

    /// Releases every buffer of the ring.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        for chunk in self.slots.iter().flat_map(|slot| slot.chunks.iter()) {
            if let Err(e) = device.destroy_buffer(chunk.buffer) {
                log::warn!(
                    "ConstantRing({}): Failed to destroy buffer: {:?}",
                    self.label,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penumbra_core::math::Vec3;

    #[test]
    fn test_pass_constants_clamp_light_count() {
        let light = DirectionalLight::new(
            Default::default(),
            Default::default(),
            Default::default(),
            Vec3::new(0.0, -1.0, 0.0),
        );
        let pass = PassConstants::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO, &[light; 5]);
        assert_eq!(pass.light_count, MAX_DIRECTIONAL_LIGHTS as u32);
        assert_eq!(pass.lights[2], light);
    }

    #[test]
    fn test_object_constants_inverse_transpose() {
        let world = Mat4::from_scale(Vec3::new(2.0, 4.0, 8.0));
        let constants = ObjectConstants::new(world, Material::default());
        let n = constants.world_inv_transpose.transform_vector(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(n, Vec3::new(0.5, 0.25, 0.125));
        let singular = ObjectConstants::new(Mat4::ZERO, Material::default());
        assert_eq!(singular.world_inv_transpose, Mat4::IDENTITY);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(336, 256), 512);
    }
}
