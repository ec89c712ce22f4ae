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

//! Procedural geometry and render targets for the demo.

use anyhow::{Context, Result};
use penumbra_core::math::{LinearRgba, Mat4, Vec3};
use penumbra_core::renderer::api::*;
use penumbra_core::renderer::{GraphicsDevice, Material};
use penumbra_lanes::{DrawItem, InstanceStream, InstanceTransform, MeshVertex, ShadowSettings};
use std::borrow::Cow;

/// Number of boxes orbiting the origin.
pub const BOX_COUNT: u32 = 6;

const FLOOR_CELLS: u32 = 8;
const FLOOR_EXTENT: f32 = 9.0;

/// Device objects owned by the demo rather than the pipeline.
pub struct DemoScene {
    pub draws: Vec<DrawItem>,
    pub targets: penumbra_lanes::FrameTargets,
    buffers: Vec<BufferId>,
    views: Vec<TextureViewId>,
    textures: Vec<TextureId>,
}

fn vertex(position: Vec3, normal: Vec3, tangent: Vec3, uv: [f32; 2]) -> MeshVertex {
    MeshVertex {
        position: position.to_array(),
        normal: normal.to_array(),
        tangent: tangent.to_array(),
        uv,
    }
}

/// A unit cube with per-face normals.
fn cube_mesh() -> (Vec<MeshVertex>, Vec<u32>) {
    let faces = [
        (Vec3::X, Vec3::Z),
        (-Vec3::X, Vec3::Z),
        (Vec3::Y, Vec3::X),
        (-Vec3::Y, Vec3::X),
        (Vec3::Z, -Vec3::X),
        (-Vec3::Z, Vec3::X),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, tangent) in faces {
        let bitangent = normal.cross(tangent);
        let base = vertices.len() as u32;
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let position =
                (normal + tangent * (u * 2.0 - 1.0) + bitangent * (v * 2.0 - 1.0)) * 0.5;
            vertices.push(vertex(position, normal, tangent, [u, v]));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

/// A flat grid on the y = 0 plane.
fn floor_mesh() -> (Vec<MeshVertex>, Vec<u32>) {
    let n = FLOOR_CELLS;
    let mut vertices = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
    for z in 0..=n {
        for x in 0..=n {
            let u = x as f32 / n as f32;
            let v = z as f32 / n as f32;
            let position = Vec3::new(
                (u * 2.0 - 1.0) * FLOOR_EXTENT,
                0.0,
                (v * 2.0 - 1.0) * FLOOR_EXTENT,
            );
            vertices.push(vertex(position, Vec3::Y, Vec3::X, [u * 4.0, v * 4.0]));
        }
    }
    let mut indices = Vec::with_capacity((n * n * 6) as usize);
    for z in 0..n {
        for x in 0..n {
            let i = z * (n + 1) + x;
            indices.extend_from_slice(&[i, i + n + 1, i + 1, i + 1, i + n + 1, i + n + 2]);
        }
    }
    (vertices, indices)
}

fn box_transforms() -> Vec<InstanceTransform> {
    (0..BOX_COUNT)
        .map(|i| {
            let angle = i as f32 / BOX_COUNT as f32 * std::f32::consts::TAU;
            let position = Vec3::new(angle.cos() * 5.0, 1.0, angle.sin() * 5.0);
            (Mat4::from_translation(position)
                * Mat4::from_rotation_y(angle)
                * Mat4::from_scale(Vec3::new(1.5, 2.0, 1.5)))
            .into()
        })
        .collect()
}

impl DemoScene {
    /// Uploads the meshes and creates the main color and depth targets.
    pub fn create(device: &dyn GraphicsDevice, settings: &ShadowSettings) -> Result<Self> {
        let mut scene = Self {
            draws: Vec::new(),
            targets: penumbra_lanes::FrameTargets {
                color_view: TextureViewId(0),
                depth_view: TextureViewId(0),
                viewport: Viewport::full(settings.viewport_width, settings.viewport_height),
            },
            buffers: Vec::new(),
            views: Vec::new(),
            textures: Vec::new(),
        };
        if let Err(e) = scene.populate(device, settings) {
            scene.destroy(device);
            return Err(e);
        }
        Ok(scene)
    }

    fn populate(&mut self, device: &dyn GraphicsDevice, settings: &ShadowSettings) -> Result<()> {
        let (cube_vertices, cube_indices) = cube_mesh();
        let (floor_vertices, floor_indices) = floor_mesh();

        let cube_vb = self.upload(
            device,
            "Cube Vertices",
            BufferUsage::VERTEX,
            bytemuck::cast_slice(&cube_vertices),
        )?;
        let cube_ib = self.upload(
            device,
            "Cube Indices",
            BufferUsage::INDEX,
            bytemuck::cast_slice(&cube_indices),
        )?;
        let floor_vb = self.upload(
            device,
            "Floor Vertices",
            BufferUsage::VERTEX,
            bytemuck::cast_slice(&floor_vertices),
        )?;
        let floor_ib = self.upload(
            device,
            "Floor Indices",
            BufferUsage::INDEX,
            bytemuck::cast_slice(&floor_indices),
        )?;
        let instances = self.upload(
            device,
            "Box Transforms",
            BufferUsage::VERTEX,
            bytemuck::cast_slice(&box_transforms()),
        )?;

        self.targets.color_view = self.target(
            device,
            "Back Buffer",
            settings,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_TARGET,
            TextureViewKind::RenderTarget,
        )?;
        self.targets.depth_view = self.target(
            device,
            "Main Depth",
            settings,
            TextureFormat::Depth24PlusStencil8,
            TextureUsage::DEPTH_STENCIL,
            TextureViewKind::DepthStencil,
        )?;

        let floor_material = Material::new(
            LinearRgba::rgb(0.3, 0.3, 0.3),
            LinearRgba::rgb(0.6, 0.6, 0.6),
            LinearRgba::rgb(0.2, 0.2, 0.2),
            8.0,
            LinearRgba::BLACK,
        );
        let box_material = Material::new(
            LinearRgba::rgb(0.4, 0.25, 0.2),
            LinearRgba::rgb(0.9, 0.55, 0.4),
            LinearRgba::rgb(0.6, 0.6, 0.6),
            32.0,
            LinearRgba::BLACK,
        );

        self.draws = vec![
            DrawItem::floor(
                "floor",
                floor_vb,
                floor_ib,
                floor_indices.len() as u32,
                Mat4::IDENTITY,
                floor_material,
            ),
            DrawItem::instanced_shape(
                "boxes",
                cube_vb,
                cube_ib,
                cube_indices.len() as u32,
                InstanceStream {
                    buffer: instances,
                    offset: 0,
                },
                BOX_COUNT,
                box_material,
            ),
        ];
        Ok(())
    }

    fn upload(
        &mut self,
        device: &dyn GraphicsDevice,
        label: &str,
        usage: BufferUsage,
        data: &[u8],
    ) -> Result<BufferId> {
        let id = device
            .create_buffer_with_data(
                &BufferDescriptor {
                    label: Some(Cow::Borrowed(label)),
                    size: data.len() as u64,
                    usage,
                },
                data,
            )
            .with_context(|| format!("creating {label}"))?;
        self.buffers.push(id);
        Ok(id)
    }

    fn target(
        &mut self,
        device: &dyn GraphicsDevice,
        label: &str,
        settings: &ShadowSettings,
        format: TextureFormat,
        usage: TextureUsage,
        kind: TextureViewKind,
    ) -> Result<TextureViewId> {
        let texture = device
            .create_texture(&TextureDescriptor {
                label: Some(Cow::Borrowed(label)),
                width: settings.viewport_width,
                height: settings.viewport_height,
                format,
                usage,
            })
            .with_context(|| format!("creating {label}"))?;
        self.textures.push(texture);
        let view = device
            .create_texture_view(
                texture,
                &TextureViewDescriptor {
                    label: Some(Cow::Borrowed(label)),
                    kind,
                    format,
                },
            )
            .with_context(|| format!("creating {label} view"))?;
        self.views.push(view);
        Ok(view)
    }

    /// Releases everything the scene created.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for view in self.views.drain(..) {
            if let Err(e) = device.destroy_texture_view(view) {
                log::warn!("DemoScene: Failed to destroy view: {e}");
            }
        }
        for texture in self.textures.drain(..) {
            if let Err(e) = device.destroy_texture(texture) {
                log::warn!("DemoScene: Failed to destroy texture: {e}");
            }
        }
        for buffer in self.buffers.drain(..) {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("DemoScene: Failed to destroy buffer: {e}");
            }
        }
        self.draws.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_normals_face_outwards() {
        let (vertices, indices) = cube_mesh();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        for v in &vertices {
            let p = Vec3::new(v.position[0], v.position[1], v.position[2]);
            let n = Vec3::new(v.normal[0], v.normal[1], v.normal[2]);
            assert!((p.dot(n) - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_floor_indices_in_range() {
        let (vertices, indices) = floor_mesh();
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }
}
