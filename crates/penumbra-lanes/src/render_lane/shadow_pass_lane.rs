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

//! The two-pass frame scheduler: shadow depth pass, then the lit main pass.

use super::constants::{ConstantRing, ConstantSlice, ObjectConstants, PassConstants};
use super::shader_library::{ShaderLibrary, ShaderProgramSet};
use super::shadow_map::{LightSpace, SceneBounds, ShadowCaster, ShadowMap};
use super::technique::{GeometryKind, RenderPassState, Technique};
use super::vertex_layouts::{INSTANCE_STRIDE, MESH_VERTEX_STRIDE};
use crate::config::ShadowSettings;
use penumbra_core::math::{LinearRgba, Mat4, Vec3};
use penumbra_core::renderer::api::{
    BufferId, IndexFormat, LoadOp, Operations, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, ShaderStage, StoreOp, TextureViewId,
    Viewport, INSTANCE_SLOT, VERTEX_SLOT,
};
use penumbra_core::renderer::{
    DirectionalLight, GraphicsDevice, Material, RenderError, RenderPass,
};
use std::mem::size_of;

/// Constant register block holding [`PassConstants`].
pub const PASS_CONSTANTS_SLOT: u32 = 0;
/// Constant register block holding [`ObjectConstants`].
pub const OBJECT_CONSTANTS_SLOT: u32 = 1;
/// Pixel-stage slot the shadow map and its comparison sampler are bound to.
pub const SHADOW_MAP_SLOT: u32 = 0;

/// A per-instance transform stream supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceStream {
    /// Buffer of [`InstanceTransform`](super::InstanceTransform) records.
    pub buffer: BufferId,
    /// Byte offset of the first record.
    pub offset: u64,
}

/// One object to draw in both passes.
#[derive(Debug, Clone)]
pub struct DrawItem {
    /// Debug name.
    pub label: String,
    /// Selects the technique in each pass.
    pub geometry: GeometryKind,
    /// Mesh vertices, [`MeshVertex`](super::MeshVertex) records.
    pub vertex_buffer: BufferId,
    /// Mesh indices.
    pub index_buffer: BufferId,
    /// Width of each index.
    pub index_format: IndexFormat,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Instance transforms. Required for [`GeometryKind::Shape`] unless `instance_count` is 0.
    pub instances: Option<InstanceStream>,
    /// Number of instances. Zero skips the item in both passes.
    pub instance_count: u32,
    /// Object to world. Instanced shapes usually leave this at identity.
    pub world: Mat4,
    /// Surface material.
    pub material: Material,
}

impl DrawItem {
    /// A single, non-instanced floor draw.
    pub fn floor(
        label: impl Into<String>,
        vertex_buffer: BufferId,
        index_buffer: BufferId,
        index_count: u32,
        world: Mat4,
        material: Material,
    ) -> Self {
        Self {
            label: label.into(),
            geometry: GeometryKind::Floor,
            vertex_buffer,
            index_buffer,
            index_format: IndexFormat::Uint32,
            index_count,
            instances: None,
            instance_count: 1,
            world,
            material,
        }
    }

    /// An instanced shape draw reading `instance_count` transforms from `instances`.
    pub fn instanced_shape(
        label: impl Into<String>,
        vertex_buffer: BufferId,
        index_buffer: BufferId,
        index_count: u32,
        instances: InstanceStream,
        instance_count: u32,
        material: Material,
    ) -> Self {
        Self {
            label: label.into(),
            geometry: GeometryKind::Shape,
            vertex_buffer,
            index_buffer,
            index_format: IndexFormat::Uint32,
            index_count,
            instances: Some(instances),
            instance_count,
            world: Mat4::IDENTITY,
            material,
        }
    }
}

/// The camera the main pass renders from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// Camera view-projection.
    pub view_proj: Mat4,
    /// Camera position in world space.
    pub eye: Vec3,
}

/// The primary color and depth targets of the main pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTargets {
    /// Back buffer view.
    pub color_view: TextureViewId,
    /// Main depth buffer view.
    pub depth_view: TextureViewId,
    /// Viewport restored for the main pass.
    pub viewport: Viewport,
}

/// Everything one frame needs from the caller.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    /// Main-pass camera.
    pub camera: CameraView,
    /// Lights shading the main pass.
    pub lights: &'a [DirectionalLight],
    /// The light the shadow map is rendered from.
    pub caster: ShadowCaster,
    /// Main-pass targets.
    pub targets: FrameTargets,
    /// Objects to draw.
    pub draws: &'a [DrawItem],
    /// Back buffer clear color.
    pub clear_color: LinearRgba,
}

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draw calls issued in the shadow pass.
    pub shadow_draws: u32,
    /// Draw calls issued in the main pass.
    pub main_draws: u32,
    /// Items skipped because their instance count was zero.
    pub skipped_draws: u32,
}

/// Resolved per-draw state, collected before any pass is recorded.
struct PreparedDraw<'a> {
    item: &'a DrawItem,
    object: ConstantSlice,
}

/// The lane that renders the shadow map and then the lit scene.
///
/// Owns the shadow depth target and the constant rings. It borrows shader
/// programs from a [`ShaderLibrary`] each frame and never releases them.
#[derive(Debug)]
pub struct ShadowPassLane {
    shadow_map_size: u32,
    bounds: SceneBounds,
    max_objects: u32,
    shadow_map: Option<ShadowMap>,
    pass_ring: Option<ConstantRing>,
    object_ring: Option<ConstantRing>,
    last_light_space: Option<LightSpace>,
}

impl ShadowPassLane {
    /// Creates a lane configured from `settings`. No device objects exist until
    /// [`on_gpu_init`](Self::on_gpu_init).
    pub fn new(settings: &ShadowSettings) -> Self {
        Self {
            shadow_map_size: settings.shadow_map_size,
            bounds: settings.scene_bounds,
            max_objects: settings.max_objects_per_frame,
            shadow_map: None,
            pass_ring: None,
            object_ring: None,
            last_light_space: None,
        }
    }

    /// The light space computed by the most recent frame.
    pub fn light_space(&self) -> Option<&LightSpace> {
        self.last_light_space.as_ref()
    }

    /// The shadow depth target, once created.
    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow_map.as_ref()
    }

    /// The volume the shadow projection is fitted around.
    pub fn bounds(&self) -> SceneBounds {
        self.bounds
    }

    /// Whether the device objects of the lane are alive.
    pub fn is_initialized(&self) -> bool {
        self.shadow_map.is_some()
    }

    /// Creates the shadow map and constant rings.
    ///
    /// # Errors
    /// [`RenderError::AlreadyInitialized`] if called twice, or the creation
    /// failure. Nothing is left alive on failure.
    pub fn on_gpu_init(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        if self.is_initialized() {
            return Err(RenderError::AlreadyInitialized);
        }

        let shadow_map = ShadowMap::new(device, self.shadow_map_size)?;

        // Two pass records per frame: shadow and main.
        let pass_ring = match ConstantRing::new(
            device,
            size_of::<PassConstants>() as u64,
            2,
            "Pass Constants",
        ) {
            Ok(ring) => ring,
            Err(e) => {
                shadow_map.destroy(device);
                return Err(RenderError::ResourceCreationFailed {
                    what: "pass constant ring".to_string(),
                    source: e,
                });
            }
        };

        let object_ring = match ConstantRing::new(
            device,
            size_of::<ObjectConstants>() as u64,
            u64::from(self.max_objects),
            "Object Constants",
        ) {
            Ok(ring) => ring,
            Err(e) => {
                pass_ring.destroy(device);
                shadow_map.destroy(device);
                return Err(RenderError::ResourceCreationFailed {
                    what: "object constant ring".to_string(),
                    source: e,
                });
            }
        };

        self.shadow_map = Some(shadow_map);
        self.pass_ring = Some(pass_ring);
        self.object_ring = Some(object_ring);
        log::info!("ShadowPassLane: GPU resources initialized");
        Ok(())
    }

    /// Releases the shadow map and constant rings. Safe to call more than once.
    pub fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        if let Some(ring) = self.object_ring.take() {
            ring.destroy(device);
        }
        if let Some(ring) = self.pass_ring.take() {
            ring.destroy(device);
        }
        if let Some(shadow_map) = self.shadow_map.take() {
            shadow_map.destroy(device);
        }
        self.last_light_space = None;
    }

    /// Records and submits one frame: the shadow pass, then the main pass.
    ///
    /// Both passes are recorded into one encoder. The shadow pass object is
    /// dropped before the main pass begins, so the depth target is complete
    /// before it is bound for sampling.
    ///
    /// # Errors
    /// * [`RenderError::NotInitialized`] before `on_gpu_init` or if `library`
    ///   is not initialized.
    /// * [`RenderError::MissingInstanceStream`] if an instanced item with a
    ///   non-zero instance count has no stream. Nothing is recorded in that case.
    /// * A light-space error for a degenerate caster.
    pub fn render_frame(
        &mut self,
        device: &dyn GraphicsDevice,
        library: &ShaderLibrary,
        inputs: &FrameInputs<'_>,
    ) -> Result<FrameStats, RenderError> {
        let (Some(shadow_map), Some(pass_ring), Some(object_ring)) = (
            self.shadow_map.as_ref(),
            self.pass_ring.as_mut(),
            self.object_ring.as_mut(),
        ) else {
            return Err(RenderError::NotInitialized);
        };

        let mut stats = FrameStats::default();

        // 1. Validate the draw list before anything is written.
        let mut visible = Vec::with_capacity(inputs.draws.len());
        for item in inputs.draws {
            if item.instance_count == 0 {
                log::trace!("ShadowPassLane: skipping '{}' (no instances)", item.label);
                stats.skipped_draws += 1;
                continue;
            }
            let technique = Technique::select(item.geometry, RenderPassState::MainPass);
            if technique.vertex_layout().is_instanced() && item.instances.is_none() {
                return Err(RenderError::MissingInstanceStream {
                    technique: technique.name().to_string(),
                });
            }
            visible.push(item);
        }

        let shadow_programs = programs_for(library, RenderPassState::ShadowPass)?;
        let main_programs = programs_for(library, RenderPassState::MainPass)?;

        // 2. Light space, kept for the main pass and for callers.
        let light_space = LightSpace::compute(&inputs.caster, &self.bounds)?;
        self.last_light_space = Some(light_space);

        // 3. Constants for both passes.
        pass_ring.advance();
        object_ring.advance();

        let shadow_pass_constants = pass_ring.push_record(
            device,
            &PassConstants::new(
                light_space.view_proj,
                light_space.shadow_transform,
                light_space.eye,
                &[],
            ),
        )?;
        let main_pass_constants = pass_ring.push_record(
            device,
            &PassConstants::new(
                inputs.camera.view_proj,
                light_space.shadow_transform,
                inputs.camera.eye,
                inputs.lights,
            ),
        )?;

        let mut prepared = Vec::with_capacity(visible.len());
        for item in visible {
            let object =
                object_ring.push_record(device, &ObjectConstants::new(item.world, item.material))?;
            prepared.push(PreparedDraw { item, object });
        }

        let mut encoder = device.create_command_encoder(Some("Shadow Frame"));

        // 4. Shadow pass: depth only, from the light.
        {
            let depth_view = shadow_map.depth_view();
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
            });
            pass.set_viewport(&shadow_map.viewport());
            bind_pass_constants(pass.as_mut(), shadow_pass_constants, &[ShaderStage::Vertex]);

            for draw in &prepared {
                let program = shadow_programs.for_geometry(draw.item.geometry);
                record_draw(pass.as_mut(), program, draw, &[ShaderStage::Vertex]);
                stats.shadow_draws += 1;
            }
        }

        // 5. Main pass: restore the primary targets and sample the shadow map.
        {
            let color_view = inputs.targets.color_view;
            let depth_view = inputs.targets.depth_view;
            let color_attachments = [RenderPassColorAttachment {
                view: &color_view,
                ops: Operations {
                    load: LoadOp::Clear(inputs.clear_color),
                    store: StoreOp::Store,
                },
            }];
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Main Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
            });
            pass.set_viewport(&inputs.targets.viewport);

            let stages = [ShaderStage::Vertex, ShaderStage::Pixel];
            bind_pass_constants(pass.as_mut(), main_pass_constants, &stages);
            pass.set_shader_resource(
                ShaderStage::Pixel,
                SHADOW_MAP_SLOT,
                Some(shadow_map.shader_view()),
            );
            pass.set_sampler(ShaderStage::Pixel, SHADOW_MAP_SLOT, shadow_map.sampler());

            for draw in &prepared {
                let program = main_programs.for_geometry(draw.item.geometry);
                record_draw(pass.as_mut(), program, draw, &stages);
                stats.main_draws += 1;
            }

            // The shadow map is a depth target again next frame.
            pass.set_shader_resource(ShaderStage::Pixel, SHADOW_MAP_SLOT, None);
        }

        let command_buffer = encoder.finish();
        device.submit_command_buffer(command_buffer);

        log::trace!(
            "ShadowPassLane: frame submitted ({} shadow draws, {} main draws, {} skipped)",
            stats.shadow_draws,
            stats.main_draws,
            stats.skipped_draws
        );
        Ok(stats)
    }
}

impl Drop for ShadowPassLane {
    fn drop(&mut self) {
        if self.is_initialized() {
            log::warn!("ShadowPassLane: dropped without on_gpu_shutdown; device objects leaked");
        }
    }
}

/// The shape and floor programs of one pass.
struct PassPrograms {
    shape: ShaderProgramSet,
    floor: ShaderProgramSet,
}

impl PassPrograms {
    fn for_geometry(&self, geometry: GeometryKind) -> &ShaderProgramSet {
        match geometry {
            GeometryKind::Shape => &self.shape,
            GeometryKind::Floor => &self.floor,
        }
    }
}

fn programs_for(library: &ShaderLibrary, pass: RenderPassState) -> Result<PassPrograms, RenderError> {
    Ok(PassPrograms {
        shape: library.get(Technique::select(GeometryKind::Shape, pass))?,
        floor: library.get(Technique::select(GeometryKind::Floor, pass))?,
    })
}

fn bind_pass_constants(pass: &mut dyn RenderPass, slice: ConstantSlice, stages: &[ShaderStage]) {
    for &stage in stages {
        pass.set_constant_buffer(stage, PASS_CONSTANTS_SLOT, slice.buffer, slice.offset, slice.size);
    }
}

fn record_draw(
    pass: &mut dyn RenderPass,
    program: &ShaderProgramSet,
    draw: &PreparedDraw<'_>,
    stages: &[ShaderStage],
) {
    let item = draw.item;
    pass.set_input_layout(program.input_layout);
    pass.set_vertex_shader(program.vertex_shader);
    pass.set_pixel_shader(Some(program.pixel_shader));
    for &stage in stages {
        pass.set_constant_buffer(
            stage,
            OBJECT_CONSTANTS_SLOT,
            draw.object.buffer,
            draw.object.offset,
            draw.object.size,
        );
    }

    pass.set_vertex_buffer(VERTEX_SLOT, item.vertex_buffer, 0, MESH_VERTEX_STRIDE);
    if program.technique.vertex_layout().is_instanced() {
        if let Some(stream) = item.instances {
            pass.set_vertex_buffer(INSTANCE_SLOT, stream.buffer, stream.offset, INSTANCE_STRIDE);
        }
    }
    pass.set_index_buffer(item.index_buffer, 0, item.index_format);
    pass.draw_indexed(0..item.index_count, 0, 0..item.instance_count);
}
