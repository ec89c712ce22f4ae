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

use crate::renderer::api::command::{CommandBufferId, IndexFormat, RenderPassDescriptor, Viewport};
use crate::renderer::api::pipeline::InputLayoutId;
use crate::renderer::api::resource::{BufferId, SamplerId, TextureViewId};
use crate::renderer::api::shader::{ShaderModuleId, ShaderStage};
use std::ops::Range;

/// A trait representing an active render pass, used for recording drawing commands.
///
/// A `RenderPass` object is obtained from a [`CommandEncoder`] and binds the fixed
/// pipeline state a technique needs (input layout, vertex and pixel shaders,
/// constants, shader inputs) before issuing indexed draws.
///
/// The pass ends when the object is dropped. Because it borrows the encoder
/// mutably, a second pass cannot begin until the first has ended.
pub trait RenderPass {
    /// Sets the rasterizer viewport.
    fn set_viewport(&mut self, viewport: &Viewport);

    /// Binds the input layout used to interpret vertex and instance streams.
    fn set_input_layout(&mut self, layout: InputLayoutId);

    /// Binds the vertex-stage shader.
    fn set_vertex_shader(&mut self, shader: ShaderModuleId);

    /// Binds the pixel-stage shader. `None` disables pixel shading (depth-only rendering).
    fn set_pixel_shader(&mut self, shader: Option<ShaderModuleId>);

    /// Binds `size` bytes of `buffer` starting at `offset` as constant register block `slot`.
    fn set_constant_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        buffer: BufferId,
        offset: u64,
        size: u64,
    );

    /// Binds a texture view as a shader input. `None` unbinds the slot.
    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<TextureViewId>);

    /// Binds a sampler.
    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: SamplerId);

    /// Binds a vertex or instance stream to a buffer slot.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64, stride: u32);

    /// Binds an index buffer for indexed drawing.
    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, index_format: IndexFormat);

    /// Records an indexed, instanced draw call.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

/// A trait for an object that records a sequence of GPU commands.
///
/// Passes are recorded strictly in the order they are begun. On an immediate
/// device this is also execution order; a deferred backend must insert a barrier
/// between passes so that a pass reading a target never runs before the pass
/// writing it has completed.
pub trait CommandEncoder {
    /// Begins a new render pass, returning a mutable `RenderPass` object.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder>;

    /// Finalizes the command recording and returns a handle to the resulting command buffer.
    fn finish(self: Box<Self>) -> CommandBufferId;
}
