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

use super::device::HeadlessDeviceInternal;
use penumbra_core::renderer::api::{
    BufferId, CommandBufferId, IndexFormat, InputLayoutId, LoadOp, RenderPassDescriptor,
    SamplerId, ShaderModuleId, ShaderStage, TextureViewId, Viewport,
};
use penumbra_core::renderer::{CommandEncoder, RenderPass};
use std::ops::Range;
use std::sync::Arc;

/// One command recorded inside a render pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// `set_viewport`.
    SetViewport(Viewport),
    /// `set_input_layout`.
    SetInputLayout(InputLayoutId),
    /// `set_vertex_shader`.
    SetVertexShader(ShaderModuleId),
    /// `set_pixel_shader`.
    SetPixelShader(Option<ShaderModuleId>),
    /// `set_constant_buffer`.
    SetConstantBuffer {
        /// Shader stage.
        stage: ShaderStage,
        /// Register block.
        slot: u32,
        /// Source buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// Byte size.
        size: u64,
    },
    /// `set_shader_resource`.
    SetShaderResource {
        /// Shader stage.
        stage: ShaderStage,
        /// Resource slot.
        slot: u32,
        /// Bound view, `None` when unbinding.
        view: Option<TextureViewId>,
    },
    /// `set_sampler`.
    SetSampler {
        /// Shader stage.
        stage: ShaderStage,
        /// Sampler slot.
        slot: u32,
        /// Bound sampler.
        sampler: SamplerId,
    },
    /// `set_vertex_buffer`.
    SetVertexBuffer {
        /// Input slot.
        slot: u32,
        /// Source buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// Element stride.
        stride: u32,
    },
    /// `set_index_buffer`.
    SetIndexBuffer {
        /// Source buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// Index width.
        format: IndexFormat,
    },
    /// `draw_indexed`.
    DrawIndexed {
        /// Index range.
        indices: Range<u32>,
        /// Added to every index.
        base_vertex: i32,
        /// Instance range.
        instances: Range<u32>,
    },
}

/// A finished render pass as the device saw it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PassRecord {
    /// The pass label.
    pub label: Option<String>,
    /// Color targets, in attachment order.
    pub color_targets: Vec<TextureViewId>,
    /// The depth target, if any.
    pub depth_target: Option<TextureViewId>,
    /// The depth clear value, if the pass cleared depth.
    pub depth_clear: Option<f32>,
    /// Recorded commands, in order.
    pub commands: Vec<RecordedCommand>,
}

impl PassRecord {
    /// Number of draw calls in the pass.
    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    /// The draw calls of the pass.
    pub fn draws(&self) -> impl Iterator<Item = &RecordedCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::DrawIndexed { .. }))
    }

    /// Every view bound as a shader resource during the pass.
    pub fn sampled_views(&self) -> impl Iterator<Item = TextureViewId> + '_ {
        self.commands.iter().filter_map(|c| match c {
            RecordedCommand::SetShaderResource { view, .. } => *view,
            _ => None,
        })
    }
}

pub(crate) struct HeadlessRenderPass<'encoder> {
    record: PassRecord,
    sink: &'encoder mut Vec<PassRecord>,
}

impl HeadlessRenderPass<'_> {
    fn push(&mut self, command: RecordedCommand) {
        self.record.commands.push(command);
    }
}

impl RenderPass for HeadlessRenderPass<'_> {
    fn set_viewport(&mut self, viewport: &Viewport) {
        self.push(RecordedCommand::SetViewport(*viewport));
    }

    fn set_input_layout(&mut self, layout: InputLayoutId) {
        self.push(RecordedCommand::SetInputLayout(layout));
    }

    fn set_vertex_shader(&mut self, shader: ShaderModuleId) {
        self.push(RecordedCommand::SetVertexShader(shader));
    }

    fn set_pixel_shader(&mut self, shader: Option<ShaderModuleId>) {
        self.push(RecordedCommand::SetPixelShader(shader));
    }

    fn set_constant_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        buffer: BufferId,
        offset: u64,
        size: u64,
    ) {
        self.push(RecordedCommand::SetConstantBuffer {
            stage,
            slot,
            buffer,
            offset,
            size,
        });
    }

    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<TextureViewId>) {
        if view.is_some() && view == self.record.depth_target {
            log::warn!(
                "HeadlessRenderPass: view {:?} is bound as both depth target and shader input",
                view
            );
        }
        self.push(RecordedCommand::SetShaderResource { stage, slot, view });
    }

    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: SamplerId) {
        self.push(RecordedCommand::SetSampler {
            stage,
            slot,
            sampler,
        });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64, stride: u32) {
        self.push(RecordedCommand::SetVertexBuffer {
            slot,
            buffer,
            offset,
            stride,
        });
    }

    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, format: IndexFormat) {
        self.push(RecordedCommand::SetIndexBuffer {
            buffer,
            offset,
            format,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.push(RecordedCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

impl Drop for HeadlessRenderPass<'_> {
    fn drop(&mut self) {
        self.sink.push(std::mem::take(&mut self.record));
    }
}

pub(crate) struct HeadlessCommandEncoder {
    device: Arc<HeadlessDeviceInternal>,
    label: Option<String>,
    passes: Vec<PassRecord>,
}

impl HeadlessCommandEncoder {
    pub(crate) fn new(device: Arc<HeadlessDeviceInternal>, label: Option<String>) -> Self {
        Self {
            device,
            label,
            passes: Vec::new(),
        }
    }
}

impl CommandEncoder for HeadlessCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        let depth = descriptor.depth_stencil_attachment.as_ref();
        let record = PassRecord {
            label: descriptor.label.map(str::to_string),
            color_targets: descriptor
                .color_attachments
                .iter()
                .map(|attachment| *attachment.view)
                .collect(),
            depth_target: depth.map(|d| *d.view),
            depth_clear: depth
                .and_then(|d| d.depth_ops)
                .and_then(|ops| match ops.load {
                    LoadOp::Clear(value) => Some(value),
                    LoadOp::Load => None,
                }),
            commands: Vec::new(),
        };
        Box::new(HeadlessRenderPass {
            record,
            sink: &mut self.passes,
        })
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let id = self.device.generate_command_buffer_id();
        log::trace!(
            "HeadlessCommandEncoder '{}': finished {} passes as {:?}",
            self.label.as_deref().unwrap_or("unlabeled"),
            self.passes.len(),
            id
        );
        self.device.store_command_buffer(id, self.passes);
        id
    }
}
