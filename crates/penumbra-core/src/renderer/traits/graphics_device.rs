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

use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// The device handle: creates, releases and submits work to device objects.
///
/// Every object created through this trait must be released through the matching
/// `destroy_*` call. Callers own that pairing; the device never releases objects
/// on their behalf.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a shader object from precompiled bytecode.
    /// ## Errors
    /// * `ResourceError` - If the device rejects the bytecode.
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError>;

    /// Destroys the shader object associated with the given ID.
    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError>;

    /// Creates an input layout, validating it against the vertex shader's input signature.
    /// ## Errors
    /// * `ResourceError` - If the layout is malformed or does not match the bytecode.
    fn create_input_layout(
        &self,
        descriptor: &InputLayoutDescriptor,
    ) -> Result<InputLayoutId, ResourceError>;

    /// Destroys the input layout associated with the given ID.
    fn destroy_input_layout(&self, id: InputLayoutId) -> Result<(), ResourceError>;

    /// Creates a new buffer with undefined contents.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a new buffer and initializes it with `data`.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes `data` into a buffer at `offset`.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write would run past the end of the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Creates a 2D texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a texture. Views of it must have been destroyed first.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a view of an existing texture.
    fn create_texture_view(
        &self,
        texture_id: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError>;

    /// Destroys a texture view.
    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError>;

    /// Creates a sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /// Creates a new command encoder.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a previously recorded command buffer for execution.
    fn submit_command_buffer(&self, command_buffer: CommandBufferId);

    /// The alignment required for constant buffer binding offsets, in bytes.
    fn min_constant_buffer_offset_alignment(&self) -> u64 {
        256
    }
}
