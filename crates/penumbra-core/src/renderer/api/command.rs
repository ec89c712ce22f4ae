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

//! Render pass descriptors and command buffer handles.

use crate::math::LinearRgba;
use crate::renderer::api::resource::TextureViewId;

/// An opaque handle to a recorded command buffer that is ready for submission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);

/// Describes the operation to perform on an attachment at the start of a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadOp<V> {
    /// The existing contents of the attachment will be loaded into the pass.
    Load,
    /// The attachment will be cleared to the specified value before the pass begins.
    Clear(V),
}

/// Describes the operation to perform on an attachment at the end of a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    /// The results of the render pass will be stored to the attachment's memory.
    Store,
    /// The results of the render pass will be discarded.
    Discard,
}

/// Defines the load and store operations for a single render pass attachment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Operations<V> {
    /// The operation to perform at the beginning of the pass.
    pub load: LoadOp<V>,
    /// The operation to perform at the end of the pass.
    pub store: StoreOp,
}

/// A color attachment for a render pass.
#[derive(Debug)]
pub struct RenderPassColorAttachment<'a> {
    /// The view that will be rendered to.
    pub view: &'a TextureViewId,
    /// The load and store operations for this attachment.
    pub ops: Operations<LinearRgba>,
}

/// A depth/stencil attachment for a render pass.
#[derive(Debug)]
pub struct RenderPassDepthStencilAttachment<'a> {
    /// The depth/stencil view.
    pub view: &'a TextureViewId,
    /// The load and store operations for the depth aspect.
    pub depth_ops: Option<Operations<f32>>,
    /// The load and store operations for the stencil aspect.
    pub stencil_ops: Option<Operations<u32>>,
}

/// A descriptor for a render pass.
///
/// A depth-only pass, such as the shadow pass, has no color attachments.
#[derive(Debug, Default)]
pub struct RenderPassDescriptor<'a> {
    /// An optional debug label for the render pass.
    pub label: Option<&'a str>,
    /// The color attachments written by the pass.
    pub color_attachments: &'a [RenderPassColorAttachment<'a>],
    /// An optional depth/stencil attachment for this pass.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<'a>>,
}

/// The rasterizer viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Depth mapped from NDC z = 0.
    pub min_depth: f32,
    /// Depth mapped from NDC z = 1.
    pub max_depth: f32,
}

impl Viewport {
    /// A full-target viewport with the standard `[0, 1]` depth range.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// The integer width of indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// Size of a single index in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}
