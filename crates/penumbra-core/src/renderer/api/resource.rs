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

//! Buffers, textures, views and samplers.

use std::borrow::Cow;
use std::ops::{BitOr, BitOrAssign};

/// An opaque handle to a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// An opaque handle to a device texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// An opaque handle to a view of a texture (render target, depth target or shader input).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewId(pub usize);

/// An opaque handle to a sampler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerId(pub usize);

/// How a buffer may be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferUsage {
    bits: u32,
}

impl BufferUsage {
    /// No usage.
    pub const NONE: Self = Self { bits: 0 };
    /// Bound as a vertex or instance stream.
    pub const VERTEX: Self = Self { bits: 1 << 0 };
    /// Bound as an index buffer.
    pub const INDEX: Self = Self { bits: 1 << 1 };
    /// Bound as a shader constant buffer.
    pub const CONSTANT: Self = Self { bits: 1 << 2 };
    /// Rewritten from the CPU after creation.
    pub const COPY_DST: Self = Self { bits: 1 << 3 };

    /// Creates usage flags from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks whether every flag in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    /// Checks if no flag is set.
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl BitOr for BufferUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOrAssign for BufferUsage {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// A descriptor used to create a buffer.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size of the buffer in bytes.
    pub size: u64,
    /// How the buffer will be bound.
    pub usage: BufferUsage,
}

/// Pixel formats used by the shadow and main passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized.
    Rgba8Unorm,
    /// 32-bit float depth, writable as a depth target.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// Single 32-bit float channel, the shader-readable view of a depth texture.
    R32Float,
}

impl TextureFormat {
    /// Returns `true` for formats that can back a depth target view.
    pub const fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    /// Returns `true` if a texture of format `self` can be viewed as `view`.
    pub fn is_view_compatible(&self, view: TextureFormat) -> bool {
        *self == view || matches!((self, view), (TextureFormat::Depth32Float, TextureFormat::R32Float))
    }
}

/// How a texture may be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUsage {
    bits: u32,
}

impl TextureUsage {
    /// No usage.
    pub const NONE: Self = Self { bits: 0 };
    /// Sampled from a shader.
    pub const SHADER_RESOURCE: Self = Self { bits: 1 << 0 };
    /// Written as a color target.
    pub const RENDER_TARGET: Self = Self { bits: 1 << 1 };
    /// Written as a depth/stencil target.
    pub const DEPTH_STENCIL: Self = Self { bits: 1 << 2 };

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks whether every flag in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }
}

impl BitOr for TextureUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// A descriptor used to create a 2D texture.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Storage format.
    pub format: TextureFormat,
    /// How the texture will be bound.
    pub usage: TextureUsage,
}

/// What a texture view is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewKind {
    /// A color render target.
    RenderTarget,
    /// A depth/stencil target.
    DepthStencil,
    /// A shader-readable input.
    ShaderResource,
}

impl TextureViewKind {
    /// The texture usage flag a view of this kind requires.
    pub const fn required_usage(&self) -> TextureUsage {
        match self {
            TextureViewKind::RenderTarget => TextureUsage::RENDER_TARGET,
            TextureViewKind::DepthStencil => TextureUsage::DEPTH_STENCIL,
            TextureViewKind::ShaderResource => TextureUsage::SHADER_RESOURCE,
        }
    }
}

/// A descriptor used to create a view of an existing texture.
#[derive(Debug, Clone)]
pub struct TextureViewDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// How the view is bound.
    pub kind: TextureViewKind,
    /// The format the view reinterprets the texture as.
    pub format: TextureFormat,
}

/// Texture coordinate handling outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Return the sampler's border color.
    ClampToBorder,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Bilinear interpolation. Combined with a comparison this yields 2x2 PCF.
    Linear,
}

/// The comparison a depth-compare sampler performs against the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    /// Passes if the reference is less than the stored value.
    Less,
    /// Passes if the reference is less than or equal to the stored value.
    LessEqual,
}

impl CompareFunction {
    /// Evaluates the comparison for a reference depth against a stored depth.
    pub fn passes(&self, reference: f32, stored: f32) -> bool {
        match self {
            CompareFunction::Less => reference < stored,
            CompareFunction::LessEqual => reference <= stored,
        }
    }
}

/// A descriptor used to create a sampler.
#[derive(Debug, Clone)]
pub struct SamplerDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Addressing on every axis.
    pub address_mode: AddressMode,
    /// Filtering for magnification and minification.
    pub filter: FilterMode,
    /// When set, the sampler performs a depth comparison instead of a plain fetch.
    pub compare: Option<CompareFunction>,
    /// Border color used with [`AddressMode::ClampToBorder`].
    pub border_color: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_flags() {
        let usage = BufferUsage::VERTEX | BufferUsage::COPY_DST;
        assert!(usage.contains(BufferUsage::VERTEX));
        assert!(!usage.contains(BufferUsage::INDEX));
        assert!(BufferUsage::NONE.is_empty());
        assert_eq!(BufferUsage::from_bits(usage.bits()), usage);
    }

    #[test]
    fn test_depth_texture_is_viewable_as_r32() {
        assert!(TextureFormat::Depth32Float.is_view_compatible(TextureFormat::R32Float));
        assert!(!TextureFormat::Rgba8Unorm.is_view_compatible(TextureFormat::R32Float));
        assert!(TextureFormat::Depth32Float.is_depth());
    }

    #[test]
    fn test_compare_less_equal() {
        assert!(CompareFunction::LessEqual.passes(0.5, 0.5));
        assert!(!CompareFunction::Less.passes(0.5, 0.5));
    }
}
