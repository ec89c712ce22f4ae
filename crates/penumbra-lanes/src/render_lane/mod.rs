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

//! Rendering lane: the shadow-mapping hot path.
//!
//! - [`vertex_layouts`]: the closed set of vertex formats and their input layouts.
//! - [`ShaderLibrary`]: creation and release of every technique's programs.
//! - [`ShadowPassLane`]: the shadow depth pass followed by the lit main pass.
//! - [`ShadowPipeline`]: a device session tying the two together.

mod bytecode;
mod constants;
mod session;
mod shader_library;
mod shadow_map;
mod shadow_pass_lane;
mod technique;
pub mod vertex_layouts;

pub use bytecode::*;
pub use constants::*;
pub use session::*;
pub use shader_library::*;
pub use shadow_map::*;
pub use shadow_pass_lane::*;
pub use technique::*;
pub use vertex_layouts::{
    describe_layout, describe_layout_by_name, InstanceTransform, MeshVertex, VertexLayoutKind,
    INSTANCE_STRIDE, MESH_VERTEX_STRIDE,
};
