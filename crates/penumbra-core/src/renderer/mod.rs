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

//! Backend-agnostic rendering contracts.
//!
//! The `traits` describe the device handle the pipeline drives, the `api` types are
//! the descriptors and handles exchanged with it, and `light` holds the records
//! shaders read from constant memory. Concrete devices live in `penumbra-infra`;
//! the passes that drive them live in `penumbra-lanes`.

pub mod api;
pub mod error;
pub mod light;
pub mod traits;

pub use self::api::*;
pub use self::error::{RenderError, ResourceError, ShaderError};
pub use self::light::{DirectionalLight, GpuRecord, Material, PointLight, SpotLight};
pub use self::traits::{CommandEncoder, GraphicsDevice, RenderPass};
