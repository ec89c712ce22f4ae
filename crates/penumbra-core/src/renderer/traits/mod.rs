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

//! The device contracts the pipeline is written against.
//!
//! - [`GraphicsDevice`]: creates and releases device objects and submits work.
//! - [`CommandEncoder`] and [`RenderPass`]: record passes, bindings and draws.

mod command_recorder;
mod graphics_device;

pub use self::command_recorder::*;
pub use self::graphics_device::GraphicsDevice;
