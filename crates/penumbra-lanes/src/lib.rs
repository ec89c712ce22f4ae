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

//! # Penumbra Lanes
//!
//! Hot-path pipelines for the two-pass shadow-mapping technique: the vertex
//! layout registry, the shader and resource lifecycle, and the pass scheduler.

#![warn(missing_docs)]

pub mod config;
pub mod render_lane;

pub use config::{SettingsError, ShadowSettings};
pub use render_lane::*;
