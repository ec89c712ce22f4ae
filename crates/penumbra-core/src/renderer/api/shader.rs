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

//! Shader module handles and descriptors.

use std::borrow::Cow;

/// An opaque handle to a shader object created on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderModuleId(pub usize);

/// The programmable pipeline stage a shader object runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Runs once per vertex (and per instance for instanced draws).
    Vertex,
    /// Runs once per rasterized sample.
    Pixel,
}

impl ShaderStage {
    /// The suffix used in compiled bytecode file names (`VS` / `PS`).
    pub const fn file_suffix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VS",
            ShaderStage::Pixel => "PS",
        }
    }
}

/// A descriptor used to create a shader object from precompiled bytecode.
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The stage the bytecode was compiled for.
    pub stage: ShaderStage,
    /// The opaque compiled bytecode.
    pub bytecode: &'a [u8],
}
