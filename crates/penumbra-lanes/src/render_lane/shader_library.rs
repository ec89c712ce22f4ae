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

//! The shader and input-layout lifecycle.
//!
//! A [`ShaderLibrary`] is an explicitly constructed context object bound to one
//! device session. It moves through `Uninitialized -> Initialized -> Destroyed`
//! exactly once. Objects are released exactly once: by `destroy_all`, by the
//! partial-failure path of `init_all`, or by `Drop` if neither ran.

use super::bytecode::BytecodeSource;
use super::technique::Technique;
use super::vertex_layouts::describe_layout;
use ahash::AHashMap;
use penumbra_core::renderer::api::{
    InputLayoutDescriptor, InputLayoutId, ShaderModuleDescriptor, ShaderModuleId, ShaderStage,
};
use penumbra_core::renderer::{GraphicsDevice, RenderError, ResourceError};
use std::borrow::Cow;
use std::sync::Arc;

/// The handles making up one technique. Borrowed from the library, never owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderProgramSet {
    /// The technique these handles implement.
    pub technique: Technique,
    /// The vertex-stage shader object.
    pub vertex_shader: ShaderModuleId,
    /// The input layout matching the vertex shader's input signature.
    pub input_layout: InputLayoutId,
    /// The pixel-stage shader object.
    pub pixel_shader: ShaderModuleId,
}

/// Where a [`ShaderLibrary`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, nothing created yet.
    Uninitialized,
    /// Every technique is alive.
    Initialized,
    /// Every object has been released. Terminal.
    Destroyed,
}

#[derive(Debug)]
enum LibraryState {
    Uninitialized,
    Initialized(AHashMap<Technique, ShaderProgramSet>),
    Destroyed,
}

/// Tracks objects created during `init_all` and releases them unless committed.
struct PendingObjects<'d> {
    device: &'d dyn GraphicsDevice,
    programs: Vec<ShaderProgramSet>,
    shaders: Vec<ShaderModuleId>,
    layouts: Vec<InputLayoutId>,
}

impl<'d> PendingObjects<'d> {
    fn new(device: &'d dyn GraphicsDevice) -> Self {
        Self {
            device,
            programs: Vec::with_capacity(Technique::ALL.len()),
            shaders: Vec::new(),
            layouts: Vec::new(),
        }
    }

    fn commit(mut self) -> AHashMap<Technique, ShaderProgramSet> {
        self.shaders.clear();
        self.layouts.clear();
        self.programs.drain(..).map(|p| (p.technique, p)).collect()
    }
}

impl Drop for PendingObjects<'_> {
    fn drop(&mut self) {
        if self.shaders.is_empty() && self.layouts.is_empty() {
            return;
        }
        log::warn!(
            "ShaderLibrary: releasing {} shader(s) and {} input layout(s) from a failed initialization",
            self.shaders.len(),
            self.layouts.len()
        );
        for layout in self.layouts.drain(..).rev() {
            if let Err(e) = self.device.destroy_input_layout(layout) {
                log::warn!("ShaderLibrary: Failed to destroy input layout {layout:?}: {e}");
            }
        }
        for shader in self.shaders.drain(..).rev() {
            if let Err(e) = self.device.destroy_shader_module(shader) {
                log::warn!("ShaderLibrary: Failed to destroy shader {shader:?}: {e}");
            }
        }
    }
}

fn creation_failed(technique: Technique, what: &str, source: ResourceError) -> RenderError {
    RenderError::ResourceCreationFailed {
        what: format!("{technique} {what}"),
        source,
    }
}

/// Owns the compiled shader objects and input layouts for every [`Technique`].
#[derive(Debug)]
pub struct ShaderLibrary {
    device: Arc<dyn GraphicsDevice>,
    state: LibraryState,
}

impl ShaderLibrary {
    /// Creates an uninitialized library bound to `device`.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            state: LibraryState::Uninitialized,
        }
    }

    /// The device this library creates objects on.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        match self.state {
            LibraryState::Uninitialized => LifecycleState::Uninitialized,
            LibraryState::Initialized(_) => LifecycleState::Initialized,
            LibraryState::Destroyed => LifecycleState::Destroyed,
        }
    }

    /// Creates the shader objects and input layout of every technique.
    ///
    /// For each technique: load the vertex bytecode, resolve the vertex layout,
    /// create the input layout against that bytecode, create the vertex shader,
    /// then load and create the pixel shader. If any step fails, every object
    /// created so far is released and the library stays `Uninitialized`.
    ///
    /// # Errors
    /// * [`RenderError::ResourceCreationFailed`] if bytecode is unreadable or the
    ///   device rejects a creation.
    /// * [`RenderError::AlreadyInitialized`] / [`RenderError::NotInitialized`] if
    ///   the library is not `Uninitialized`.
    pub fn init_all(&mut self, source: &dyn BytecodeSource) -> Result<(), RenderError> {
        match self.state {
            LibraryState::Uninitialized => {}
            LibraryState::Initialized(_) => return Err(RenderError::AlreadyInitialized),
            LibraryState::Destroyed => return Err(RenderError::NotInitialized),
        }

        let device = self.device.as_ref();
        let mut pending = PendingObjects::new(device);

        for technique in Technique::ALL {
            let vs_path = technique.bytecode_path(ShaderStage::Vertex);
            let vs_bytecode = source
                .load(&vs_path)
                .map_err(|e| creation_failed(technique, "vertex bytecode", e.into()))?;

            let layout = describe_layout(technique.vertex_layout());
            let input_layout = device
                .create_input_layout(&InputLayoutDescriptor {
                    label: Some(Cow::Owned(format!("{technique} input layout"))),
                    layout: &layout,
                    vertex_bytecode: &vs_bytecode,
                })
                .map_err(|e| creation_failed(technique, "input layout", e))?;
            pending.layouts.push(input_layout);

            let vertex_shader = device
                .create_shader_module(&ShaderModuleDescriptor {
                    label: Some(Cow::Owned(format!("{technique} vertex shader"))),
                    stage: ShaderStage::Vertex,
                    bytecode: &vs_bytecode,
                })
                .map_err(|e| creation_failed(technique, "vertex shader", e))?;
            pending.shaders.push(vertex_shader);

            let ps_path = technique.bytecode_path(ShaderStage::Pixel);
            let ps_bytecode = source
                .load(&ps_path)
                .map_err(|e| creation_failed(technique, "pixel bytecode", e.into()))?;
            let pixel_shader = device
                .create_shader_module(&ShaderModuleDescriptor {
                    label: Some(Cow::Owned(format!("{technique} pixel shader"))),
                    stage: ShaderStage::Pixel,
                    bytecode: &ps_bytecode,
                })
                .map_err(|e| creation_failed(technique, "pixel shader", e))?;
            pending.shaders.push(pixel_shader);

            log::debug!(
                "ShaderLibrary: {technique} ready (layout '{}', {} attributes)",
                layout.name,
                layout.elements.len()
            );
            pending.programs.push(ShaderProgramSet {
                technique,
                vertex_shader,
                input_layout,
                pixel_shader,
            });
        }

        let programs = pending.commit();
        log::info!("ShaderLibrary: initialized {} techniques", programs.len());
        self.state = LibraryState::Initialized(programs);
        Ok(())
    }

    /// Releases every shader object and input layout exactly once.
    ///
    /// # Errors
    /// [`RenderError::NotInitialized`] if called before `init_all` or a second
    /// time. No device call is made in that case.
    pub fn destroy_all(&mut self) -> Result<(), RenderError> {
        match std::mem::replace(&mut self.state, LibraryState::Destroyed) {
            LibraryState::Initialized(programs) => {
                self.release(programs);
                log::info!("ShaderLibrary: destroyed");
                Ok(())
            }
            previous => {
                self.state = previous;
                Err(RenderError::NotInitialized)
            }
        }
    }

    /// Returns the handle triple for `technique`.
    ///
    /// # Errors
    /// [`RenderError::NotInitialized`] unless the library is `Initialized`.
    pub fn get(&self, technique: Technique) -> Result<ShaderProgramSet, RenderError> {
        match &self.state {
            LibraryState::Initialized(programs) => programs
                .get(&technique)
                .copied()
                .ok_or(RenderError::NotInitialized),
            _ => Err(RenderError::NotInitialized),
        }
    }

    fn release(&self, mut programs: AHashMap<Technique, ShaderProgramSet>) {
        for technique in Technique::ALL {
            let Some(program) = programs.remove(&technique) else {
                continue;
            };
            if let Err(e) = self.device.destroy_input_layout(program.input_layout) {
                log::warn!("ShaderLibrary: Failed to destroy {technique} input layout: {e}");
            }
            if let Err(e) = self.device.destroy_shader_module(program.vertex_shader) {
                log::warn!("ShaderLibrary: Failed to destroy {technique} vertex shader: {e}");
            }
            if let Err(e) = self.device.destroy_shader_module(program.pixel_shader) {
                log::warn!("ShaderLibrary: Failed to destroy {technique} pixel shader: {e}");
            }
        }
    }
}

impl Drop for ShaderLibrary {
    fn drop(&mut self) {
        if let LibraryState::Initialized(programs) =
            std::mem::replace(&mut self.state, LibraryState::Destroyed)
        {
            log::debug!("ShaderLibrary: releasing techniques on drop");
            self.release(programs);
        }
    }
}
