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

//! A device session owning the shader library and the shadow lane.

use super::bytecode::BytecodeSource;
use super::shader_library::ShaderLibrary;
use super::shadow_pass_lane::{FrameInputs, FrameStats, ShadowPassLane};
use crate::config::ShadowSettings;
use penumbra_core::renderer::{GraphicsDevice, RenderError};
use std::sync::Arc;

/// Everything the two-pass technique needs, bound to one device.
///
/// Construction creates every device object; [`shutdown`](Self::shutdown) or
/// dropping the session releases them. A failed construction releases whatever
/// it created before returning.
#[derive(Debug)]
pub struct ShadowPipeline {
    device: Arc<dyn GraphicsDevice>,
    library: ShaderLibrary,
    lane: ShadowPassLane,
}

impl ShadowPipeline {
    /// Creates the shader programs and the shadow lane resources.
    ///
    /// # Errors
    /// The first creation failure. The caller should abort startup.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        settings: &ShadowSettings,
        source: &dyn BytecodeSource,
    ) -> Result<Self, RenderError> {
        let mut library = ShaderLibrary::new(device.clone());
        library.init_all(source)?;

        let mut lane = ShadowPassLane::new(settings);
        // `library` releases its programs when dropped on this path.
        lane.on_gpu_init(device.as_ref())?;

        Ok(Self {
            device,
            library,
            lane,
        })
    }

    /// The device this session is bound to.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The shader library.
    pub fn library(&self) -> &ShaderLibrary {
        &self.library
    }

    /// The shadow lane.
    pub fn lane(&self) -> &ShadowPassLane {
        &self.lane
    }

    /// Renders one frame.
    pub fn render_frame(&mut self, inputs: &FrameInputs<'_>) -> Result<FrameStats, RenderError> {
        self.lane
            .render_frame(self.device.as_ref(), &self.library, inputs)
    }

    /// Releases every device object of the session.
    ///
    /// # Errors
    /// Propagates a lifecycle error from the shader library.
    pub fn shutdown(mut self) -> Result<(), RenderError> {
        self.lane.on_gpu_shutdown(self.device.as_ref());
        self.library.destroy_all()
    }
}

impl Drop for ShadowPipeline {
    fn drop(&mut self) {
        // Idempotent: both are no-ops after `shutdown`.
        self.lane.on_gpu_shutdown(self.device.as_ref());
    }
}
