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

//! Lifecycle of the shader library against a recording device.

use penumbra_core::renderer::api::*;
use penumbra_core::renderer::{
    CommandEncoder, GraphicsDevice, RenderError, RenderPass, ResourceError,
};
use penumbra_lanes::{
    FileBytecodeSource, InMemoryBytecodeSource, LifecycleState, ShaderLibrary, Technique,
};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// --- Mocks ---

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    CreateShader(usize),
    DestroyShader(usize),
    CreateLayout(usize),
    DestroyLayout(usize),
    Other,
}

#[derive(Debug, Default)]
struct RecordingDevice {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    creations: AtomicUsize,
    /// Zero-based index of the creation to reject.
    fail_at: Option<usize>,
}

impl RecordingDevice {
    fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn create(&self) -> Result<usize, ResourceError> {
        let index = self.creations.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(index) {
            return Err(ResourceError::BackendError {
                code: ResourceError::E_OUTOFMEMORY,
                message: "mock rejection".to_string(),
            });
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Ids created and not yet destroyed.
    fn live(&self) -> Vec<usize> {
        let mut live = Vec::new();
        for call in self.calls() {
            match call {
                Call::CreateShader(id) | Call::CreateLayout(id) => live.push(id),
                Call::DestroyShader(id) | Call::DestroyLayout(id) => {
                    let pos = live.iter().position(|&l| l == id).expect("double release");
                    live.remove(pos);
                }
                Call::Other => {}
            }
        }
        live
    }
}

struct MockRenderPass;

impl RenderPass for MockRenderPass {
    fn set_viewport(&mut self, _: &Viewport) {}
    fn set_input_layout(&mut self, _: InputLayoutId) {}
    fn set_vertex_shader(&mut self, _: ShaderModuleId) {}
    fn set_pixel_shader(&mut self, _: Option<ShaderModuleId>) {}
    fn set_constant_buffer(&mut self, _: ShaderStage, _: u32, _: BufferId, _: u64, _: u64) {}
    fn set_shader_resource(&mut self, _: ShaderStage, _: u32, _: Option<TextureViewId>) {}
    fn set_sampler(&mut self, _: ShaderStage, _: u32, _: SamplerId) {}
    fn set_vertex_buffer(&mut self, _: u32, _: BufferId, _: u64, _: u32) {}
    fn set_index_buffer(&mut self, _: BufferId, _: u64, _: IndexFormat) {}
    fn draw_indexed(&mut self, _: Range<u32>, _: i32, _: Range<u32>) {}
}

struct MockCommandEncoder;

impl CommandEncoder for MockCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        _descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        Box::new(MockRenderPass)
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        CommandBufferId(0)
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_shader_module(
        &self,
        _descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let id = self.create()?;
        self.record(Call::CreateShader(id));
        Ok(ShaderModuleId(id))
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.record(Call::DestroyShader(id.0));
        Ok(())
    }

    fn create_input_layout(
        &self,
        descriptor: &InputLayoutDescriptor,
    ) -> Result<InputLayoutId, ResourceError> {
        descriptor.layout.validate()?;
        let id = self.create()?;
        self.record(Call::CreateLayout(id));
        Ok(InputLayoutId(id))
    }

    fn destroy_input_layout(&self, id: InputLayoutId) -> Result<(), ResourceError> {
        self.record(Call::DestroyLayout(id.0));
        Ok(())
    }

    fn create_buffer(&self, _: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.record(Call::Other);
        Ok(BufferId(0))
    }

    fn create_buffer_with_data(
        &self,
        _: &BufferDescriptor,
        _: &[u8],
    ) -> Result<BufferId, ResourceError> {
        self.record(Call::Other);
        Ok(BufferId(0))
    }

    fn destroy_buffer(&self, _: BufferId) -> Result<(), ResourceError> {
        self.record(Call::Other);
        Ok(())
    }

    fn write_buffer(&self, _: BufferId, _: u64, _: &[u8]) -> Result<(), ResourceError> {
        self.record(Call::Other);
        Ok(())
    }

    fn create_texture(&self, _: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        self.record(Call::Other);
        Ok(TextureId(0))
    }

    fn destroy_texture(&self, _: TextureId) -> Result<(), ResourceError> {
        self.record(Call::Other);
        Ok(())
    }

    fn create_texture_view(
        &self,
        _: TextureId,
        _: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        self.record(Call::Other);
        Ok(TextureViewId(0))
    }

    fn destroy_texture_view(&self, _: TextureViewId) -> Result<(), ResourceError> {
        self.record(Call::Other);
        Ok(())
    }

    fn create_sampler(&self, _: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        self.record(Call::Other);
        Ok(SamplerId(0))
    }

    fn destroy_sampler(&self, _: SamplerId) -> Result<(), ResourceError> {
        self.record(Call::Other);
        Ok(())
    }

    fn create_command_encoder(&self, _: Option<&str>) -> Box<dyn CommandEncoder> {
        self.record(Call::Other);
        Box::new(MockCommandEncoder)
    }

    fn submit_command_buffer(&self, _: CommandBufferId) {
        self.record(Call::Other);
    }
}

fn library_on(device: &Arc<RecordingDevice>) -> ShaderLibrary {
    ShaderLibrary::new(device.clone())
}

// --- Tests ---

#[test]
fn test_get_before_and_after_init() {
    let device = Arc::new(RecordingDevice::default());
    let mut library = library_on(&device);

    assert!(matches!(
        library.get(Technique::ShadowMap),
        Err(RenderError::NotInitialized)
    ));

    library
        .init_all(&InMemoryBytecodeSource::with_placeholder_programs())
        .unwrap();
    assert_eq!(library.state(), LifecycleState::Initialized);

    let program = library.get(Technique::ShadowMap).unwrap();
    assert_eq!(program.technique, Technique::ShadowMap);
    assert_ne!(program.vertex_shader, program.pixel_shader);
    assert!(program.vertex_shader.0 > 0);
    assert!(program.input_layout.0 > 0);
    assert!(program.pixel_shader.0 > 0);

    // Three objects per technique.
    assert_eq!(device.live().len(), Technique::ALL.len() * 3);
    library.destroy_all().unwrap();
}

#[test]
fn test_init_then_destroy_leaves_nothing_reachable() {
    let device = Arc::new(RecordingDevice::default());
    let mut library = library_on(&device);
    library
        .init_all(&InMemoryBytecodeSource::with_placeholder_programs())
        .unwrap();
    library.destroy_all().unwrap();

    assert_eq!(library.state(), LifecycleState::Destroyed);
    for technique in Technique::ALL {
        assert!(matches!(
            library.get(technique),
            Err(RenderError::NotInitialized)
        ));
    }
    assert!(device.live().is_empty());
}

#[test]
fn test_destroy_before_init_makes_no_device_calls() {
    let device = Arc::new(RecordingDevice::default());
    let mut library = library_on(&device);

    assert!(matches!(
        library.destroy_all(),
        Err(RenderError::NotInitialized)
    ));
    assert!(device.calls().is_empty());
    assert_eq!(library.state(), LifecycleState::Uninitialized);
}

#[test]
fn test_double_destroy_releases_once() {
    let device = Arc::new(RecordingDevice::default());
    let mut library = library_on(&device);
    library
        .init_all(&InMemoryBytecodeSource::with_placeholder_programs())
        .unwrap();
    library.destroy_all().unwrap();
    let calls_after_first = device.calls().len();

    assert!(matches!(
        library.destroy_all(),
        Err(RenderError::NotInitialized)
    ));
    assert_eq!(device.calls().len(), calls_after_first);
    drop(library);
    assert_eq!(device.calls().len(), calls_after_first);
}

#[test]
fn test_no_reinitialization() {
    let device = Arc::new(RecordingDevice::default());
    let source = InMemoryBytecodeSource::with_placeholder_programs();
    let mut library = library_on(&device);
    library.init_all(&source).unwrap();
    assert!(matches!(
        library.init_all(&source),
        Err(RenderError::AlreadyInitialized)
    ));

    library.destroy_all().unwrap();
    assert!(matches!(
        library.init_all(&source),
        Err(RenderError::NotInitialized)
    ));
    assert!(device.live().is_empty());
}

#[test]
fn test_partial_failure_releases_created_subset() {
    // Shapes creates three objects; the fifth creation is the Floor vertex shader.
    let device = Arc::new(RecordingDevice::failing_at(4));
    let mut library = library_on(&device);

    let err = library
        .init_all(&InMemoryBytecodeSource::with_placeholder_programs())
        .unwrap_err();
    match &err {
        RenderError::ResourceCreationFailed { what, .. } => {
            assert_eq!(what, "Floor vertex shader");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.code(), Some(ResourceError::E_OUTOFMEMORY));
    assert_eq!(library.state(), LifecycleState::Uninitialized);

    let calls = device.calls();
    let created = calls
        .iter()
        .filter(|c| matches!(c, Call::CreateShader(_) | Call::CreateLayout(_)))
        .count();
    assert_eq!(created, 4);
    assert!(device.live().is_empty());
}

#[test]
fn test_missing_bytecode_is_a_creation_failure() {
    let device = Arc::new(RecordingDevice::default());
    let mut source = InMemoryBytecodeSource::with_placeholder_programs();
    source.remove(&Technique::FloorShadowMap.bytecode_path(ShaderStage::Pixel));

    let mut library = library_on(&device);
    let err = library.init_all(&source).unwrap_err();
    assert!(matches!(err, RenderError::ResourceCreationFailed { .. }));
    assert_eq!(err.code(), Some(ResourceError::E_FAIL));
    assert!(err.to_string().contains("FloorShadowMapPS.cso"));
    assert!(device.live().is_empty());
}

#[test]
fn test_drop_releases_initialized_library() {
    let device = Arc::new(RecordingDevice::default());
    {
        let mut library = library_on(&device);
        library
            .init_all(&InMemoryBytecodeSource::with_placeholder_programs())
            .unwrap();
        assert!(!device.live().is_empty());
    }
    assert!(device.live().is_empty());
}

#[test]
fn test_init_from_bytecode_files() {
    let root = std::env::temp_dir().join(format!(
        "penumbra_library_files_{}",
        std::process::id()
    ));
    let hlsl = root.join("HLSL");
    std::fs::create_dir_all(&hlsl).unwrap();
    for technique in Technique::ALL {
        for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
            let path = root.join(technique.bytecode_path(stage));
            std::fs::write(path, b"DXBC\x00\x01").unwrap();
        }
    }

    let device = Arc::new(RecordingDevice::default());
    let mut library = library_on(&device);
    library.init_all(&FileBytecodeSource::new(root.clone())).unwrap();
    assert!(library.get(Technique::Floor).is_ok());
    library.destroy_all().unwrap();

    std::fs::remove_dir_all(&root).unwrap();
}
