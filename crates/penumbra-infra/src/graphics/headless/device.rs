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

use super::command::{HeadlessCommandEncoder, PassRecord};
use penumbra_core::renderer::api::{
    BufferDescriptor, BufferId, BufferUsage, CommandBufferId, InputLayoutDescriptor,
    InputLayoutId, SamplerDescriptor, SamplerId, ShaderModuleDescriptor, ShaderModuleId,
    ShaderStage, TextureDescriptor, TextureFormat, TextureId, TextureUsage, TextureViewDescriptor,
    TextureViewId, TextureViewKind,
};
use penumbra_core::renderer::{CommandEncoder, GraphicsDevice, ResourceError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// The four-byte tag every compiled shader container starts with.
pub const DXBC_MAGIC: &[u8; 4] = b"DXBC";

const UNLIMITED: usize = usize::MAX;

#[derive(Debug)]
struct ShaderEntry {
    stage: ShaderStage,
    label: String,
}

#[derive(Debug)]
struct BufferEntry {
    data: Vec<u8>,
    usage: BufferUsage,
}

#[derive(Debug)]
struct TextureEntry {
    format: TextureFormat,
    usage: TextureUsage,
    views: usize,
}

#[derive(Debug)]
struct TextureViewEntry {
    texture: TextureId,
    kind: TextureViewKind,
}

/// Resource counts and submission totals of a [`HeadlessDevice`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Live shader objects.
    pub shaders: usize,
    /// Live input layouts.
    pub input_layouts: usize,
    /// Live buffers.
    pub buffers: usize,
    /// Live textures.
    pub textures: usize,
    /// Live texture views.
    pub texture_views: usize,
    /// Live samplers.
    pub samplers: usize,
    /// Command buffers submitted so far.
    pub submitted: u64,
    /// Render passes submitted so far.
    pub passes: u64,
    /// Draw calls submitted so far.
    pub draw_calls: u64,
}

impl DeviceStats {
    /// Total number of live device objects.
    pub fn live_objects(&self) -> usize {
        self.shaders
            + self.input_layouts
            + self.buffers
            + self.textures
            + self.texture_views
            + self.samplers
    }
}

/// State shared between the device and the encoders it hands out.
#[derive(Debug)]
pub(crate) struct HeadlessDeviceInternal {
    shaders: Mutex<HashMap<ShaderModuleId, ShaderEntry>>,
    input_layouts: Mutex<HashMap<InputLayoutId, String>>,
    buffers: Mutex<HashMap<BufferId, BufferEntry>>,
    textures: Mutex<HashMap<TextureId, TextureEntry>>,
    texture_views: Mutex<HashMap<TextureViewId, TextureViewEntry>>,
    samplers: Mutex<HashMap<SamplerId, String>>,
    pending: Mutex<HashMap<CommandBufferId, Vec<PassRecord>>>,
    submitted: Mutex<Vec<PassRecord>>,

    next_id: AtomicUsize,
    next_command_buffer: AtomicU64,
    submissions: AtomicU64,
    creation_budget: AtomicUsize,
    calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned registry only means a test panicked mid-call; the data is still usable.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn rejected(code: i32, message: impl Into<String>) -> ResourceError {
    ResourceError::BackendError {
        code,
        message: message.into(),
    }
}

fn label_of(label: &Option<std::borrow::Cow<'_, str>>) -> String {
    label.as_deref().unwrap_or("unlabeled").to_string()
}

impl HeadlessDeviceInternal {
    fn new() -> Self {
        Self {
            shaders: Mutex::new(HashMap::new()),
            input_layouts: Mutex::new(HashMap::new()),
            buffers: Mutex::new(HashMap::new()),
            textures: Mutex::new(HashMap::new()),
            texture_views: Mutex::new(HashMap::new()),
            samplers: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            next_command_buffer: AtomicU64::new(1),
            submissions: AtomicU64::new(0),
            creation_budget: AtomicUsize::new(UNLIMITED),
            calls: AtomicUsize::new(0),
        }
    }

    fn generate_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn generate_command_buffer_id(&self) -> CommandBufferId {
        CommandBufferId(self.next_command_buffer.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn store_command_buffer(&self, id: CommandBufferId, passes: Vec<PassRecord>) {
        lock(&self.pending).insert(id, passes);
    }

    fn called(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Consumes one unit of the creation budget.
    fn charge(&self, what: &str) -> Result<(), ResourceError> {
        let charged = self
            .creation_budget
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| match left {
                UNLIMITED => Some(UNLIMITED),
                0 => None,
                n => Some(n - 1),
            });
        charged.map(|_| ()).map_err(|_| {
            log::debug!("HeadlessDevice: creation budget exhausted at {what}");
            rejected(ResourceError::E_OUTOFMEMORY, format!("out of memory creating {what}"))
        })
    }

    fn check_bytecode(bytecode: &[u8], what: &str) -> Result<(), ResourceError> {
        if bytecode.is_empty() {
            return Err(rejected(
                ResourceError::E_INVALIDARG,
                format!("{what}: empty bytecode"),
            ));
        }
        if !bytecode.starts_with(DXBC_MAGIC) {
            return Err(rejected(
                ResourceError::E_INVALIDARG,
                format!("{what}: bytecode is not a compiled shader container"),
            ));
        }
        Ok(())
    }
}

/// A device that keeps every object in host memory.
///
/// It enforces the rules a driver would: shader bytecode must be a compiled
/// container, input layouts must be well formed, views must match their
/// texture's usage and format, writes must stay in bounds, and textures cannot
/// be destroyed while views of them are alive. Submitted passes are kept for
/// inspection.
///
/// A creation budget can be set to make the N+1th creation fail with an
/// out-of-memory code.
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    internal: Arc<HeadlessDeviceInternal>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates a device with an unlimited creation budget.
    pub fn new() -> Self {
        log::info!("HeadlessDevice: created");
        Self {
            internal: Arc::new(HeadlessDeviceInternal::new()),
        }
    }

    /// Creates a device that accepts `budget` creations and rejects the rest.
    pub fn with_creation_budget(budget: usize) -> Self {
        let device = Self::new();
        device.set_creation_budget(Some(budget));
        device
    }

    /// Sets how many more creations succeed. `None` removes the limit.
    pub fn set_creation_budget(&self, budget: Option<usize>) {
        let value = budget.map_or(UNLIMITED, |b| b.min(UNLIMITED - 1));
        self.internal.creation_budget.store(value, Ordering::Release);
    }

    /// Current object counts and submission totals.
    pub fn stats(&self) -> DeviceStats {
        let internal = &self.internal;
        let submitted = lock(&internal.submitted);
        DeviceStats {
            shaders: lock(&internal.shaders).len(),
            input_layouts: lock(&internal.input_layouts).len(),
            buffers: lock(&internal.buffers).len(),
            textures: lock(&internal.textures).len(),
            texture_views: lock(&internal.texture_views).len(),
            samplers: lock(&internal.samplers).len(),
            submitted: internal.submissions.load(Ordering::Relaxed),
            passes: submitted.len() as u64,
            draw_calls: submitted.iter().map(|p| p.draw_count() as u64).sum(),
        }
    }

    /// Number of live device objects.
    pub fn live_object_count(&self) -> usize {
        self.stats().live_objects()
    }

    /// Number of calls made through the [`GraphicsDevice`] interface.
    pub fn call_count(&self) -> usize {
        self.internal.calls.load(Ordering::Relaxed)
    }

    /// Every pass submitted so far, in submission order.
    pub fn submitted_passes(&self) -> Vec<PassRecord> {
        lock(&self.internal.submitted).clone()
    }

    /// Drops the submitted pass history.
    pub fn clear_submitted(&self) {
        lock(&self.internal.submitted).clear();
    }

    /// Reads back the contents of a buffer.
    pub fn read_buffer(&self, id: BufferId) -> Option<Vec<u8>> {
        lock(&self.internal.buffers).get(&id).map(|b| b.data.clone())
    }

    /// The label a shader object was created with.
    pub fn shader_label(&self, id: ShaderModuleId) -> Option<String> {
        lock(&self.internal.shaders).get(&id).map(|s| s.label.clone())
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let internal = &self.internal;
        internal.called();
        let label = label_of(&descriptor.label);
        HeadlessDeviceInternal::check_bytecode(descriptor.bytecode, &label)?;
        internal.charge(&label)?;

        let id = ShaderModuleId(internal.generate_id());
        log::debug!(
            "HeadlessDevice: created {:?} shader '{}' as {:?}",
            descriptor.stage,
            label,
            id
        );
        lock(&internal.shaders).insert(
            id,
            ShaderEntry {
                stage: descriptor.stage,
                label,
            },
        );
        Ok(id)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.internal.called();
        match lock(&self.internal.shaders).remove(&id) {
            Some(entry) => {
                log::trace!("HeadlessDevice: destroyed {:?} shader '{}'", entry.stage, entry.label);
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    fn create_input_layout(
        &self,
        descriptor: &InputLayoutDescriptor,
    ) -> Result<InputLayoutId, ResourceError> {
        let internal = &self.internal;
        internal.called();
        let label = label_of(&descriptor.label);
        descriptor
            .layout
            .validate()
            .map_err(|e| rejected(ResourceError::E_INVALIDARG, format!("{label}: {e}")))?;
        HeadlessDeviceInternal::check_bytecode(descriptor.vertex_bytecode, &label)?;
        internal.charge(&label)?;

        let id = InputLayoutId(internal.generate_id());
        log::debug!(
            "HeadlessDevice: created input layout '{}' ({} elements) as {:?}",
            descriptor.layout.name,
            descriptor.layout.elements.len(),
            id
        );
        lock(&internal.input_layouts).insert(id, label);
        Ok(id)
    }

    fn destroy_input_layout(&self, id: InputLayoutId) -> Result<(), ResourceError> {
        self.internal.called();
        lock(&self.internal.input_layouts)
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.create_buffer_with_data(descriptor, &[])
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let internal = &self.internal;
        internal.called();
        let label = label_of(&descriptor.label);
        if descriptor.size == 0 || descriptor.usage.is_empty() {
            return Err(rejected(
                ResourceError::E_INVALIDARG,
                format!("{label}: buffers need a size and a usage"),
            ));
        }
        if data.len() as u64 > descriptor.size {
            return Err(ResourceError::OutOfBounds);
        }
        internal.charge(&label)?;

        let mut contents = vec![0u8; descriptor.size as usize];
        contents[..data.len()].copy_from_slice(data);

        let id = BufferId(internal.generate_id());
        log::trace!("HeadlessDevice: created buffer '{}' ({} bytes)", label, descriptor.size);
        lock(&internal.buffers).insert(
            id,
            BufferEntry {
                data: contents,
                usage: descriptor.usage,
            },
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.internal.called();
        lock(&self.internal.buffers)
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.internal.called();
        let mut buffers = lock(&self.internal.buffers);
        let entry = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        if !entry.usage.contains(BufferUsage::COPY_DST) {
            return Err(rejected(
                ResourceError::E_INVALIDARG,
                "buffer was not created with COPY_DST usage",
            ));
        }
        let start = usize::try_from(offset).map_err(|_| ResourceError::OutOfBounds)?;
        let end = start
            .checked_add(data.len())
            .filter(|&end| end <= entry.data.len())
            .ok_or(ResourceError::OutOfBounds)?;
        entry.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let internal = &self.internal;
        internal.called();
        let label = label_of(&descriptor.label);
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(rejected(
                ResourceError::E_INVALIDARG,
                format!("{label}: zero-sized texture"),
            ));
        }
        if descriptor.usage.contains(TextureUsage::DEPTH_STENCIL) && !descriptor.format.is_depth() {
            return Err(rejected(
                ResourceError::E_INVALIDARG,
                format!("{label}: depth usage needs a depth format"),
            ));
        }
        internal.charge(&label)?;

        let id = TextureId(internal.generate_id());
        log::debug!(
            "HeadlessDevice: created texture '{}' {}x{} {:?}",
            label,
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        lock(&internal.textures).insert(
            id,
            TextureEntry {
                format: descriptor.format,
                usage: descriptor.usage,
                views: 0,
            },
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.internal.called();
        let mut textures = lock(&self.internal.textures);
        let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
        if entry.views > 0 {
            return Err(rejected(
                ResourceError::E_INVALIDARG,
                format!("texture {:?} still has {} live views", id, entry.views),
            ));
        }
        textures.remove(&id);
        Ok(())
    }

    fn create_texture_view(
        &self,
        texture_id: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let internal = &self.internal;
        internal.called();
        let label = label_of(&descriptor.label);
        let mut textures = lock(&internal.textures);
        let texture = textures.get_mut(&texture_id).ok_or(ResourceError::InvalidHandle)?;

        if !texture.usage.contains(descriptor.kind.required_usage()) {
            return Err(rejected(
                ResourceError::E_INVALIDARG,
                format!("{label}: texture lacks usage for a {:?} view", descriptor.kind),
            ));
        }
        if !texture.format.is_view_compatible(descriptor.format) {
            return Err(rejected(
                ResourceError::E_INVALIDARG,
                format!(
                    "{label}: {:?} cannot be viewed as {:?}",
                    texture.format, descriptor.format
                ),
            ));
        }
        internal.charge(&label)?;

        texture.views += 1;
        let id = TextureViewId(internal.generate_id());
        lock(&internal.texture_views).insert(
            id,
            TextureViewEntry {
                texture: texture_id,
                kind: descriptor.kind,
            },
        );
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        self.internal.called();
        let entry = lock(&self.internal.texture_views)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        if let Some(texture) = lock(&self.internal.textures).get_mut(&entry.texture) {
            texture.views = texture.views.saturating_sub(1);
        }
        log::trace!("HeadlessDevice: destroyed {:?} view {:?}", entry.kind, id);
        Ok(())
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let internal = &self.internal;
        internal.called();
        let label = label_of(&descriptor.label);
        internal.charge(&label)?;
        let id = SamplerId(internal.generate_id());
        lock(&internal.samplers).insert(id, label);
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.internal.called();
        lock(&self.internal.samplers)
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        self.internal.called();
        Box::new(HeadlessCommandEncoder::new(
            self.internal.clone(),
            label.map(str::to_string),
        ))
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) {
        let internal = &self.internal;
        internal.called();
        let Some(passes) = lock(&internal.pending).remove(&command_buffer) else {
            log::warn!("HeadlessDevice: unknown command buffer {command_buffer:?} submitted");
            return;
        };
        internal.submissions.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "HeadlessDevice: submitted {:?} with {} passes",
            command_buffer,
            passes.len()
        );
        lock(&internal.submitted).extend(passes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn shader(bytecode: &[u8]) -> ShaderModuleDescriptor<'_> {
        ShaderModuleDescriptor {
            label: Some(Cow::Borrowed("test")),
            stage: ShaderStage::Vertex,
            bytecode,
        }
    }

    #[test]
    fn test_rejects_non_container_bytecode() {
        let device = HeadlessDevice::new();
        let err = device.create_shader_module(&shader(b"hello")).unwrap_err();
        assert_eq!(err.code(), ResourceError::E_INVALIDARG);
        let err = device.create_shader_module(&shader(&[])).unwrap_err();
        assert_eq!(err.code(), ResourceError::E_INVALIDARG);
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_creation_budget() {
        let device = HeadlessDevice::with_creation_budget(1);
        let id = device.create_shader_module(&shader(b"DXBC1")).unwrap();
        let err = device.create_shader_module(&shader(b"DXBC2")).unwrap_err();
        assert_eq!(err.code(), ResourceError::E_OUTOFMEMORY);
        device.destroy_shader_module(id).unwrap();
        assert!(device.destroy_shader_module(id).is_err());
    }

    #[test]
    fn test_write_buffer_bounds() {
        let device = HeadlessDevice::new();
        let buffer = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 8,
                usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
            })
            .unwrap();
        device.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(device.read_buffer(buffer).unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(matches!(
            device.write_buffer(buffer, 6, &[0; 4]),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn test_texture_with_live_view_cannot_be_destroyed() {
        let device = HeadlessDevice::new();
        let texture = device
            .create_texture(&TextureDescriptor {
                label: None,
                width: 4,
                height: 4,
                format: TextureFormat::Depth32Float,
                usage: TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
            })
            .unwrap();
        let view = device
            .create_texture_view(
                texture,
                &TextureViewDescriptor {
                    label: None,
                    kind: TextureViewKind::ShaderResource,
                    format: TextureFormat::R32Float,
                },
            )
            .unwrap();
        assert!(device.destroy_texture(texture).is_err());
        device.destroy_texture_view(view).unwrap();
        device.destroy_texture(texture).unwrap();
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_view_needs_matching_usage() {
        let device = HeadlessDevice::new();
        let texture = device
            .create_texture(&TextureDescriptor {
                label: None,
                width: 4,
                height: 4,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsage::SHADER_RESOURCE,
            })
            .unwrap();
        let err = device
            .create_texture_view(
                texture,
                &TextureViewDescriptor {
                    label: None,
                    kind: TextureViewKind::RenderTarget,
                    format: TextureFormat::Rgba8Unorm,
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), ResourceError::E_INVALIDARG);
    }
}
