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

//! Sources of compiled shader bytecode.

use super::technique::Technique;
use ahash::AHashMap;
use penumbra_core::renderer::api::ShaderStage;
use penumbra_core::renderer::ShaderError;
use std::path::{Path, PathBuf};

/// Something that can hand out compiled shader bytecode by relative path.
///
/// Blobs are opaque: they are loaded whole and passed to the device untouched.
pub trait BytecodeSource: Send + Sync {
    /// Loads the whole blob stored at `path`.
    ///
    /// # Errors
    /// [`ShaderError::LoadError`] if the blob cannot be read and
    /// [`ShaderError::EmptyBytecode`] if it contains no bytes.
    fn load(&self, path: &str) -> Result<Vec<u8>, ShaderError>;
}

/// Reads bytecode files from beneath a root directory.
#[derive(Debug, Clone)]
pub struct FileBytecodeSource {
    root: PathBuf,
}

impl FileBytecodeSource {
    /// Creates a source rooted at `root`; `HLSL/ShapesVS.cso` resolves to `root/HLSL/ShapesVS.cso`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BytecodeSource for FileBytecodeSource {
    fn load(&self, path: &str) -> Result<Vec<u8>, ShaderError> {
        let full_path = self.root.join(path);
        let bytes = std::fs::read(&full_path).map_err(|e| ShaderError::LoadError {
            path: full_path.display().to_string(),
            source_error: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(ShaderError::EmptyBytecode {
                path: full_path.display().to_string(),
            });
        }
        log::debug!("Loaded {} bytes of bytecode from {}", bytes.len(), full_path.display());
        Ok(bytes)
    }
}

/// Serves bytecode from memory. Used by tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBytecodeSource {
    blobs: AHashMap<String, Vec<u8>>,
}

impl InMemoryBytecodeSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source holding a placeholder blob for every technique and stage.
    ///
    /// Each blob starts with the `DXBC` container tag followed by the blob's path,
    /// which is enough for devices that do not execute shaders.
    pub fn with_placeholder_programs() -> Self {
        let mut source = Self::new();
        for technique in Technique::ALL {
            for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
                let path = technique.bytecode_path(stage);
                let mut blob = b"DXBC".to_vec();
                blob.extend_from_slice(path.as_bytes());
                source.insert(path, blob);
            }
        }
        source
    }

    /// Stores `bytes` under `path`, replacing any previous blob.
    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.insert(path.into(), bytes);
    }

    /// Removes the blob at `path`, returning it if present.
    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.blobs.remove(path)
    }
}

impl BytecodeSource for InMemoryBytecodeSource {
    fn load(&self, path: &str) -> Result<Vec<u8>, ShaderError> {
        match self.blobs.get(path) {
            Some(bytes) if bytes.is_empty() => Err(ShaderError::EmptyBytecode {
                path: path.to_string(),
            }),
            Some(bytes) => Ok(bytes.clone()),
            None => Err(ShaderError::LoadError {
                path: path.to_string(),
                source_error: "no such blob".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("penumbra-{name}-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("HLSL")).unwrap();
        dir
    }

    #[test]
    fn test_file_source_reads_whole_file() {
        let dir = scratch_dir("bytecode-read");
        std::fs::write(dir.join("HLSL/ShapesVS.cso"), b"DXBC1234").unwrap();
        let source = FileBytecodeSource::new(dir.clone());
        assert_eq!(source.load("HLSL/ShapesVS.cso").unwrap(), b"DXBC1234");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_file_source_missing_and_empty() {
        let dir = scratch_dir("bytecode-missing");
        std::fs::write(dir.join("HLSL/FloorPS.cso"), b"").unwrap();
        let source = FileBytecodeSource::new(dir.clone());
        assert!(matches!(
            source.load("HLSL/FloorVS.cso"),
            Err(ShaderError::LoadError { .. })
        ));
        assert!(matches!(
            source.load("HLSL/FloorPS.cso"),
            Err(ShaderError::EmptyBytecode { .. })
        ));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_placeholder_programs_cover_every_technique() {
        let source = InMemoryBytecodeSource::with_placeholder_programs();
        for technique in Technique::ALL {
            for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
                let blob = source.load(&technique.bytecode_path(stage)).unwrap();
                assert!(blob.starts_with(b"DXBC"));
            }
        }
    }
}
