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

//! Defines the hierarchy of error types for the rendering subsystem.
//!
//! Device-level failures carry the numeric code reported by the device so that a
//! fatal startup error can be logged with the exact rejection reason.

use crate::renderer::api::shader::ShaderModuleId;
use std::fmt;

/// An error related to loading compiled shader bytecode or creating a shader module.
#[derive(Debug)]
pub enum ShaderError {
    /// An error occurred while trying to load the bytecode from a path.
    LoadError {
        /// The path of the file that failed to load.
        path: String,
        /// The underlying I/O error, rendered as text.
        source_error: String,
    },
    /// The bytecode blob was found but contained no bytes.
    EmptyBytecode {
        /// The path the empty blob was read from.
        path: String,
    },
    /// The requested shader module could not be found.
    NotFound {
        /// The ID of the shader module that was not found.
        id: ShaderModuleId,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::LoadError { path, source_error } => {
                write!(f, "Failed to load shader bytecode from '{path}': {source_error}")
            }
            ShaderError::EmptyBytecode { path } => {
                write!(f, "Shader bytecode at '{path}' is empty")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Shader module not found for ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a device object.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// A creation descriptor was structurally invalid.
    InvalidDescriptor(String),
    /// The device rejected the request with a backend-specific code.
    BackendError {
        /// The raw result code returned by the device.
        code: i32,
        /// A human readable description of the failure.
        message: String,
    },
    /// An attempt was made to access a resource out of its bounds (e.g., in a buffer).
    OutOfBounds,
}

impl ResourceError {
    /// Generic invalid-argument result code.
    pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
    /// Out-of-memory result code.
    pub const E_OUTOFMEMORY: i32 = 0x8007_000E_u32 as i32;
    /// Generic failure result code, used for I/O failures before the device is reached.
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;

    /// Returns the device result code associated with this error.
    pub fn code(&self) -> i32 {
        match self {
            ResourceError::BackendError { code, .. } => *code,
            ResourceError::InvalidDescriptor(_) | ResourceError::OutOfBounds => {
                Self::E_INVALIDARG
            }
            ResourceError::Shader(_) | ResourceError::NotFound | ResourceError::InvalidHandle => {
                Self::E_FAIL
            }
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::InvalidDescriptor(msg) => {
                write!(f, "Invalid resource descriptor: {msg}")
            }
            ResourceError::BackendError { code, message } => {
                write!(f, "Device rejected the request (0x{:08X}): {message}", *code as u32)
            }
            ResourceError::OutOfBounds => {
                write!(f, "Resource access out of bounds.")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

/// A high-level error raised by the shadow-mapping pipeline.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before initialization or after destruction.
    NotInitialized,
    /// Initialization was requested on something already initialized.
    AlreadyInitialized,
    /// A vertex layout name outside the known set was requested.
    UnknownFormat(String),
    /// The device refused to create an object the pipeline depends on.
    ResourceCreationFailed {
        /// What was being created, e.g. `"ShadowMap vertex shader"`.
        what: String,
        /// The underlying device error.
        source: ResourceError,
    },
    /// An instanced technique was asked to draw without a transform stream.
    MissingInstanceStream {
        /// The technique whose draw was rejected.
        technique: String,
    },
    /// An error occurred while using an already created resource.
    ResourceError(ResourceError),
    /// A request was inconsistent with the current pipeline state.
    InvalidState(String),
}

impl RenderError {
    /// Returns the device result code if this error originated on the device.
    pub fn code(&self) -> Option<i32> {
        match self {
            RenderError::ResourceCreationFailed { source, .. } => Some(source.code()),
            RenderError::ResourceError(err) => Some(err.code()),
            _ => None,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The rendering pipeline is not initialized.")
            }
            RenderError::AlreadyInitialized => {
                write!(f, "The rendering pipeline is already initialized.")
            }
            RenderError::UnknownFormat(name) => {
                write!(f, "Unknown vertex layout format '{name}'")
            }
            RenderError::ResourceCreationFailed { what, source } => {
                write!(f, "Failed to create {what}: {source}")
            }
            RenderError::MissingInstanceStream { technique } => {
                write!(f, "Technique '{technique}' requires an instance transform stream")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::InvalidState(msg) => {
                write!(f, "Invalid render state: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceCreationFailed { source, .. } => Some(source),
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_shader_error_display() {
        let err = ShaderError::LoadError {
            path: "HLSL/ShapesVS.cso".to_string(),
            source_error: "File not found".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Failed to load shader bytecode from 'HLSL/ShapesVS.cso': File not found"
        );
    }

    #[test]
    fn test_backend_error_display_and_code() {
        let err = ResourceError::BackendError {
            code: ResourceError::E_OUTOFMEMORY,
            message: "no memory".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Device rejected the request (0x8007000E): no memory"
        );
        assert_eq!(err.code(), ResourceError::E_OUTOFMEMORY);
    }

    #[test]
    fn test_creation_failure_exposes_code_and_source() {
        let err = RenderError::ResourceCreationFailed {
            what: "Floor input layout".to_string(),
            source: ResourceError::InvalidDescriptor("overlap".to_string()),
        };
        assert_eq!(err.code(), Some(ResourceError::E_INVALIDARG));
        assert!(err.source().is_some());
        assert_eq!(RenderError::NotInitialized.code(), None);
    }

    #[test]
    fn test_resource_error_wraps_shader_error() {
        let res_err: ResourceError = ShaderError::NotFound {
            id: ShaderModuleId(7),
        }
        .into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Shader module not found for ID: ShaderModuleId(7)"
        );
        assert!(res_err.source().is_some());
    }
}
