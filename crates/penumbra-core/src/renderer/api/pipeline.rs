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

//! Input layout descriptors: how vertex and instance buffer bytes feed shader inputs.

use crate::renderer::error::ResourceError;
use std::borrow::Cow;

/// An opaque handle to an input layout object created on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputLayoutId(pub usize);

/// The data format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// One 32-bit float component.
    Float32,
    /// Two 32-bit float components.
    Float32x2,
    /// Three 32-bit float components.
    Float32x3,
    /// Four 32-bit float components.
    Float32x4,
}

impl VertexFormat {
    /// Returns the size of the format in bytes.
    pub const fn size(&self) -> usize {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// Whether an attribute advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputStepMode {
    /// The attribute advances once per vertex.
    Vertex,
    /// The attribute advances once per `step_rate` instances.
    Instance,
}

/// The buffer slot that carries per-vertex data.
pub const VERTEX_SLOT: u32 = 0;
/// The buffer slot that carries per-instance data.
pub const INSTANCE_SLOT: u32 = 1;

/// A single attribute slot of a vertex layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputElementDescriptor {
    /// The shader semantic the attribute binds to, e.g. `POSITION`.
    pub semantic_name: Cow<'static, str>,
    /// Distinguishes attributes sharing a semantic, e.g. the four `WORLD` rows.
    pub semantic_index: u32,
    /// The attribute's data format.
    pub format: VertexFormat,
    /// The vertex buffer slot this attribute is read from.
    pub input_slot: u32,
    /// Byte offset of the attribute inside one element of its slot.
    pub byte_offset: u32,
    /// Whether the attribute advances per vertex or per instance.
    pub step_mode: InputStepMode,
    /// Instances drawn per advance. Always 0 for per-vertex attributes.
    pub step_rate: u32,
}

impl InputElementDescriptor {
    /// End of the attribute's byte range inside its slot.
    pub const fn byte_end(&self) -> u32 {
        self.byte_offset + self.format.size() as u32
    }
}

/// An ordered list of attribute slots describing one vertex format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayoutDescriptor {
    /// A short name for logs, e.g. `shape`.
    pub name: &'static str,
    /// The attributes, per-vertex ones first.
    pub elements: Vec<InputElementDescriptor>,
}

impl VertexLayoutDescriptor {
    /// Returns the attributes fed from `slot`, in declaration order.
    pub fn elements_in_slot(&self, slot: u32) -> impl Iterator<Item = &InputElementDescriptor> {
        self.elements.iter().filter(move |e| e.input_slot == slot)
    }

    /// Size in bytes of one element of `slot`, i.e. the end of its last attribute.
    pub fn stride(&self, slot: u32) -> u32 {
        self.elements_in_slot(slot)
            .map(InputElementDescriptor::byte_end)
            .max()
            .unwrap_or(0)
    }

    /// Returns `true` if any attribute is read per instance.
    pub fn is_instanced(&self) -> bool {
        self.elements
            .iter()
            .any(|e| e.step_mode == InputStepMode::Instance)
    }

    /// Checks the structural rules every layout must satisfy.
    ///
    /// Offsets strictly increase and never overlap within a slot, per-vertex
    /// attributes live in the vertex slot with a step rate of 0, per-instance
    /// attributes live in the instance slot with a non-zero step rate, and every
    /// instance attribute comes after every vertex attribute.
    pub fn validate(&self) -> Result<(), ResourceError> {
        let invalid = |msg: String| Err(ResourceError::InvalidDescriptor(msg));
        if self.elements.is_empty() {
            return invalid(format!("layout '{}' has no attributes", self.name));
        }

        let mut seen_instance = false;
        let mut slot_cursor: [Option<u32>; 2] = [None, None];
        for element in &self.elements {
            let slot = match (element.step_mode, element.input_slot) {
                (InputStepMode::Vertex, VERTEX_SLOT) if element.step_rate == 0 => 0,
                (InputStepMode::Instance, INSTANCE_SLOT) if element.step_rate > 0 => 1,
                _ => {
                    return invalid(format!(
                        "attribute {}{} in '{}' has inconsistent slot {} / step {:?} / rate {}",
                        element.semantic_name,
                        element.semantic_index,
                        self.name,
                        element.input_slot,
                        element.step_mode,
                        element.step_rate
                    ))
                }
            };

            if slot == 0 && seen_instance {
                return invalid(format!(
                    "per-vertex attribute {}{} follows instance data in '{}'",
                    element.semantic_name, element.semantic_index, self.name
                ));
            }
            seen_instance |= slot == 1;

            if let Some(end) = slot_cursor[slot] {
                if element.byte_offset < end {
                    return invalid(format!(
                        "attribute {}{} at offset {} overlaps previous attribute ending at {} in '{}'",
                        element.semantic_name,
                        element.semantic_index,
                        element.byte_offset,
                        end,
                        self.name
                    ));
                }
            }
            slot_cursor[slot] = Some(element.byte_end());
        }
        Ok(())
    }
}

/// A descriptor used to create an input layout object.
///
/// The device matches the layout against the input signature embedded in the
/// vertex shader bytecode, which is why the bytecode travels with it.
#[derive(Debug, Clone)]
pub struct InputLayoutDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The attribute layout.
    pub layout: &'a VertexLayoutDescriptor,
    /// The vertex shader bytecode the layout is validated against.
    pub vertex_bytecode: &'a [u8],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &'static str, offset: u32, slot: u32) -> InputElementDescriptor {
        let instanced = slot == INSTANCE_SLOT;
        InputElementDescriptor {
            semantic_name: Cow::Borrowed(name),
            semantic_index: 0,
            format: VertexFormat::Float32x3,
            input_slot: slot,
            byte_offset: offset,
            step_mode: if instanced {
                InputStepMode::Instance
            } else {
                InputStepMode::Vertex
            },
            step_rate: u32::from(instanced),
        }
    }

    #[test]
    fn test_stride_is_end_of_last_attribute() {
        let layout = VertexLayoutDescriptor {
            name: "test",
            elements: vec![element("POSITION", 0, 0), element("NORMAL", 12, 0)],
        };
        assert_eq!(layout.stride(VERTEX_SLOT), 24);
        assert_eq!(layout.stride(INSTANCE_SLOT), 0);
        assert!(!layout.is_instanced());
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_overlap_is_rejected() {
        let layout = VertexLayoutDescriptor {
            name: "overlap",
            elements: vec![element("POSITION", 0, 0), element("NORMAL", 8, 0)],
        };
        assert!(matches!(
            layout.validate(),
            Err(ResourceError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_vertex_after_instance_is_rejected() {
        let layout = VertexLayoutDescriptor {
            name: "order",
            elements: vec![element("WORLD", 0, 1), element("POSITION", 0, 0)],
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_empty_layout_is_rejected() {
        let layout = VertexLayoutDescriptor {
            name: "empty",
            elements: Vec::new(),
        };
        assert!(layout.validate().is_err());
    }
}
