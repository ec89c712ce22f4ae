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

//! The closed set of rendering techniques and the pass each one belongs to.

use super::vertex_layouts::VertexLayoutKind;
use penumbra_core::renderer::api::ShaderStage;
use std::fmt;

/// Directory, relative to the bytecode root, holding compiled shader objects.
pub const BYTECODE_DIR: &str = "HLSL";

/// The pass a technique renders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPassState {
    /// Depth-only rendering from the light into the shadow map.
    ShadowPass,
    /// Lit rendering from the camera into the color and depth targets.
    MainPass,
}

/// The shape of the geometry a draw submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// Instanced meshes whose world transforms come from an instance stream.
    Shape,
    /// The single, non-instanced floor grid.
    Floor,
}

/// A `{vertex shader, input layout, pixel shader}` triple implementing one rendering variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Technique {
    /// Lit, shadowed, instanced shapes.
    Shapes,
    /// Lit, shadowed floor.
    Floor,
    /// Depth-only instanced shapes.
    ShadowMap,
    /// Depth-only floor.
    FloorShadowMap,
}

impl Technique {
    /// Every technique, in initialization order.
    pub const ALL: [Technique; 4] = [
        Technique::Shapes,
        Technique::Floor,
        Technique::ShadowMap,
        Technique::FloorShadowMap,
    ];

    /// The name used in logs and bytecode file names.
    pub const fn name(self) -> &'static str {
        match self {
            Technique::Shapes => "Shapes",
            Technique::Floor => "Floor",
            Technique::ShadowMap => "ShadowMap",
            Technique::FloorShadowMap => "FloorShadowMap",
        }
    }

    /// The pass this technique is bound in.
    pub const fn pass(self) -> RenderPassState {
        match self {
            Technique::Shapes | Technique::Floor => RenderPassState::MainPass,
            Technique::ShadowMap | Technique::FloorShadowMap => RenderPassState::ShadowPass,
        }
    }

    /// The vertex layout paired with this technique's vertex shader.
    pub const fn vertex_layout(self) -> VertexLayoutKind {
        match self {
            Technique::Shapes => VertexLayoutKind::Shape,
            Technique::Floor => VertexLayoutKind::Floor,
            Technique::ShadowMap => VertexLayoutKind::ShadowShape,
            Technique::FloorShadowMap => VertexLayoutKind::ShadowFloor,
        }
    }

    /// The geometry this technique draws.
    pub const fn geometry(self) -> GeometryKind {
        match self {
            Technique::Shapes | Technique::ShadowMap => GeometryKind::Shape,
            Technique::Floor | Technique::FloorShadowMap => GeometryKind::Floor,
        }
    }

    /// Selects the technique for a geometry kind in a given pass.
    pub const fn select(geometry: GeometryKind, pass: RenderPassState) -> Technique {
        match (geometry, pass) {
            (GeometryKind::Shape, RenderPassState::MainPass) => Technique::Shapes,
            (GeometryKind::Floor, RenderPassState::MainPass) => Technique::Floor,
            (GeometryKind::Shape, RenderPassState::ShadowPass) => Technique::ShadowMap,
            (GeometryKind::Floor, RenderPassState::ShadowPass) => Technique::FloorShadowMap,
        }
    }

    /// Path of the compiled bytecode for `stage`, e.g. `HLSL/ShadowMapVS.cso`.
    pub fn bytecode_path(self, stage: ShaderStage) -> String {
        format!("{BYTECODE_DIR}/{}{}.cso", self.name(), stage.file_suffix())
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytecode_path_convention() {
        assert_eq!(
            Technique::FloorShadowMap.bytecode_path(ShaderStage::Vertex),
            "HLSL/FloorShadowMapVS.cso"
        );
        assert_eq!(
            Technique::Shapes.bytecode_path(ShaderStage::Pixel),
            "HLSL/ShapesPS.cso"
        );
    }

    #[test]
    fn test_select_round_trips_pass_and_geometry() {
        for technique in Technique::ALL {
            assert_eq!(
                Technique::select(technique.geometry(), technique.pass()),
                technique
            );
        }
    }

    #[test]
    fn test_instanced_techniques_use_instanced_layouts() {
        for technique in Technique::ALL {
            let instanced = technique.geometry() == GeometryKind::Shape;
            assert_eq!(technique.vertex_layout().is_instanced(), instanced);
        }
    }
}
