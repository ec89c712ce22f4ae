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

//! Settings for the shadow pipeline, loaded from RON.

use crate::render_lane::SceneBounds;
use penumbra_core::math::LinearRgba;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading [`ShadowSettings`].
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings from '{path}': {source}")]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings text is not valid RON for [`ShadowSettings`].
    #[error("Failed to parse settings: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Tunables of the shadow pipeline and the demo driving it.
///
/// Every field has a default, so a settings file only lists what it overrides:
///
/// ```
/// use penumbra_lanes::ShadowSettings;
///
/// let settings = ShadowSettings::from_ron_str("(shadow_map_size: 1024)").unwrap();
/// assert_eq!(settings.shadow_map_size, 1024);
/// assert_eq!(settings.scene_bounds.radius, 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Edge length of the square shadow map, in texels.
    pub shadow_map_size: u32,
    /// The volume the shadow projection is fitted around.
    pub scene_bounds: SceneBounds,
    /// Directory containing the `HLSL/` bytecode folder.
    pub shader_root: PathBuf,
    /// Initial capacity of the per-object constant ring, per frame.
    pub max_objects_per_frame: u32,
    /// Back buffer clear color.
    pub clear_color: LinearRgba,
    /// Main viewport width.
    pub viewport_width: u32,
    /// Main viewport height.
    pub viewport_height: u32,
    /// Use built-in placeholder programs instead of reading bytecode files.
    pub placeholder_shaders: bool,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: 2048,
            scene_bounds: SceneBounds::default(),
            shader_root: PathBuf::from("."),
            max_objects_per_frame: 64,
            clear_color: LinearRgba::new(0.1, 0.1, 0.15, 1.0),
            viewport_width: 1280,
            viewport_height: 720,
            placeholder_shaders: false,
        }
    }
}

impl ShadowSettings {
    /// Parses and validates settings from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            ron::de::from_str(text).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("ShadowSettings: loaded {}", path.display());
        Self::from_ron_str(&text)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.shadow_map_size == 0 {
            return Err(SettingsError::Invalid(
                "shadow_map_size must be greater than zero".to_string(),
            ));
        }
        let radius = self.scene_bounds.radius;
        if radius.is_nan() || radius <= 0.0 {
            return Err(SettingsError::Invalid(format!(
                "scene radius must be positive, got {radius}"
            )));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(SettingsError::Invalid(
                "viewport dimensions must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penumbra_core::math::Vec3;

    #[test]
    fn test_defaults() {
        let settings = ShadowSettings::default();
        assert_eq!(settings.shadow_map_size, 2048);
        assert_eq!(settings.scene_bounds.center, Vec3::ZERO);
        assert_eq!(settings.scene_bounds.radius, 10.0);
        assert_eq!(settings.shader_root, PathBuf::from("."));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let settings = ShadowSettings::from_ron_str(
            "(scene_bounds: (center: (x: 1.0, y: 2.0, z: 3.0), radius: 4.0), placeholder_shaders: true)",
        )
        .unwrap();
        assert_eq!(settings.scene_bounds.center, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(settings.scene_bounds.radius, 4.0);
        assert!(settings.placeholder_shaders);
        assert_eq!(settings.shadow_map_size, 2048);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = ShadowSettings::from_ron_str("(shadow_map_size: 0)").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
        let err =
            ShadowSettings::from_ron_str("(scene_bounds: (center: (x: 0.0, y: 0.0, z: 0.0), radius: -1.0))")
                .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = ShadowSettings::from_ron_str("(shadow_map_size: \"big\")").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ShadowSettings::load("/definitely/not/here/shadow.ron").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
        assert!(err.to_string().contains("shadow.ron"));
    }
}
