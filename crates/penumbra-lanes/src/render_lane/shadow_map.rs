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

//! The shadow depth target and the light-space transform used to render and sample it.

use penumbra_core::math::{Mat4, Vec3, Vec4, FRAC_PI_2};
use penumbra_core::renderer::api::{
    AddressMode, CompareFunction, FilterMode, SamplerDescriptor, SamplerId, TextureDescriptor,
    TextureFormat, TextureId, TextureUsage, TextureViewDescriptor, TextureViewId, TextureViewKind,
    Viewport,
};
use penumbra_core::renderer::{DirectionalLight, GraphicsDevice, RenderError, SpotLight};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Maps NDC x/y from `[-1, 1]` to texture coordinates `[0, 1]`, flipping y and keeping depth.
pub const NDC_TO_TEXTURE: Mat4 = Mat4::from_cols(
    Vec4::new(0.5, 0.0, 0.0, 0.0),
    Vec4::new(0.0, -0.5, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 0.0),
    Vec4::new(0.5, 0.5, 0.0, 1.0),
);

/// The sphere the shadow volume is fitted around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneBounds {
    /// Sphere center in world space.
    pub center: Vec3,
    /// Sphere radius.
    pub radius: f32,
}

impl Default for SceneBounds {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 10.0,
        }
    }
}

/// The light whose point of view the shadow pass renders from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowCaster {
    /// Parallel rays travelling along `direction`.
    Directional {
        /// Direction the light travels in.
        direction: Vec3,
    },
    /// A cone emitted from `position` along `direction`.
    Spot {
        /// World-space position.
        position: Vec3,
        /// Cone axis.
        direction: Vec3,
    },
}

impl From<&DirectionalLight> for ShadowCaster {
    fn from(light: &DirectionalLight) -> Self {
        ShadowCaster::Directional {
            direction: light.direction(),
        }
    }
}

impl From<&SpotLight> for ShadowCaster {
    fn from(light: &SpotLight) -> Self {
        ShadowCaster::Spot {
            position: light.position(),
            direction: light.direction(),
        }
    }
}

/// The light's view and projection, plus the transform that samples the shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    /// World to light view space.
    pub view: Mat4,
    /// Light view space to clip space.
    pub proj: Mat4,
    /// `proj * view`; the view-projection of the shadow pass.
    pub view_proj: Mat4,
    /// `NDC_TO_TEXTURE * view_proj`; world to `(u, v, depth)` in the shadow map.
    pub shadow_transform: Mat4,
    /// The eye position the light was rendered from.
    pub eye: Vec3,
}

fn up_for(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

fn degenerate(what: &str) -> RenderError {
    RenderError::InvalidState(format!("cannot build light space: {what}"))
}

impl LightSpace {
    /// Computes the light space for `caster`, fitted around `bounds`.
    ///
    /// A directional light looks at the sphere center from two radii back along its
    /// direction. A spot light renders from its own position along its own axis.
    pub fn compute(caster: &ShadowCaster, bounds: &SceneBounds) -> Result<Self, RenderError> {
        match *caster {
            ShadowCaster::Directional { direction } => {
                let dir = direction.normalize();
                if dir == Vec3::ZERO {
                    return Err(degenerate("zero light direction"));
                }
                let eye = bounds.center - dir * (2.0 * bounds.radius);
                Self::orthographic(eye, bounds.center, bounds)
            }
            ShadowCaster::Spot {
                position,
                direction,
            } => Self::perspective(position, direction, bounds),
        }
    }

    /// An orthographic light space seen from `eye` towards `target`, tightly enclosing `bounds`.
    ///
    /// The near and far planes touch the sphere, so every point of it lands in the
    /// `[0, 1]` depth range regardless of how far the eye is.
    pub fn orthographic(eye: Vec3, target: Vec3, bounds: &SceneBounds) -> Result<Self, RenderError> {
        if bounds.radius <= 0.0 {
            return Err(degenerate("non-positive scene radius"));
        }
        let up = up_for((target - eye).normalize());
        let view =
            Mat4::look_at_rh(eye, target, up).ok_or_else(|| degenerate("eye coincides with target"))?;

        let center = (view * Vec4::from_vec3(bounds.center, 1.0)).truncate();
        let r = bounds.radius;
        let proj = Mat4::orthographic_rh_zo(
            center.x - r,
            center.x + r,
            center.y - r,
            center.y + r,
            -center.z - r,
            -center.z + r,
        );
        Ok(Self::from_parts(view, proj, eye))
    }

    /// A perspective light space from `eye` along `direction`, widened to cover `bounds`.
    pub fn perspective(eye: Vec3, direction: Vec3, bounds: &SceneBounds) -> Result<Self, RenderError> {
        let axis = direction.normalize();
        if axis == Vec3::ZERO {
            return Err(degenerate("zero spot direction"));
        }
        let view = Mat4::look_at_rh(eye, eye + axis, up_for(axis))
            .ok_or_else(|| degenerate("spot axis is degenerate"))?;

        let to_center = bounds.center - eye;
        let distance = to_center.length();
        let r = bounds.radius;
        let half_angle = if distance > r {
            let off_axis = to_center.normalize().dot(axis).clamp(-1.0, 1.0).acos();
            off_axis + (r / distance).asin()
        } else {
            FRAC_PI_2
        };
        let fov = (2.0 * half_angle).min(0.95 * std::f32::consts::PI);
        let near = (distance - r).max(r * 0.01).max(0.05);
        let far = (distance + r).max(near * 2.0);

        let proj = Mat4::perspective_rh_zo(fov, 1.0, near, far)
            .ok_or_else(|| degenerate("invalid spot frustum"))?;
        Ok(Self::from_parts(view, proj, eye))
    }

    fn from_parts(view: Mat4, proj: Mat4, eye: Vec3) -> Self {
        let view_proj = proj * view;
        Self {
            view,
            proj,
            view_proj,
            shadow_transform: NDC_TO_TEXTURE * view_proj,
            eye,
        }
    }

    /// The depth the shadow pass writes for a world-space point.
    pub fn light_depth(&self, world: Vec3) -> f32 {
        self.view_proj.project_point(world).z
    }

    /// The `(u, v, reference depth)` the main pass compares against the shadow map.
    pub fn shadow_coords(&self, world: Vec3) -> Vec3 {
        self.shadow_transform.project_point(world)
    }
}

/// The depth texture the shadow pass renders into and the main pass samples.
#[derive(Debug)]
pub struct ShadowMap {
    size: u32,
    texture: TextureId,
    depth_view: TextureViewId,
    shader_view: TextureViewId,
    sampler: SamplerId,
}

impl ShadowMap {
    /// Creates a square `size` x `size` depth target with a depth view, a shader
    /// view and a comparison sampler. On failure, whatever was created is released.
    pub fn new(device: &dyn GraphicsDevice, size: u32) -> Result<Self, RenderError> {
        if size == 0 {
            return Err(RenderError::InvalidState(
                "shadow map size must be non-zero".to_string(),
            ));
        }
        let failed = |what: &str, source| RenderError::ResourceCreationFailed {
            what: what.to_string(),
            source,
        };

        let texture = device
            .create_texture(&TextureDescriptor {
                label: Some(Cow::Borrowed("Shadow Map")),
                width: size,
                height: size,
                format: TextureFormat::Depth32Float,
                usage: TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE,
            })
            .map_err(|e| failed("shadow map texture", e))?;

        let depth_view = match device.create_texture_view(
            texture,
            &TextureViewDescriptor {
                label: Some(Cow::Borrowed("Shadow Map Depth View")),
                kind: TextureViewKind::DepthStencil,
                format: TextureFormat::Depth32Float,
            },
        ) {
            Ok(view) => view,
            Err(e) => {
                release(device, None, None, Some(texture));
                return Err(failed("shadow map depth view", e));
            }
        };

        let shader_view = match device.create_texture_view(
            texture,
            &TextureViewDescriptor {
                label: Some(Cow::Borrowed("Shadow Map Shader View")),
                kind: TextureViewKind::ShaderResource,
                format: TextureFormat::R32Float,
            },
        ) {
            Ok(view) => view,
            Err(e) => {
                release(device, None, Some(depth_view), Some(texture));
                return Err(failed("shadow map shader view", e));
            }
        };

        let sampler = match device.create_sampler(&SamplerDescriptor {
            label: Some(Cow::Borrowed("Shadow Comparison Sampler")),
            address_mode: AddressMode::ClampToBorder,
            filter: FilterMode::Linear,
            compare: Some(CompareFunction::LessEqual),
            border_color: [1.0; 4],
        }) {
            Ok(sampler) => sampler,
            Err(e) => {
                release(device, Some(shader_view), Some(depth_view), Some(texture));
                return Err(failed("shadow comparison sampler", e));
            }
        };

        log::info!("ShadowMap: created {size}x{size} depth target");
        Ok(Self {
            size,
            texture,
            depth_view,
            shader_view,
            sampler,
        })
    }

    /// Edge length in texels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The view the shadow pass writes depth through.
    pub fn depth_view(&self) -> TextureViewId {
        self.depth_view
    }

    /// The view the main pass samples.
    pub fn shader_view(&self) -> TextureViewId {
        self.shader_view
    }

    /// The depth-compare sampler.
    pub fn sampler(&self) -> SamplerId {
        self.sampler
    }

    /// A viewport covering the whole shadow map.
    pub fn viewport(&self) -> Viewport {
        Viewport::full(self.size, self.size)
    }

    /// Releases every object. Failures are logged, not returned.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_sampler(self.sampler) {
            log::warn!("ShadowMap: Failed to destroy sampler: {e}");
        }
        release(
            device,
            Some(self.shader_view),
            Some(self.depth_view),
            Some(self.texture),
        );
        log::info!("ShadowMap: destroyed");
    }
}

fn release(
    device: &dyn GraphicsDevice,
    shader_view: Option<TextureViewId>,
    depth_view: Option<TextureViewId>,
    texture: Option<TextureId>,
) {
    for view in [shader_view, depth_view].into_iter().flatten() {
        if let Err(e) = device.destroy_texture_view(view) {
            log::warn!("ShadowMap: Failed to destroy view {view:?}: {e}");
        }
    }
    if let Some(texture) = texture {
        if let Err(e) = device.destroy_texture(texture) {
            log::warn!("ShadowMap: Failed to destroy texture: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn bounds() -> SceneBounds {
        SceneBounds {
            center: Vec3::ZERO,
            radius: 10.0,
        }
    }

    /// Surface points whose normal faces the light side of the sphere.
    fn hemisphere_facing(eye: Vec3, bounds: &SceneBounds) -> Vec<Vec3> {
        let towards_light = (eye - bounds.center).normalize();
        let mut points = Vec::new();
        for i in 0..=8 {
            for j in 0..16 {
                let theta = i as f32 / 8.0 * std::f32::consts::PI;
                let phi = j as f32 / 16.0 * std::f32::consts::TAU;
                let n = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                let p = bounds.center + n * bounds.radius;
                if n.dot(towards_light) >= 0.0 {
                    points.push(p);
                }
            }
        }
        points
    }

    #[test]
    fn test_light_above_origin_encloses_sphere_in_unit_depth() {
        let bounds = bounds();
        let eye = Vec3::new(0.0, 10.0, 0.0);
        let space = LightSpace::orthographic(eye, Vec3::ZERO, &bounds).unwrap();

        assert_abs_diff_eq!(space.light_depth(Vec3::new(0.0, 10.0, 0.0)), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(space.light_depth(Vec3::ZERO), 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(space.light_depth(Vec3::new(0.0, -10.0, 0.0)), 1.0, epsilon = 1e-5);

        for p in hemisphere_facing(eye, &bounds) {
            let d = space.light_depth(p);
            assert!((-1e-5..=1.0 + 1e-5).contains(&d), "depth {d} out of range for {p:?}");
        }
    }

    #[test]
    fn test_compare_depth_equals_written_depth() {
        let bounds = bounds();
        let eye = Vec3::new(0.0, 10.0, 0.0);
        let space = LightSpace::orthographic(eye, Vec3::ZERO, &bounds).unwrap();

        for p in hemisphere_facing(eye, &bounds) {
            let written = space.light_depth(p);
            let coords = space.shadow_coords(p);
            assert!(coords.z <= written + 1e-5);
            assert_abs_diff_eq!(coords.z, written, epsilon = 1e-5);
            assert!((-1e-5..=1.0 + 1e-5).contains(&coords.x));
            assert!((-1e-5..=1.0 + 1e-5).contains(&coords.y));
        }
    }

    #[test]
    fn test_directional_caster_fits_sphere() {
        let bounds = SceneBounds {
            center: Vec3::new(3.0, 0.0, -2.0),
            radius: 5.0,
        };
        let caster = ShadowCaster::Directional {
            direction: Vec3::new(0.57735, -0.57735, 0.57735),
        };
        let space = LightSpace::compute(&caster, &bounds).unwrap();
        let axis = Vec3::new(0.57735, -0.57735, 0.57735).normalize();
        let nearest = bounds.center - axis * bounds.radius;
        let farthest = bounds.center + axis * bounds.radius;
        assert_abs_diff_eq!(space.light_depth(nearest), 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(space.light_depth(farthest), 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(space.light_depth(bounds.center), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_spot_caster_sees_center_inside_frustum() {
        let bounds = bounds();
        let caster = ShadowCaster::Spot {
            position: Vec3::new(0.0, 25.0, 5.0),
            direction: Vec3::new(0.0, -1.0, -0.2),
        };
        let space = LightSpace::compute(&caster, &bounds).unwrap();
        let c = space.view_proj.project_point(bounds.center);
        assert!(c.x.abs() <= 1.0 && c.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&c.z));
    }

    #[test]
    fn test_degenerate_inputs_are_rejected() {
        let zero = ShadowCaster::Directional {
            direction: Vec3::ZERO,
        };
        assert!(matches!(
            LightSpace::compute(&zero, &bounds()),
            Err(RenderError::InvalidState(_))
        ));
        assert!(LightSpace::orthographic(Vec3::ZERO, Vec3::ZERO, &bounds()).is_err());
    }

    #[test]
    fn test_ndc_to_texture_corners() {
        let top_left = NDC_TO_TEXTURE * Vec4::new(-1.0, 1.0, 0.25, 1.0);
        assert_eq!(top_left, Vec4::new(0.0, 0.0, 0.25, 1.0));
        let bottom_right = NDC_TO_TEXTURE * Vec4::new(1.0, -1.0, 0.75, 1.0);
        assert_eq!(bottom_right, Vec4::new(1.0, 1.0, 0.75, 1.0));
    }
}
