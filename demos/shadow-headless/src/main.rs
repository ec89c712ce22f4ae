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

//! Renders a few hundred frames of instanced boxes over a floor, lit by a
//! directional light that circles the scene, on the headless device.
//!
//! Usage: `shadow-headless [settings.ron] [frames]`

mod scene;

use anyhow::Result;
use penumbra_core::math::{LinearRgba, Mat4, Vec3};
use penumbra_core::renderer::DirectionalLight;
use penumbra_infra::HeadlessDevice;
use penumbra_lanes::{
    BytecodeSource, CameraView, FileBytecodeSource, FrameInputs, FrameStats,
    InMemoryBytecodeSource, SettingsError, ShadowCaster, ShadowPipeline, ShadowSettings,
};
use scene::DemoScene;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_SETTINGS: &str = "shadow.ron";
const DEFAULT_FRAMES: u32 = 240;
/// Light orbit speed, radians per second.
const LIGHT_SPEED: f32 = 0.6;

/// Elapsed time between frames.
struct FrameClock {
    last: Instant,
    elapsed: f32,
}

impl FrameClock {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            elapsed: 0.0,
        }
    }

    /// Returns the seconds since the previous tick.
    fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        self.elapsed += delta;
        delta
    }
}

fn load_settings(path: &Path) -> Result<ShadowSettings> {
    match ShadowSettings::load(path) {
        Ok(settings) => Ok(settings),
        Err(SettingsError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No settings at {}, using defaults", path.display());
            Ok(ShadowSettings::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn sun(angle: f32) -> DirectionalLight {
    DirectionalLight::new(
        LinearRgba::rgb(0.2, 0.2, 0.25),
        LinearRgba::rgb(0.9, 0.85, 0.75),
        LinearRgba::rgb(0.5, 0.5, 0.5),
        Vec3::new(angle.cos() * 0.6, -1.0, angle.sin() * 0.6),
    )
}

fn camera(settings: &ShadowSettings) -> Result<CameraView> {
    let eye = Vec3::new(0.0, 9.0, 18.0);
    let aspect = settings.viewport_width as f32 / settings.viewport_height as f32;
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y)
        .ok_or_else(|| anyhow::anyhow!("degenerate camera"))?;
    let proj = Mat4::perspective_rh_zo(std::f32::consts::FRAC_PI_4, aspect, 0.1, 100.0)
        .ok_or_else(|| anyhow::anyhow!("invalid camera projection"))?;
    Ok(CameraView {
        view_proj: proj * view,
        eye,
    })
}

fn run(
    pipeline: &mut ShadowPipeline,
    scene: &DemoScene,
    settings: &ShadowSettings,
    frames: u32,
) -> Result<FrameStats> {
    let camera = camera(settings)?;
    let mut clock = FrameClock::new();
    let mut angle = 0.0_f32;
    let mut totals = FrameStats::default();

    for frame in 0..frames {
        angle += clock.tick() * LIGHT_SPEED;
        let lights = [sun(angle)];
        let inputs = FrameInputs {
            camera,
            lights: &lights,
            caster: ShadowCaster::from(&lights[0]),
            targets: scene.targets,
            draws: &scene.draws,
            clear_color: settings.clear_color,
        };

        let stats = pipeline.render_frame(&inputs)?;
        totals.shadow_draws += stats.shadow_draws;
        totals.main_draws += stats.main_draws;
        totals.skipped_draws += stats.skipped_draws;

        if frame % 60 == 0 {
            let direction = lights[0].direction();
            log::info!(
                "Frame {frame}: light direction ({:.2}, {:.2}, {:.2}), {} shadow / {} main draws",
                direction.x,
                direction.y,
                direction.z,
                stats.shadow_draws,
                stats.main_draws
            );
        }
    }
    log::info!("Rendered {frames} frames in {:.3}s", clock.elapsed);
    Ok(totals)
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let settings_path = args.next().unwrap_or_else(|| DEFAULT_SETTINGS.to_string());
    let frames = match args.next() {
        Some(n) => n.parse()?,
        None => DEFAULT_FRAMES,
    };

    let settings = load_settings(Path::new(&settings_path))?;
    let device = HeadlessDevice::new();

    let source: Box<dyn BytecodeSource> = if settings.placeholder_shaders {
        Box::new(InMemoryBytecodeSource::with_placeholder_programs())
    } else {
        Box::new(FileBytecodeSource::new(settings.shader_root.clone()))
    };

    // No partial rendering: any startup failure aborts the demo.
    let started = ShadowPipeline::new(Arc::new(device.clone()), &settings, source.as_ref());
    let mut pipeline = match started {
        Ok(pipeline) => pipeline,
        Err(e) => {
            log::error!("Startup aborted: {e}");
            return Err(e.into());
        }
    };
    let mut scene = DemoScene::create(&device, &settings)?;

    let result = run(&mut pipeline, &scene, &settings, frames);

    scene.destroy(&device);
    pipeline.shutdown()?;

    let totals = result?;
    let stats = device.stats();
    log::info!(
        "Submitted {} command buffers, {} passes, {} draw calls ({} shadow / {} main)",
        stats.submitted,
        stats.passes,
        stats.draw_calls,
        totals.shadow_draws,
        totals.main_draws
    );
    if stats.live_objects() > 0 {
        log::warn!("{} device objects still alive at exit", stats.live_objects());
    }
    Ok(())
}
