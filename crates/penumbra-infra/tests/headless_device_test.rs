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

//! Recording and submission through the headless device.

use penumbra_core::math::LinearRgba;
use penumbra_core::renderer::api::{
    LoadOp, Operations, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPassDescriptor, StoreOp, TextureViewId, Viewport,
};
use penumbra_core::renderer::GraphicsDevice;
use penumbra_infra::{HeadlessDevice, RecordedCommand};

fn depth_attachment(view: &TextureViewId) -> RenderPassDepthStencilAttachment<'_> {
    RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(Operations {
            load: LoadOp::Clear(1.0),
            store: StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

#[test]
fn test_passes_are_submitted_in_recording_order() {
    let device = HeadlessDevice::new();
    let shadow_depth = TextureViewId(100);
    let color = TextureViewId(200);
    let main_depth = TextureViewId(201);

    let mut encoder = device.create_command_encoder(Some("frame"));
    {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("first"),
            color_attachments: &[],
            depth_stencil_attachment: Some(depth_attachment(&shadow_depth)),
        });
        pass.set_viewport(&Viewport::full(64, 64));
        pass.draw_indexed(0..6, 0, 0..3);
    }
    {
        let attachments = [RenderPassColorAttachment {
            view: &color,
            ops: Operations {
                load: LoadOp::Clear(LinearRgba::BLACK),
                store: StoreOp::Store,
            },
        }];
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("second"),
            color_attachments: &attachments,
            depth_stencil_attachment: Some(depth_attachment(&main_depth)),
        });
        pass.draw_indexed(0..6, 0, 0..1);
        pass.draw_indexed(0..6, 0, 0..1);
    }
    let buffer = encoder.finish();

    // Nothing is visible until submission.
    assert!(device.submitted_passes().is_empty());
    device.submit_command_buffer(buffer);

    let passes = device.submitted_passes();
    assert_eq!(passes.len(), 2);
    assert_eq!(passes[0].label.as_deref(), Some("first"));
    assert!(passes[0].color_targets.is_empty());
    assert_eq!(passes[0].depth_target, Some(shadow_depth));
    assert_eq!(passes[0].depth_clear, Some(1.0));
    assert_eq!(
        passes[0].commands[1],
        RecordedCommand::DrawIndexed {
            indices: 0..6,
            base_vertex: 0,
            instances: 0..3
        }
    );
    assert_eq!(passes[1].color_targets, vec![color]);

    let stats = device.stats();
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.passes, 2);
    assert_eq!(stats.draw_calls, 3);
}

#[test]
fn test_unknown_command_buffer_is_ignored() {
    let device = HeadlessDevice::new();
    device.submit_command_buffer(penumbra_core::renderer::api::CommandBufferId(999));
    assert_eq!(device.stats().submitted, 0);
}
