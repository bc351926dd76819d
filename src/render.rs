// SPDX-License-Identifier: MPL-2.0
//! Presentation seam between the playback engine and a display layer.
//!
//! The engine knows nothing about graphics APIs; it hands each presented
//! frame to a [`Renderer`] and asks it to draw. A GUI front-end implements
//! this trait on top of its texture pipeline; the headless binary and the
//! tests use [`NullRenderer`].

/// Receives presented frames from the playback engine.
///
/// `update_texture` is called once per newly presented frame, after the
/// frame's presentation deadline has been reached. `render` is called once
/// per engine step and is expected to draw the current texture letterboxed
/// or pillarboxed into the viewport, preserving the content aspect ratio.
pub trait Renderer {
    /// Uploads the most recent RGBA frame (`width * height * 4` bytes).
    fn update_texture(&mut self, pixels: &[u8], width: u32, height: u32);

    /// Draws the current texture into the viewport.
    fn render(&mut self, viewport_w: u32, viewport_h: u32, content_w: u32, content_h: u32);
}

/// Renderer that discards frames, counting calls.
///
/// Used by the headless binary and by tests that need to observe how many
/// frames the engine presented without a display attached.
#[derive(Debug, Default)]
pub struct NullRenderer {
    /// Number of `update_texture` calls received.
    pub frames_presented: u64,

    /// Number of `render` calls received.
    pub draws: u64,
}

impl Renderer for NullRenderer {
    fn update_texture(&mut self, _pixels: &[u8], _width: u32, _height: u32) {
        self.frames_presented += 1;
    }

    fn render(&mut self, _viewport_w: u32, _viewport_h: u32, _content_w: u32, _content_h: u32) {
        self.draws += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_renderer_counts_calls() {
        let mut renderer = NullRenderer::default();
        renderer.update_texture(&[0u8; 16], 2, 2);
        renderer.update_texture(&[0u8; 16], 2, 2);
        renderer.render(800, 600, 2, 2);

        assert_eq!(renderer.frames_presented, 2);
        assert_eq!(renderer.draws, 1);
    }
}
