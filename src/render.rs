//! Drawing seam between layers and whatever paints the map.
//!
//! The crate never rasterizes. For each ready layer it computes one
//! [`DrawCommand`] in device pixels and hands it to a [`RenderSurface`]:
//! translate to `center`, rotate by `rotation` (clockwise degrees), scale by
//! `scale`, then draw the image centered on the origin.

use glam::DVec2;

use crate::entities::layer::{BlendMode, GeorefLayer};
use crate::entities::loader::RasterImage;
use crate::entities::transform::{Extent, Transform};

/// Map -> device pixel conversion of the current view.
pub trait MapToPixel {
    fn map_to_pixel(&self, p: DVec2) -> DVec2;
    fn map_units_per_pixel(&self) -> f64;
}

/// North-up view of `extent` on a `width x height` pixel device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub extent: Extent,
    pub width: u32,
    pub height: u32,
}

impl ViewTransform {
    pub fn new(extent: Extent, width: u32, height: u32) -> Self {
        Self { extent, width, height }
    }
}

impl MapToPixel for ViewTransform {
    fn map_to_pixel(&self, p: DVec2) -> DVec2 {
        let mupp = self.map_units_per_pixel();
        DVec2::new((p.x - self.extent.min.x) / mupp, (self.extent.max.y - p.y) / mupp)
    }

    fn map_units_per_pixel(&self) -> f64 {
        let w = self.extent.width() / self.width.max(1) as f64;
        let h = self.extent.height() / self.height.max(1) as f64;
        w.max(h)
    }
}

/// One image blit in device space.
#[derive(Debug, Clone)]
pub struct DrawCommand<'a> {
    pub image: &'a RasterImage,
    /// Raster center in device pixels
    pub center: DVec2,
    /// Clockwise degrees
    pub rotation: f64,
    /// Device pixels per image pixel
    pub scale: DVec2,
    pub opacity: f64,
    pub blend_mode: BlendMode,
}

pub trait RenderSurface {
    fn draw_image(&mut self, cmd: &DrawCommand);

    /// Outline of a provisional placement, corners in device pixels.
    fn draw_outline(&mut self, _corners: &[DVec2; 4]) {}
}

/// Command for drawing `layer` at its committed placement, or `None` when
/// there is nothing to draw.
pub fn layer_command<'a>(layer: &'a GeorefLayer, view_extent: &Extent, view: &dyn MapToPixel) -> Option<DrawCommand<'a>> {
    if view_extent.is_empty() || !layer.is_ready() {
        return None;
    }
    let image = layer.image()?;
    let mupp = view.map_units_per_pixel();
    if !(mupp > 0.0) {
        return None;
    }
    let t = layer.transform();
    Some(DrawCommand {
        image,
        center: view.map_to_pixel(t.center()),
        rotation: t.rotation(),
        scale: t.scale() / mupp,
        opacity: layer.opacity(),
        blend_mode: layer.blend_mode(),
    })
}

/// Draw a layer. Returns whether anything was drawn.
pub fn draw_layer(
    layer: &GeorefLayer,
    view_extent: &Extent,
    view: &dyn MapToPixel,
    surface: &mut dyn RenderSurface,
) -> bool {
    match layer_command(layer, view_extent, view) {
        Some(cmd) => {
            surface.draw_image(&cmd);
            true
        }
        None => false,
    }
}

/// Device-space corners of a provisional transform.
pub fn outline(transform: &Transform, size: (u32, u32), view: &dyn MapToPixel) -> [DVec2; 4] {
    transform.corner_coordinates(size).points().map(|p| view.map_to_pixel(p))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::history::HistoryKind;
    use crate::entities::layer::tests::ready_layer;

    /// Surface that records what it was asked to draw.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub images: Vec<(DVec2, f64, DVec2, f64)>,
        pub outlines: Vec<[DVec2; 4]>,
    }

    impl RenderSurface for Recorder {
        fn draw_image(&mut self, cmd: &DrawCommand) {
            self.images.push((cmd.center, cmd.rotation, cmd.scale, cmd.opacity));
        }

        fn draw_outline(&mut self, corners: &[DVec2; 4]) {
            self.outlines.push(*corners);
        }
    }

    fn view() -> ViewTransform {
        ViewTransform::new(Extent::new(DVec2::new(-100.0, -50.0), DVec2::new(100.0, 50.0)), 400, 200)
    }

    #[test]
    fn test_view_transform() {
        let v = view();
        assert_eq!(v.map_units_per_pixel(), 0.5);
        assert_eq!(v.map_to_pixel(DVec2::new(-100.0, 50.0)), DVec2::ZERO);
        assert_eq!(v.map_to_pixel(DVec2::ZERO), DVec2::new(200.0, 100.0));
    }

    #[test]
    fn test_draw_ready_layer() {
        let dir = tempfile::tempdir().unwrap();
        let mut layer = ready_layer(dir.path(), 10, 10);
        layer.commit_with(HistoryKind::Move, |t| t.set_center(DVec2::new(10.0, 10.0)));
        layer.commit_with(HistoryKind::Rotation, |t| t.set_rotation(15.0));

        let mut rec = Recorder::default();
        let v = view();
        assert!(draw_layer(&layer, &v.extent, &v, &mut rec));
        let (center, rotation, scale, opacity) = rec.images[0];
        assert_eq!(center, DVec2::new(220.0, 80.0));
        assert_eq!(rotation, 15.0);
        assert_eq!(scale, DVec2::new(2.0, 2.0));
        assert!((opacity - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_skips_empty_view_and_unready_layer() {
        let dir = tempfile::tempdir().unwrap();
        let layer = ready_layer(dir.path(), 10, 10);
        let v = view();
        let mut rec = Recorder::default();

        let empty = Extent::new(DVec2::ZERO, DVec2::new(0.0, 5.0));
        assert!(!draw_layer(&layer, &empty, &v, &mut rec));

        let unready = GeorefLayer::new("x", "x.png");
        assert!(!draw_layer(&unready, &v.extent, &v, &mut rec));
        assert!(rec.images.is_empty());
    }
}
