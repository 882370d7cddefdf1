//! Raster page built on `tiny-skia` (through the `resvg` re-export so the
//! pixmap type matches the one `resvg::render` draws into).

use std::sync::Arc;

use atelier_core::album::{Rect, SHADOW_BLUR, SHADOW_OPACITY};
use image::{Rgba, RgbImage, RgbaImage};
use resvg::tiny_skia::{
    Color, FilterQuality, IntSize, Paint, Pixmap, PixmapPaint, Rect as SkRect, Transform,
};
use usvg::fontdb;

use crate::error::AlbumError;
use crate::text;

/// A drawing surface plus the fonts used for its text.
pub struct Canvas {
    pixmap: Pixmap,
    fonts: Arc<fontdb::Database>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, fonts: Arc<fontdb::Database>) -> Result<Self, AlbumError> {
        let pixmap = Pixmap::new(width, height)
            .ok_or_else(|| AlbumError::render(format!("cannot allocate {width}x{height} page")))?;
        Ok(Self { pixmap, fonts })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn fill(&mut self, rgb: [u8; 3]) {
        self.pixmap
            .fill(Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255));
    }

    /// Fill `rect` (in the coordinate space of `transform`) with a solid
    /// colour.
    pub fn fill_rect(
        &mut self,
        rect: Rect,
        rgba: [u8; 4],
        transform: Transform,
    ) -> Result<(), AlbumError> {
        let sk_rect = to_sk_rect(rect)?;
        let mut paint = Paint::default();
        paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
        paint.anti_alias = true;
        self.pixmap.fill_rect(sk_rect, &paint, transform, None);
        Ok(())
    }

    /// Draw `image` stretched onto `dest` (in the coordinate space of
    /// `transform`).
    pub fn draw_image(&mut self, image: &Pixmap, dest: Rect, transform: Transform) {
        if dest.width <= 0.0 || dest.height <= 0.0 {
            return;
        }
        let placed = transform.pre_translate(dest.x, dest.y).pre_scale(
            dest.width / image.width() as f32,
            dest.height / image.height() as f32,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..Default::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, image.as_ref(), &paint, placed, None);
    }

    /// Draw a pixmap at its natural size with its top-left corner at the
    /// origin of `transform`.
    pub fn draw_pixmap(&mut self, image: &Pixmap, transform: Transform) {
        self.pixmap
            .draw_pixmap(0, 0, image.as_ref(), &PixmapPaint::default(), transform, None);
    }

    /// Render an SVG document onto the page.
    pub fn draw_svg(&mut self, svg: &str, transform: Transform) -> Result<(), AlbumError> {
        let tree = text::parse_svg(svg, &self.fonts)?;
        resvg::render(&tree, transform, &mut self.pixmap.as_mut());
        Ok(())
    }

    /// Flatten the page to RGB. The page background is opaque, so the
    /// premultiplied channels are already the final colours.
    pub fn into_rgb(self) -> Result<RgbImage, AlbumError> {
        let (width, height) = (self.pixmap.width(), self.pixmap.height());
        let rgb: Vec<u8> = self
            .pixmap
            .data()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| AlbumError::render("page buffer has the wrong size"))
    }
}

fn to_sk_rect(rect: Rect) -> Result<SkRect, AlbumError> {
    let usable = rect.width.is_finite()
        && rect.height.is_finite()
        && rect.width > 0.0
        && rect.height > 0.0;
    if !usable {
        return Err(AlbumError::render(format!("degenerate rectangle {rect:?}")));
    }
    SkRect::from_xywh(rect.x, rect.y, rect.width, rect.height)
        .ok_or_else(|| AlbumError::render(format!("degenerate rectangle {rect:?}")))
}

/// Convert straight-alpha RGBA into a premultiplied pixmap.
pub fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap, AlbumError> {
    let size = IntSize::from_wh(image.width(), image.height())
        .ok_or_else(|| AlbumError::render("image has no pixels"))?;
    let mut data = Vec::with_capacity(image.as_raw().len());
    for Rgba([r, g, b, a]) in image.pixels().copied() {
        let premultiply = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        data.extend_from_slice(&[premultiply(r), premultiply(g), premultiply(b), a]);
    }
    Pixmap::from_vec(data, size).ok_or_else(|| AlbumError::render("invalid pixmap data"))
}

/// Soft drop shadow for a `width` x `height` frame.
///
/// Returns the shadow pixmap and the margin added on every side to fit
/// the blur; the pixmap's top-left corner belongs at
/// `(frame.x - margin, frame.y - margin)`.
pub fn frame_shadow(width: f32, height: f32) -> Result<(Pixmap, f32), AlbumError> {
    let sigma = SHADOW_BLUR / 2.0;
    let margin = (sigma * 3.0).ceil();
    let w = (width + 2.0 * margin).ceil() as u32;
    let h = (height + 2.0 * margin).ceil() as u32;
    let alpha = (SHADOW_OPACITY * 255.0).round() as u8;

    let mut mask = RgbaImage::new(w, h);
    let (x0, y0) = (margin as u32, margin as u32);
    let (x1, y1) = ((margin + width).round() as u32, (margin + height).round() as u32);
    for y in y0..y1.min(h) {
        for x in x0..x1.min(w) {
            mask.put_pixel(x, y, Rgba([0, 0, 0, alpha]));
        }
    }
    let blurred = image::imageops::fast_blur(&mask, sigma);
    Ok((pixmap_from_rgba(&blurred)?, margin))
}
