//! Album composition: plan the page, load every photo, render, encode.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use atelier_core::album::{
    draw_order, AlbumSpec, GridLayout, Rect, BACKGROUND_RGB, JPEG_QUALITY, MAX_ROTATION_RADIANS,
    SHADOW_OFFSET,
};
use atelier_core::error::CoreError;
use atelier_core::types::ImageData;
use image::imageops::FilterType;
use image::RgbaImage;
use rand::Rng;
use resvg::tiny_skia::Transform;
use usvg::fontdb;

use crate::canvas::{frame_shadow, pixmap_from_rgba, Canvas};
use crate::encode::{encode_jpeg, JPEG_MIME};
use crate::error::AlbumError;
use crate::loader::{ImageLoader, ImageSource};
use crate::text;

const FRAME_COLOR: [u8; 4] = [255, 255, 255, 255];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Rendering settings for the compositor.
#[derive(Debug, Clone)]
pub struct AlbumConfig {
    /// Frames are rotated by a uniform angle in `[-max_rotation, max_rotation]`.
    pub max_rotation: f32,
    pub jpeg_quality: u8,
    /// Extra directory scanned for `.ttf`/`.otf`/`.ttc` fonts.
    pub font_dir: Option<PathBuf>,
}

impl Default for AlbumConfig {
    fn default() -> Self {
        Self {
            max_rotation: MAX_ROTATION_RADIANS,
            jpeg_quality: JPEG_QUALITY,
            font_dir: None,
        }
    }
}

impl AlbumConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var            | Default |
    /// |--------------------|---------|
    /// | `ATELIER_FONT_DIR` | none    |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            font_dir: lookup("ATELIER_FONT_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One photo to place: its caption (the task key) and where to load it.
#[derive(Debug, Clone)]
pub struct AlbumItem {
    pub caption: String,
    pub source: ImageSource,
}

impl AlbumItem {
    pub fn new(caption: impl Into<String>, source: impl Into<ImageSource>) -> Self {
        Self {
            caption: caption.into(),
            source: source.into(),
        }
    }
}

/// Where and how one frame lands on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Position in the input (and grid) order.
    pub index: usize,
    pub caption: String,
    /// Unrotated frame rectangle in page coordinates.
    pub frame: Rect,
    /// Rotation about the frame center, in radians.
    pub rotation: f32,
}

/// The fully resolved page: geometry plus one placement per item.
#[derive(Debug, Clone)]
pub struct AlbumPlan {
    pub spec: AlbumSpec,
    pub layout: GridLayout,
    placements: Vec<Placement>,
}

impl AlbumPlan {
    pub fn new(
        captions: Vec<String>,
        title: &str,
        subtitle: &str,
        rotations: Vec<f32>,
    ) -> Result<Self, AlbumError> {
        if captions.is_empty() {
            return Err(AlbumError::Empty);
        }
        if rotations.len() != captions.len() {
            return Err(AlbumError::Layout(CoreError::Validation(format!(
                "{} rotations for {} items",
                rotations.len(),
                captions.len()
            ))));
        }
        let spec = AlbumSpec::for_items(captions.len(), title, subtitle);
        let layout = spec.layout()?;
        let placements = captions
            .into_iter()
            .zip(rotations)
            .enumerate()
            .map(|(index, (caption, rotation))| Placement {
                index,
                caption,
                frame: layout.frame_rect(index),
                rotation,
            })
            .collect();
        Ok(Self {
            spec,
            layout,
            placements,
        })
    }

    /// Placements in grid order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Placements in paint order: last item first, so earlier items end
    /// up on top.
    pub fn draw_sequence(&self) -> impl Iterator<Item = &Placement> {
        draw_order(self.placements.len()).map(move |i| &self.placements[i])
    }
}

/// Sample `count` independent rotations uniformly from `[-max, max]`.
pub fn sample_rotations<R: Rng + ?Sized>(count: usize, max: f32, rng: &mut R) -> Vec<f32> {
    let max = max.abs();
    (0..count)
        .map(|_| {
            if max == 0.0 {
                0.0
            } else {
                rng.random_range(-max..=max)
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Compositor
// ---------------------------------------------------------------------------

/// Renders album pages. Holds the font database, which is expensive to
/// build, so create one compositor and reuse it.
pub struct AlbumCompositor {
    config: AlbumConfig,
    fonts: Arc<fontdb::Database>,
    loader: ImageLoader,
}

impl AlbumCompositor {
    /// Create a compositor with system fonts plus `config.font_dir`.
    pub fn new(config: AlbumConfig) -> Self {
        let fonts = text::load_fonts(config.font_dir.as_deref());
        Self::with_fonts(config, fonts)
    }

    /// Create a compositor with an explicit font database.
    pub fn with_fonts(config: AlbumConfig, fonts: Arc<fontdb::Database>) -> Self {
        Self {
            config,
            fonts,
            loader: ImageLoader::new(),
        }
    }

    pub fn config(&self) -> &AlbumConfig {
        &self.config
    }

    /// Compose `items` into a single JPEG page with random frame jitter.
    ///
    /// Fails without producing a page if `items` is empty or any image
    /// fails to load.
    pub async fn compose(
        &self,
        items: &[AlbumItem],
        title: &str,
        subtitle: &str,
    ) -> Result<ImageData, AlbumError> {
        let rotations = sample_rotations(items.len(), self.config.max_rotation, &mut rand::rng());
        self.compose_with_rotations(items, title, subtitle, rotations)
            .await
    }

    /// Same as [`compose`](Self::compose) with caller-chosen rotations
    /// (radians, one per item).
    pub async fn compose_with_rotations(
        &self,
        items: &[AlbumItem],
        title: &str,
        subtitle: &str,
        rotations: Vec<f32>,
    ) -> Result<ImageData, AlbumError> {
        let started = Instant::now();
        let captions = items.iter().map(|item| item.caption.clone()).collect();
        let plan = AlbumPlan::new(captions, title, subtitle, rotations)?;

        tracing::info!(items = items.len(), title = %title, "Composing album");

        let sources: Vec<ImageSource> = items.iter().map(|item| item.source.clone()).collect();
        let photos = self.loader.load_all(&sources).await?;

        let fonts = Arc::clone(&self.fonts);
        let quality = self.config.jpeg_quality;
        let bytes =
            tokio::task::spawn_blocking(move || render_page(&plan, &photos, fonts, quality))
                .await??;

        tracing::info!(
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Album composed",
        );
        Ok(ImageData::new(JPEG_MIME, bytes))
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Paint the page described by `plan` and encode it as JPEG. `photos` is
/// indexed like `plan.placements()`.
pub fn render_page(
    plan: &AlbumPlan,
    photos: &[RgbaImage],
    fonts: Arc<fontdb::Database>,
    quality: u8,
) -> Result<Vec<u8>, AlbumError> {
    let spec = &plan.spec;
    let layout = &plan.layout;

    let mut canvas = Canvas::new(spec.canvas_width, spec.canvas_height, fonts)?;
    canvas.fill(BACKGROUND_RGB);
    canvas.draw_svg(
        &text::header_svg(spec.canvas_width, spec.canvas_height, &spec.title, &spec.subtitle),
        Transform::identity(),
    )?;

    let frame = layout.frame_local();
    let (shadow, margin) = frame_shadow(layout.frame_width, layout.frame_height)?;

    for placement in plan.draw_sequence() {
        let photo = photos.get(placement.index).ok_or_else(|| {
            AlbumError::render(format!("no photo for item {}", placement.index))
        })?;
        let (cx, cy) = placement.frame.center();
        let transform = Transform::from_translate(cx, cy)
            .pre_concat(Transform::from_rotate(placement.rotation.to_degrees()));

        canvas.draw_pixmap(
            &shadow,
            transform
                .post_translate(SHADOW_OFFSET.0, SHADOW_OFFSET.1)
                .pre_translate(frame.x - margin, frame.y - margin),
        );
        canvas.fill_rect(frame, FRAME_COLOR, transform)?;

        let dest = layout.fit_photo(photo.width(), photo.height());
        let scaled = scale_to(photo, dest);
        canvas.draw_image(&pixmap_from_rgba(&scaled)?, dest, transform);

        canvas.draw_svg(
            &text::caption_svg(layout, &placement.caption),
            transform.pre_translate(frame.x, frame.y),
        )?;
    }

    encode_jpeg(&canvas.into_rgb()?, quality)
}

/// Resample `photo` close to its on-page size so the final bicubic draw
/// only has to cover sub-pixel differences.
fn scale_to(photo: &RgbaImage, dest: Rect) -> RgbaImage {
    let width = (dest.width.round() as u32).max(1);
    let height = (dest.height.round() as u32).max(1);
    if photo.dimensions() == (width, height) {
        return photo.clone();
    }
    image::imageops::resize(photo, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn captions(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("k{i}")).collect()
    }

    // -- plan --

    #[test]
    fn plan_draws_last_item_first() {
        let plan = AlbumPlan::new(captions(6), "t", "s", vec![0.0; 6]).unwrap();
        let order: Vec<usize> = plan.draw_sequence().map(|p| p.index).collect();
        assert_eq!(order, vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(plan.placements()[0].caption, "k0");
    }

    #[test]
    fn plan_uses_two_columns() {
        let plan = AlbumPlan::new(captions(5), "t", "s", vec![0.0; 5]).unwrap();
        assert_eq!(plan.spec.grid_cols, 2);
        assert_eq!(plan.spec.grid_rows, 3);
        let first = plan.placements()[0].frame;
        let second = plan.placements()[1].frame;
        assert_eq!(first.y, second.y);
        assert!(second.x > first.x);
    }

    #[test]
    fn plan_rejects_empty_input() {
        assert_matches!(
            AlbumPlan::new(Vec::new(), "t", "s", Vec::new()),
            Err(AlbumError::Empty)
        );
    }

    #[test]
    fn plan_rejects_rotation_mismatch() {
        assert_matches!(
            AlbumPlan::new(captions(2), "t", "s", vec![0.0]),
            Err(AlbumError::Layout(_))
        );
    }

    // -- rotations --

    #[test]
    fn rotations_stay_within_bound() {
        let mut rng = StdRng::seed_from_u64(7);
        let rotations = sample_rotations(1_000, MAX_ROTATION_RADIANS, &mut rng);
        assert_eq!(rotations.len(), 1_000);
        assert!(rotations
            .iter()
            .all(|r| r.abs() <= MAX_ROTATION_RADIANS));
        assert!(rotations.iter().any(|r| *r < 0.0));
        assert!(rotations.iter().any(|r| *r > 0.0));
    }

    #[test]
    fn zero_bound_means_no_rotation() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_rotations(3, 0.0, &mut rng), vec![0.0; 3]);
    }

    // -- config --

    #[test]
    fn config_reads_font_dir() {
        let config = AlbumConfig::from_lookup(|name| {
            (name == "ATELIER_FONT_DIR").then(|| "/srv/fonts".to_string())
        });
        assert_eq!(config.font_dir, Some(PathBuf::from("/srv/fonts")));
        assert_eq!(config.jpeg_quality, JPEG_QUALITY);
        assert!(AlbumConfig::from_lookup(|_| None).font_dir.is_none());
    }
}
