//! Album page geometry (pure layout math, no rasterisation).
//!
//! The compositor in `atelier-album` asks [`AlbumSpec::layout`] where every
//! polaroid frame goes and in which order to paint them. Keeping the math
//! here lets the layout rules be tested without decoding or drawing any
//! pixels.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Page constants
// ---------------------------------------------------------------------------

/// Output page width in pixels (A4-like ratio at high resolution).
pub const CANVAS_WIDTH: u32 = 2480;
/// Output page height in pixels.
pub const CANVAS_HEIGHT: u32 = 3508;
/// Number of grid columns.
pub const GRID_COLUMNS: u32 = 2;
/// Gap between cells and around the grid edge.
pub const GRID_PADDING: f32 = 100.0;
/// Vertical space reserved for the title block above the grid.
pub const HEADER_HEIGHT: f32 = 400.0;

/// Frame height as a multiple of its width.
pub const FRAME_ASPECT_RATIO: f32 = 1.2;
/// Fraction of the cell the frame may occupy.
pub const FRAME_CELL_FILL: f32 = 0.9;
/// Photo area side as a fraction of the frame width.
pub const PHOTO_FRAME_FILL: f32 = 0.9;

/// Per-item rotation is sampled uniformly from `(-MAX, MAX)` radians
/// (roughly +/- 2.9 degrees).
pub const MAX_ROTATION_RADIANS: f32 = 0.05;
/// JPEG quality of the encoded page (0-100).
pub const JPEG_QUALITY: u8 = 90;

// ---------------------------------------------------------------------------
// Typography and colours
// ---------------------------------------------------------------------------

pub const BACKGROUND_RGB: [u8; 3] = [0x1a, 0x1a, 0x1a];

pub const TITLE_BASELINE_Y: f32 = 220.0;
pub const TITLE_FONT_SIZE: f32 = 160.0;
pub const TITLE_FONT_FAMILY: &str = "'Permanent Marker', cursive";
/// Horizontal span of the title gradient as fractions of the page width.
pub const TITLE_GRADIENT_SPAN: (f32, f32) = (0.25, 0.75);
/// Retro yellow, red-pink, orange.
pub const TITLE_GRADIENT_STOPS: [(f32, &str); 3] =
    [(0.0, "#f9d423"), (0.5, "#ff4e50"), (1.0, "#fc913a")];

pub const SUBTITLE_BASELINE_Y: f32 = TITLE_BASELINE_Y + 100.0;
pub const SUBTITLE_FONT_SIZE: f32 = 70.0;
pub const SUBTITLE_FONT_FAMILY: &str = "'Caveat', cursive";
pub const SUBTITLE_COLOR: &str = "#e0e0e0";

pub const CAPTION_FONT_SIZE: f32 = 60.0;
pub const CAPTION_FONT_FAMILY: &str = TITLE_FONT_FAMILY;
pub const CAPTION_COLOR: &str = "#222222";

/// Drop shadow under each frame: black at this opacity.
pub const SHADOW_OPACITY: f32 = 0.6;
/// Canvas-style shadow blur; the Gaussian sigma is half of this.
pub const SHADOW_BLUR: f32 = 50.0;
/// Shadow offset in page (unrotated) space.
pub const SHADOW_OFFSET: (f32, f32) = (10.0, 15.0);

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        const EPS: f32 = 1e-3;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }
}

// ---------------------------------------------------------------------------
// Album spec
// ---------------------------------------------------------------------------

/// Page parameters derived for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumSpec {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub grid_cols: u32,
    pub grid_rows: u32,
    pub padding: f32,
    pub header_height: f32,
    pub title: String,
    pub subtitle: String,
}

impl AlbumSpec {
    /// Standard page for `item_count` images: two columns and
    /// `ceil(item_count / 2)` rows (at least one).
    pub fn for_items(item_count: usize, title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        let rows = item_count.div_ceil(GRID_COLUMNS as usize).max(1);
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            grid_cols: GRID_COLUMNS,
            grid_rows: u32::try_from(rows).unwrap_or(u32::MAX),
            padding: GRID_PADDING,
            header_height: HEADER_HEIGHT,
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }

    /// Resolve cell and frame sizes.
    ///
    /// Fails when the grid has no columns or rows, or when so many rows are
    /// requested that the padding leaves no room for the cells.
    pub fn layout(&self) -> Result<GridLayout, CoreError> {
        if self.grid_cols == 0 || self.grid_rows == 0 {
            return Err(CoreError::Validation(
                "Album grid must have at least one row and one column".into(),
            ));
        }
        let cols = self.grid_cols as f32;
        let rows = self.grid_rows as f32;
        let content_height = self.canvas_height as f32 - self.header_height;

        let cell_width = (self.canvas_width as f32 - self.padding * (cols + 1.0)) / cols;
        let cell_height = (content_height - self.padding * (rows + 1.0)) / rows;
        if cell_width <= 0.0 || cell_height <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Album grid {}x{} does not fit on a {}x{} page",
                self.grid_cols, self.grid_rows, self.canvas_width, self.canvas_height
            )));
        }

        let (frame_width, frame_height) = fit_frame(cell_width, cell_height);

        Ok(GridLayout {
            cols: self.grid_cols,
            rows: self.grid_rows,
            padding: self.padding,
            top: self.header_height,
            cell_width,
            cell_height,
            frame_width,
            frame_height,
            photo_side: frame_width * PHOTO_FRAME_FILL,
        })
    }
}

/// Largest frame with the fixed aspect ratio inside `FRAME_CELL_FILL` of
/// the cell: start from the full width and shrink if the height overflows.
fn fit_frame(cell_width: f32, cell_height: f32) -> (f32, f32) {
    let max_width = cell_width * FRAME_CELL_FILL;
    let max_height = cell_height * FRAME_CELL_FILL;

    let mut width = max_width;
    let mut height = width * FRAME_ASPECT_RATIO;
    if height > max_height {
        height = max_height;
        width = height / FRAME_ASPECT_RATIO;
    }
    (width, height)
}

// ---------------------------------------------------------------------------
// Grid layout
// ---------------------------------------------------------------------------

/// Resolved grid geometry. Frame-local coordinates have their origin at
/// the frame center, which is also the rotation pivot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
    pub padding: f32,
    /// Page y where the grid region begins.
    pub top: f32,
    pub cell_width: f32,
    pub cell_height: f32,
    pub frame_width: f32,
    pub frame_height: f32,
    pub photo_side: f32,
}

impl GridLayout {
    /// `(row, col)` of the item at grid index `index` (row-major).
    pub fn position(&self, index: usize) -> (u32, u32) {
        let cols = self.cols as usize;
        ((index / cols) as u32, (index % cols) as u32)
    }

    /// Page-space rectangle of a cell.
    pub fn cell_rect(&self, index: usize) -> Rect {
        let (row, col) = self.position(index);
        let (row, col) = (row as f32, col as f32);
        Rect::new(
            self.padding * (col + 1.0) + self.cell_width * col,
            self.top + self.padding * (row + 1.0) + self.cell_height * row,
            self.cell_width,
            self.cell_height,
        )
    }

    /// Page-space rectangle of a frame (before rotation), centered in its cell.
    pub fn frame_rect(&self, index: usize) -> Rect {
        let cell = self.cell_rect(index);
        Rect::new(
            cell.x + (cell.width - self.frame_width) / 2.0,
            cell.y + (cell.height - self.frame_height) / 2.0,
            self.frame_width,
            self.frame_height,
        )
    }

    /// Frame-local rectangle of the frame itself.
    pub fn frame_local(&self) -> Rect {
        Rect::new(
            -self.frame_width / 2.0,
            -self.frame_height / 2.0,
            self.frame_width,
            self.frame_height,
        )
    }

    /// Frame-local square where the photo is letterboxed. Its top margin
    /// equals the side margins.
    pub fn photo_area(&self) -> Rect {
        let margin = (self.frame_width - self.photo_side) / 2.0;
        Rect::new(
            -self.photo_side / 2.0,
            -self.frame_height / 2.0 + margin,
            self.photo_side,
            self.photo_side,
        )
    }

    /// Frame-local y of the caption's vertical middle: halfway between the
    /// photo area and the bottom of the frame.
    pub fn caption_center_y(&self) -> f32 {
        let top = self.photo_area().bottom();
        let bottom = self.frame_height / 2.0;
        top + (bottom - top) / 2.0
    }

    /// Frame-local destination for an image of `width` x `height`, scaled to
    /// fit the photo area with its own aspect ratio preserved (no cropping)
    /// and centered.
    pub fn fit_photo(&self, width: u32, height: u32) -> Rect {
        let area = self.photo_area();
        if width == 0 || height == 0 {
            return Rect::new(0.0, area.y + area.height / 2.0, 0.0, 0.0);
        }
        let aspect = width as f32 / height as f32;
        let mut draw_width = area.width;
        let mut draw_height = draw_width / aspect;
        if draw_height > area.height {
            draw_height = area.height;
            draw_width = draw_height * aspect;
        }
        Rect::new(
            -draw_width / 2.0,
            area.y + (area.height - draw_height) / 2.0,
            draw_width,
            draw_height,
        )
    }
}

/// Paint order for `item_count` items: last grid cell first, so that
/// earlier cells end up on top where jittered frames overlap.
pub fn draw_order(item_count: usize) -> impl Iterator<Item = usize> {
    (0..item_count).rev()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
