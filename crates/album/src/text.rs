//! Text on the album page, rendered as small SVG documents through
//! `usvg`/`resvg` so layout and font fallback come from the same engine.

use std::path::Path;
use std::sync::Arc;

use atelier_core::album::{
    GridLayout, CAPTION_COLOR, CAPTION_FONT_FAMILY, CAPTION_FONT_SIZE, SUBTITLE_BASELINE_Y,
    SUBTITLE_COLOR, SUBTITLE_FONT_FAMILY, SUBTITLE_FONT_SIZE, TITLE_BASELINE_Y,
    TITLE_FONT_FAMILY, TITLE_FONT_SIZE, TITLE_GRADIENT_SPAN, TITLE_GRADIENT_STOPS,
};
use usvg::fontdb;

use crate::error::AlbumError;

// ---------------------------------------------------------------------------
// Fonts
// ---------------------------------------------------------------------------

/// Build the font database: system fonts plus any `.ttf`/`.otf`/`.ttc`
/// files directly inside `font_dir`.
pub fn load_fonts(font_dir: Option<&Path>) -> Arc<fontdb::Database> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(dir) = font_dir {
        load_fonts_from_dir(&mut db, dir);
    }
    tracing::debug!(faces = db.len(), "Font database ready");
    Arc::new(db)
}

fn load_fonts_from_dir(db: &mut fontdb::Database, dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "Font directory is not readable");
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        let is_font = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
            .unwrap_or(false);
        if is_font && path.is_file() {
            if let Err(e) = db.load_font_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable font");
            }
        }
    }
}

/// Font resolver that falls back to any available face when none of the
/// requested families exist, so text still renders with whatever fonts
/// the host has.
fn font_resolver() -> usvg::FontResolver<'static> {
    let select = usvg::FontResolver::default_font_selector();
    usvg::FontResolver {
        select_font: Box::new(move |font, db| {
            select(font, db).or_else(|| db.faces().next().map(|face| face.id))
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

/// Parse an SVG document with the given fonts.
pub fn parse_svg(svg: &str, fonts: &Arc<fontdb::Database>) -> Result<usvg::Tree, AlbumError> {
    let options = usvg::Options {
        fontdb: Arc::clone(fonts),
        font_resolver: font_resolver(),
        ..Default::default()
    };
    usvg::Tree::from_data(svg.as_bytes(), &options)
        .map_err(|e| AlbumError::render(format!("invalid text layer: {e}")))
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Escape text for use inside SVG character data or attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Page header: the title with a horizontal gradient across the middle
/// half of the page, and the subtitle below it, both centered.
pub fn header_svg(page_width: u32, page_height: u32, title: &str, subtitle: &str) -> String {
    let center = page_width as f32 / 2.0;
    let x1 = page_width as f32 * TITLE_GRADIENT_SPAN.0;
    let x2 = page_width as f32 * TITLE_GRADIENT_SPAN.1;
    let stops: String = TITLE_GRADIENT_STOPS
        .iter()
        .map(|(offset, color)| format!(r#"<stop offset="{offset}" stop-color="{color}"/>"#))
        .collect();

    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<defs><linearGradient id="title" gradientUnits="userSpaceOnUse" x1="{x1}" y1="0" x2="{x2}" y2="0">{stops}</linearGradient></defs>"#,
            r#"<text x="{cx}" y="{ty}" text-anchor="middle" font-family="{tf}" font-size="{ts}" fill="url(#title)">{title}</text>"#,
            r#"<text x="{cx}" y="{sy}" text-anchor="middle" font-family="{sf}" font-size="{ss}" fill="{sc}">{subtitle}</text>"#,
            "</svg>"
        ),
        w = page_width,
        h = page_height,
        x1 = x1,
        x2 = x2,
        stops = stops,
        cx = center,
        ty = TITLE_BASELINE_Y,
        tf = TITLE_FONT_FAMILY,
        ts = TITLE_FONT_SIZE,
        title = escape_xml(title),
        sy = SUBTITLE_BASELINE_Y,
        sf = SUBTITLE_FONT_FAMILY,
        ss = SUBTITLE_FONT_SIZE,
        sc = SUBTITLE_COLOR,
        subtitle = escape_xml(subtitle),
    )
}

/// Caption for one frame, in a document the size of the frame. The frame
/// center is the document center, so frame-local `y` maps to
/// `y + height / 2`.
pub fn caption_svg(layout: &GridLayout, caption: &str) -> String {
    let width = layout.frame_width;
    let height = layout.frame_height;
    let y = layout.caption_center_y() + height / 2.0;
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<text x="{cx}" y="{y}" text-anchor="middle" dominant-baseline="central" font-family="{f}" font-size="{s}" fill="{c}">{caption}</text>"#,
            "</svg>"
        ),
        w = width,
        h = height,
        cx = width / 2.0,
        y = y,
        f = CAPTION_FONT_FAMILY,
        s = CAPTION_FONT_SIZE,
        c = CAPTION_COLOR,
        caption = escape_xml(caption),
    )
}

#[cfg(test)]
mod tests {
    use atelier_core::album::AlbumSpec;

    use super::*;

    fn empty_fonts() -> Arc<fontdb::Database> {
        Arc::new(fontdb::Database::new())
    }

    #[test]
    fn escape_handles_markup() {
        assert_eq!(escape_xml("Tom & <Jerry>"), "Tom &amp; &lt;Jerry&gt;");
        assert_eq!(escape_xml(r#"say "hi" it's"#), "say &quot;hi&quot; it&apos;s");
        assert_eq!(escape_xml("1950s"), "1950s");
    }

    #[test]
    fn header_document_parses() {
        let svg = header_svg(2480, 3508, "Rock & Roll <Years>", "Six decades");
        assert!(svg.contains("Rock &amp; Roll &lt;Years&gt;"));
        assert!(svg.contains(r#"x1="620""#));
        assert!(svg.contains(r#"x2="1860""#));
        let tree = parse_svg(&svg, &empty_fonts()).unwrap();
        assert_eq!(tree.size().width(), 2480.0);
    }

    #[test]
    fn caption_document_is_frame_sized() {
        let layout = AlbumSpec::for_items(6, "t", "s").layout().unwrap();
        let svg = caption_svg(&layout, "1970s");
        assert!(svg.contains(">1970s</text>"));
        assert!(svg.contains(r#"dominant-baseline="central""#));
        let tree = parse_svg(&svg, &empty_fonts()).unwrap();
        assert!((tree.size().width() - layout.frame_width).abs() < 0.5);
        assert!((tree.size().height() - layout.frame_height).abs() < 0.5);
    }

    #[test]
    fn missing_font_dir_is_tolerated() {
        let fonts = load_fonts(Some(Path::new("/definitely/not/a/font/dir")));
        assert!(Arc::strong_count(&fonts) == 1);
    }
}
