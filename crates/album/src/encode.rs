use std::io::Cursor;

use atelier_core::types::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};

use crate::error::AlbumError;

pub const JPEG_MIME: &str = "image/jpeg";

/// Encode an RGB image as baseline JPEG. `quality` is 1..=100.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, AlbumError> {
    let mut buf = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode_image(image)?;
    Ok(buf.into_inner())
}

/// Return `data` as JPEG, decoding and re-encoding only when it is some
/// other format. Transparency is flattened onto white.
pub fn to_jpeg(data: &ImageData, quality: u8) -> Result<ImageData, AlbumError> {
    if data.is_jpeg() {
        return Ok(data.clone());
    }
    let decoded = image::load_from_memory(data.bytes())?;
    let rgb = flatten_on_white(decoded);
    Ok(ImageData::new(JPEG_MIME, encode_jpeg(&rgb, quality)?))
}

fn flatten_on_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| ((c as u16 * a as u16 + 255 * (255 - a as u16) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}
