//! Glue between `image` buffers and `tiny-skia` pixmaps, plus path helpers.

use std::path::Path as FsPath;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tiny_skia::{IntSize, Paint, Path, PathBuilder, Pixmap, Rect};

use crate::error::FogError;

/// Cubic Bézier control distance for a quarter circle of radius 1.
pub const KAPPA: f32 = 0.552_284_8;

/// Decode an encoded photo (JPEG, PNG, ...) into 8-bit RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, FogError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

pub fn load_image(path: &FsPath) -> Result<RgbImage, FogError> {
    let bytes = std::fs::read(path).map_err(|source| FogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_image(&bytes)
}

/// Encode as baseline JPEG for transport.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, FogError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(image)?;
    Ok(bytes)
}

/// Opaque RGBA copy of `image`. Opaque pixels are identical premultiplied or not.
pub fn to_pixmap(image: &RgbImage) -> Result<Pixmap, FogError> {
    let size = IntSize::from_wh(image.width(), image.height())
        .ok_or(FogError::Raster("image has no pixels"))?;
    let mut data = Vec::with_capacity(image.as_raw().len() / 3 * 4);
    for p in image.pixels() {
        data.extend_from_slice(&[p[0], p[1], p[2], 255]);
    }
    Pixmap::from_vec(data, size).ok_or(FogError::Raster("pixmap buffer size mismatch"))
}

/// RGB copy of `pixmap`, dropping alpha.
pub fn from_pixmap(pixmap: &Pixmap) -> RgbImage {
    let mut out = RgbImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgb([c.red(), c.green(), c.blue()]);
    }
    out
}

pub fn solid_paint(rgb: [u8; 3], alpha: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgb[0], rgb[1], rgb[2], alpha);
    paint.anti_alias = true;
    paint
}

/// Rectangle with circular corners; `radius` shrinks to fit small rectangles.
pub fn rounded_rect_path(rect: Rect, radius: f32) -> Option<Path> {
    let r = radius.min(rect.width() / 2.0).min(rect.height() / 2.0).max(0.0);
    let c = r * (1.0 - KAPPA);
    let (l, t, rt, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());

    let mut pb = PathBuilder::new();
    pb.move_to(l + r, t);
    pb.line_to(rt - r, t);
    pb.cubic_to(rt - c, t, rt, t + c, rt, t + r);
    pb.line_to(rt, b - r);
    pb.cubic_to(rt, b - c, rt - c, b, rt - r, b);
    pb.line_to(l + r, b);
    pb.cubic_to(l + c, b, l, b - c, l, b - r);
    pb.line_to(l, t + r);
    pb.cubic_to(l, t + c, l + c, t, l + r, t);
    pb.close();
    pb.finish()
}

/// Filled quarter disc centred on `(radius, radius)` covering the top-left quadrant.
pub fn quarter_disc_path(radius: f32) -> Option<Path> {
    let c = radius * (1.0 - KAPPA);
    let mut pb = PathBuilder::new();
    pb.move_to(radius, radius);
    pb.line_to(0.0, radius);
    pb.cubic_to(0.0, c, c, 0.0, radius, 0.0);
    pb.close();
    pb.finish()
}
