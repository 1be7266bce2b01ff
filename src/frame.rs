//! Colored frame and the frosted status tab at the bottom of the photo.
//!
//! The tab is built in three passes over the bordered photo:
//!
//! 1. the tab region is cropped, Gaussian-blurred and pasted back through a
//!    rounded-rectangle stencil, so the corners outside the stencil stay sharp;
//! 2. a dark scrim covers the whole blurred region;
//! 3. two band-colored layers (translucent, then opaque) cover progressively
//!    shorter slices at the bottom.

use image::imageops;
use image::{Rgb, RgbImage};
use tiny_skia::{FillRule, Mask, MaskType, Pixmap, PixmapPaint, Rect, Transform};
use tracing::debug;

use crate::error::FogError;
use crate::raster::{self, quarter_disc_path, rounded_rect_path, solid_paint};
use crate::severity::Severity;

pub const BORDER: u32 = 5;
pub const BLUR_SIGMA: f32 = 5.0;
pub const CORNER_RADIUS: u32 = 10;

const MIN_HEIGHT_FACTOR: f32 = 0.775;
const TRANSLUCENT_LAYER_TOP: f32 = 0.9;
const OPAQUE_LAYER_TOP: f32 = 0.95;
const SCRIM: [u8; 3] = [0, 0, 0];
const HALF_ALPHA: u8 = 127;
const STENCIL_FILL: [u8; 3] = [50, 50, 50];

/// Tab rectangle in bordered-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TabGeometry {
    pub left: f32,
    pub right: f32,
    /// Top of the blurred region: `bottom * height_factor`.
    pub top: f32,
    pub bottom: f32,
    pub height_factor: f32,
}

impl TabGeometry {
    /// Portrait photos get a wide tab (20%–80%), landscape a narrow one (35%–65%).
    pub fn compute(width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let height_factor = (1.0 - h / w).max(MIN_HEIGHT_FACTOR);
        let (left_frac, right_frac) = if width < height { (0.2, 0.8) } else { (0.35, 0.65) };

        // Nudge both edges outward by a pixel when their integer part is odd.
        let odd = |v: f32| if (v as u32) % 2 == 1 { 1.0 } else { 0.0 };
        let left = w * left_frac;
        let right = w * right_frac;
        TabGeometry {
            left: left - odd(left),
            right: right + odd(right),
            top: h * height_factor,
            bottom: h,
            height_factor,
        }
    }

    /// Integer crop box `(x, y, width, height)` clamped to the image.
    pub fn crop_box(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x0 = (self.left.round().max(0.0) as u32).min(width);
        let y0 = (self.top.round().max(0.0) as u32).min(height);
        let x1 = (self.right.round() as u32).clamp(x0, width);
        let y1 = (self.bottom.round() as u32).clamp(y0, height);
        (x0, y0, x1 - x0, y1 - y0)
    }

    fn layer_rect(&self, top: f32) -> Option<Rect> {
        Rect::from_ltrb(self.left, top, self.right, self.bottom)
    }

    pub fn blur_rect(&self) -> Option<Rect> {
        self.layer_rect(self.top)
    }
}

/// Surround `image` with a `border`-pixel solid frame.
pub fn add_border(image: &RgbImage, border: u32, rgb: [u8; 3]) -> RgbImage {
    let mut framed = RgbImage::from_pixel(
        image.width() + 2 * border,
        image.height() + 2 * border,
        Rgb(rgb),
    );
    imageops::replace(&mut framed, image, border as i64, border as i64);
    framed
}

/// Alpha stencil of a `width`×`height` rounded rectangle.
///
/// Assembled from one quarter-disc corner stamped at four quarter turns, plus
/// the two straps joining them.
pub fn rounded_rect_mask(width: u32, height: u32, radius: u32) -> Result<Mask, FogError> {
    let mut stencil = Pixmap::new(width, height).ok_or(FogError::Raster("empty tab mask"))?;
    let paint = solid_paint(STENCIL_FILL, 255);
    let r = radius.min(width / 2).min(height / 2);
    let (mx, my, rf) = (width as f32, height as f32, r as f32);

    if r > 0 {
        let mut corner = Pixmap::new(r, r).ok_or(FogError::Raster("empty mask corner"))?;
        let disc = quarter_disc_path(rf).ok_or(FogError::Raster("degenerate mask corner"))?;
        corner.fill_path(&disc, &paint, FillRule::Winding, Transform::identity(), None);

        // Quarter turns counter-clockwise; tiny-skia angles turn clockwise.
        let stamps = [(0.0, 0.0, 0.0), (90.0, 0.0, my - rf), (180.0, mx - rf, my - rf), (270.0, mx - rf, 0.0)];
        for (turn, x, y) in stamps {
            let transform = Transform::from_rotate_at(-turn, rf / 2.0, rf / 2.0).post_translate(x, y);
            stencil.draw_pixmap(0, 0, corner.as_ref(), &PixmapPaint::default(), transform, None);
        }
    }

    for strap in [Rect::from_ltrb(rf, 0.0, mx - rf, my), Rect::from_ltrb(0.0, rf, mx, my - rf)]
        .into_iter()
        .flatten()
    {
        stencil.fill_rect(strap, &paint, Transform::identity(), None);
    }

    Ok(Mask::from_pixmap(stencil.as_ref(), MaskType::Alpha))
}

/// Blur the tab region of `canvas` in place, limited to the rounded stencil.
fn blur_tab_region(canvas: &mut Pixmap, framed: &RgbImage, tab: &TabGeometry) -> Result<(), FogError> {
    let (x, y, w, h) = tab.crop_box(framed.width(), framed.height());
    if w == 0 || h == 0 {
        return Ok(());
    }

    let crop = imageops::crop_imm(framed, x, y, w, h).to_image();
    let blurred = imageops::blur(&crop, BLUR_SIGMA);

    let mut patch = raster::to_pixmap(&crop)?;
    let mask = rounded_rect_mask(w, h, CORNER_RADIUS)?;
    patch.draw_pixmap(
        0,
        0,
        raster::to_pixmap(&blurred)?.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        Some(&mask),
    );
    // The patch is opaque, so drawing it replaces the region.
    canvas.draw_pixmap(
        x as i32,
        y as i32,
        patch.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Ok(())
}

fn fill_rounded(canvas: &mut Pixmap, rect: Option<Rect>, rgb: [u8; 3], alpha: u8) {
    let Some(path) = rect.and_then(|r| rounded_rect_path(r, CORNER_RADIUS as f32)) else {
        return;
    };
    canvas.fill_path(
        &path,
        &solid_paint(rgb, alpha),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
}

/// Frame `image` in its severity color and draw the status tab.
pub fn add_frame_and_tab(image: &RgbImage, aqi: u32) -> Result<RgbImage, FogError> {
    let severity = Severity::classify(aqi);
    let rgb = severity.rgb();

    let framed = add_border(image, BORDER, rgb);
    let tab = TabGeometry::compute(framed.width(), framed.height());
    debug!("Tab for {}x{} ({}): {:?}", framed.width(), framed.height(), severity.name(), tab);

    let mut canvas = raster::to_pixmap(&framed)?;
    blur_tab_region(&mut canvas, &framed, &tab)?;

    fill_rounded(&mut canvas, tab.blur_rect(), SCRIM, HALF_ALPHA);
    fill_rounded(&mut canvas, tab.layer_rect(tab.bottom * TRANSLUCENT_LAYER_TOP), rgb, HALF_ALPHA);
    fill_rounded(&mut canvas, tab.layer_rect(tab.bottom * OPAQUE_LAYER_TOP), rgb, 255);

    Ok(raster::from_pixmap(&canvas))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_alpha(mask: &Mask, x: u32, y: u32) -> u8 {
        mask.data()[(y * mask.width() + x) as usize]
    }

    #[test]
    fn test_portrait_geometry() {
        let tab = TabGeometry::compute(100, 200);
        assert_eq!(tab.left, 20.0);
        assert_eq!(tab.right, 80.0);
        assert_eq!(tab.height_factor, MIN_HEIGHT_FACTOR);
        assert!((tab.top - 155.0).abs() < 1e-3);
        assert_eq!(tab.bottom, 200.0);
    }

    #[test]
    fn test_landscape_geometry_and_odd_nudge() {
        let tab = TabGeometry::compute(201, 100);
        assert!((tab.left - 70.35).abs() < 1e-3);
        assert!((tab.right - 130.65).abs() < 1e-3);

        // 23.4 and 93.6 have odd integer parts.
        let tab = TabGeometry::compute(117, 300);
        assert!((tab.left - 22.4).abs() < 1e-3);
        assert!((tab.right - 94.6).abs() < 1e-3);
    }

    #[test]
    fn test_height_factor_bounds() {
        assert!((TabGeometry::compute(1000, 100).height_factor - 0.9).abs() < 1e-6);
        for (w, h) in [(1, 1), (10, 3000), (3000, 10), (640, 480), (480, 640)] {
            let f = TabGeometry::compute(w, h).height_factor;
            assert!((MIN_HEIGHT_FACTOR..=1.0).contains(&f), "{w}x{h}: {f}");
        }
    }

    #[test]
    fn test_crop_box_is_clamped() {
        let tab = TabGeometry::compute(110, 210);
        let (x, y, w, h) = tab.crop_box(110, 210);
        assert_eq!((x, w), (22, 66));
        assert_eq!(y + h, 210);
    }

    #[test]
    fn test_rounded_mask_shape() {
        let mask = rounded_rect_mask(60, 40, 10).unwrap();
        assert_eq!(mask_alpha(&mask, 0, 0), 0);
        assert_eq!(mask_alpha(&mask, 59, 0), 0);
        assert_eq!(mask_alpha(&mask, 0, 39), 0);
        assert_eq!(mask_alpha(&mask, 59, 39), 0);
        assert_eq!(mask_alpha(&mask, 30, 0), 255);
        assert_eq!(mask_alpha(&mask, 0, 20), 255);
        assert_eq!(mask_alpha(&mask, 30, 20), 255);
        // Inside each corner disc, near the centre of the arc.
        assert_eq!(mask_alpha(&mask, 6, 6), 255);
        assert_eq!(mask_alpha(&mask, 53, 33), 255);
    }

    #[test]
    fn test_mask_radius_clamps_to_small_rects() {
        let mask = rounded_rect_mask(6, 4, 10).unwrap();
        assert_eq!(mask.width(), 6);
        assert_eq!(mask_alpha(&mask, 3, 2), 255);
        assert!(rounded_rect_mask(0, 4, 10).is_err());
    }

    #[test]
    fn test_tab_blur_is_stenciled() {
        let framed = RgbImage::from_fn(110, 210, |x, y| {
            if (x + y) % 2 == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        let tab = TabGeometry::compute(110, 210);
        let (x, y, w, h) = tab.crop_box(110, 210);
        let mut canvas = raster::to_pixmap(&framed).unwrap();
        blur_tab_region(&mut canvas, &framed, &tab).unwrap();
        let out = raster::from_pixmap(&canvas);

        // Crop corners lie outside the rounded stencil and stay sharp.
        for (cx, cy) in [(x, y), (x + w - 1, y), (x, y + h - 1), (x + w - 1, y + h - 1)] {
            assert_eq!(out.get_pixel(cx, cy), framed.get_pixel(cx, cy), "corner {cx},{cy}");
        }
        // Just outside the crop box nothing changes.
        assert_eq!(out.get_pixel(x - 1, y + h / 2), framed.get_pixel(x - 1, y + h / 2));
        assert_eq!(out.get_pixel(x + w / 2, y - 1), framed.get_pixel(x + w / 2, y - 1));
        // The interior averages the checkerboard toward mid gray.
        for (cx, cy) in [(x + w / 2, y + h / 2), (x + w / 2 + 1, y + h / 2)] {
            let p = out.get_pixel(cx, cy);
            assert!((100..=155).contains(&p[0]), "centre {cx},{cy}: {p:?}");
        }
    }

    #[test]
    fn test_border_color() {
        let image = RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]));
        let framed = add_border(&image, BORDER, [9, 9, 9]);
        assert_eq!(framed.dimensions(), (14, 13));
        assert_eq!(framed.get_pixel(0, 0), &Rgb([9, 9, 9]));
        assert_eq!(framed.get_pixel(5, 5), &Rgb([1, 2, 3]));
        assert_eq!(framed.get_pixel(9, 8), &Rgb([9, 9, 9]));
    }

    #[test]
    fn test_frame_and_tab_colors() {
        let image = RgbImage::from_pixel(100, 200, Rgb([128, 128, 128]));
        let out = add_frame_and_tab(&image, 45).unwrap();
        let good = Rgb(Severity::Good.rgb());

        assert_eq!(out.dimensions(), (110, 210));
        assert_eq!(out.get_pixel(0, 0), &good);
        // Opaque layer above the bottom border.
        assert_eq!(out.get_pixel(55, 202), &good);
        // Outside the tab the photo is untouched.
        assert_eq!(out.get_pixel(8, 100), &Rgb([128, 128, 128]));
        // The scrim darkens the upper part of the tab.
        let scrimmed = out.get_pixel(55, 170);
        assert!(scrimmed[0] < 128, "{scrimmed:?}");
    }

    #[test]
    fn test_hazard_frame() {
        let image = RgbImage::from_pixel(30, 20, Rgb([255, 255, 255]));
        let out = add_frame_and_tab(&image, 420).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb(Severity::Hazard.rgb()));
    }
}
