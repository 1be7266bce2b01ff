//! Fog compositor: brightness remap plus a blended fog texture.

use std::path::{Path, PathBuf};

use image::RgbImage;
use image::imageops::{self, FilterType};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::FogError;
use crate::raster;

/// Maps an AQI to compositing parameters.
///
/// Both mappings in [`LegacyCurve`] are coarse placeholders, not a perceptual
/// model; a recalibrated curve only needs to implement this trait.
pub trait FogCurve {
    /// `(alpha, beta)` for `|pixel * alpha + beta|`.
    fn remap(&self, aqi: u32) -> (f64, f64);

    /// Weight of the photo in the photo/texture blend; the texture gets the rest.
    fn fog_opacity(&self, aqi: u32) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyCurve;

impl FogCurve for LegacyCurve {
    fn remap(&self, aqi: u32) -> (f64, f64) {
        let aqi = aqi as f64;
        (aqi / 100.0, aqi - 100.0)
    }

    fn fog_opacity(&self, aqi: u32) -> f64 {
        // Reciprocal of aqi/100 inside the log, saturating at 1.
        (100.0 / normalize_aqi(aqi) as f64 + 1.0).ln().min(1.0)
    }
}

/// AQI 0 would divide by zero in the opacity curve; treat it as 1.
pub fn normalize_aqi(aqi: u32) -> u32 {
    aqi.max(1)
}

fn saturate(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// `saturate(|src * alpha + beta|)` per channel.
pub fn convert_scale_abs(image: &RgbImage, alpha: f64, beta: f64) -> RgbImage {
    let mut out = image.clone();
    for v in out.iter_mut() {
        *v = saturate((*v as f64 * alpha + beta).abs());
    }
    out
}

/// `photo * weight + fog * (1 - weight)`; both buffers must share dimensions.
pub fn blend(photo: &RgbImage, fog: &RgbImage, weight: f64) -> RgbImage {
    let mut out = photo.clone();
    for (dst, f) in out.iter_mut().zip(fog.iter()) {
        *dst = saturate(*dst as f64 * weight + *f as f64 * (1.0 - weight));
    }
    out
}

/// Load a fog texture and stretch it (nearest neighbour) to `width`×`height`.
pub fn load_texture(path: &Path, width: u32, height: u32) -> Result<RgbImage, FogError> {
    let texture = raster::load_image(path)?;
    Ok(imageops::resize(&texture, width, height, FilterType::Nearest))
}

pub fn fogify_image(
    image: &RgbImage,
    aqi: u32,
    fog: Option<&Path>,
    curve: &impl FogCurve,
) -> Result<RgbImage, FogError> {
    let aqi = normalize_aqi(aqi);
    let (alpha, beta) = curve.remap(aqi);
    let remapped = convert_scale_abs(image, alpha, beta);

    let Some(fog) = fog else {
        return Ok(remapped);
    };
    let texture = load_texture(fog, image.width(), image.height())?;
    let opacity = curve.fog_opacity(aqi);
    debug!("Blending {} at opacity {:.3}", fog.display(), opacity);
    Ok(blend(&remapped, &texture, opacity))
}

/// Directory of interchangeable fog textures.
#[derive(Debug, Clone)]
pub struct FogLibrary {
    dir: PathBuf,
}

impl FogLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Image files in name order, so a seeded RNG picks reproducibly.
    pub fn textures(&self) -> Result<Vec<PathBuf>, FogError> {
        let io_err = |source| FogError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut textures = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
                textures.push(path);
            }
        }
        textures.sort();
        Ok(textures)
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<PathBuf, FogError> {
        self.textures()?
            .choose(rng)
            .cloned()
            .ok_or_else(|| FogError::NoFogTextures(self.dir.clone()))
    }
}
