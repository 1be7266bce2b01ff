//! Orchestrates load → [fog] → frame & tab → text.

use std::path::Path;

use image::RgbImage;
use rand::Rng;
use tracing::info;

use crate::error::FogError;
use crate::fog::{self, FogCurve, FogLibrary, LegacyCurve};
use crate::frame;
use crate::raster;
use crate::text::{self, Typeface};

#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

impl ImageSource<'_> {
    pub fn load(self) -> Result<RgbImage, FogError> {
        match self {
            ImageSource::Path(path) => raster::load_image(path),
            ImageSource::Bytes(bytes) => raster::decode_image(bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering {
    /// Frame, tab and text only.
    Original,
    /// Fogged with a random texture before framing.
    Processed,
}

/// What the tab says.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub location: String,
    pub timestamp: String,
    pub aqi: u32,
}

/// Both renderings of one photo.
#[derive(Debug, Clone)]
pub struct RenderedPair {
    pub processed: RgbImage,
    pub original: RgbImage,
}

pub struct Fogifier<C = LegacyCurve> {
    typeface: Typeface,
    fogs: FogLibrary,
    curve: C,
}

impl Fogifier<LegacyCurve> {
    pub fn new(typeface: Typeface, fogs: FogLibrary) -> Self {
        Self::with_curve(typeface, fogs, LegacyCurve)
    }
}

impl<C: FogCurve> Fogifier<C> {
    pub fn with_curve(typeface: Typeface, fogs: FogLibrary, curve: C) -> Self {
        Self { typeface, fogs, curve }
    }

    pub fn process_image<R: Rng + ?Sized>(
        &self,
        source: ImageSource<'_>,
        annotation: &Annotation,
        rendering: Rendering,
        rng: &mut R,
    ) -> Result<RgbImage, FogError> {
        let raw = source.load()?;
        self.render(raw, annotation, rendering, rng)
    }

    fn render<R: Rng + ?Sized>(
        &self,
        raw: RgbImage,
        annotation: &Annotation,
        rendering: Rendering,
        rng: &mut R,
    ) -> Result<RgbImage, FogError> {
        let base = match rendering {
            Rendering::Original => raw,
            Rendering::Processed => {
                let texture = self.fogs.choose(rng)?;
                info!("Fogging with {}", texture.display());
                fog::fogify_image(&raw, annotation.aqi, Some(&texture), &self.curve)?
            }
        };

        let framed = frame::add_frame_and_tab(&base, annotation.aqi)?;
        text::write_overlay_text(
            &framed,
            &self.typeface,
            &annotation.location.to_uppercase(),
            &annotation.timestamp,
            annotation.aqi,
        )
    }

    /// Render both variants, decoding the photo once.
    ///
    /// Without an AQI reading nothing is loaded or rendered and `Ok(None)` is
    /// returned.
    pub fn render_pair<R: Rng + ?Sized>(
        &self,
        source: ImageSource<'_>,
        location: &str,
        timestamp: &str,
        aqi: Option<u32>,
        rng: &mut R,
    ) -> Result<Option<RenderedPair>, FogError> {
        let Some(aqi) = aqi else {
            info!("No AQI reading, skipping image processing");
            return Ok(None);
        };
        let annotation = Annotation {
            location: location.to_string(),
            timestamp: timestamp.to_string(),
            aqi,
        };
        self.render_both(source, &annotation, rng).map(Some)
    }

    /// Processed and original renderings of a photo with a known AQI.
    pub fn render_both<R: Rng + ?Sized>(
        &self,
        source: ImageSource<'_>,
        annotation: &Annotation,
        rng: &mut R,
    ) -> Result<RenderedPair, FogError> {
        let raw = source.load()?;
        let processed = self.render(raw.clone(), annotation, Rendering::Processed, rng)?;
        let original = self.render(raw, annotation, Rendering::Original, rng)?;
        Ok(RenderedPair { processed, original })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;
    use crate::text::tests::system_typeface;
    use image::Rgb;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fog_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(10, 10, Rgb([230, 230, 230]))
            .save(dir.path().join("haze.png"))
            .unwrap();
        dir
    }

    fn annotation(aqi: u32) -> Annotation {
        Annotation {
            location: "Zagreb".to_string(),
            timestamp: "18/10 12:00".to_string(),
            aqi,
        }
    }

    #[test]
    fn test_missing_aqi_skips_processing() {
        let fogifier = Fogifier::new(Typeface::without_faces(), FogLibrary::new("/nonexistent"));
        let result = fogifier
            .render_pair(
                ImageSource::Path(Path::new("/nonexistent/photo.jpg")),
                "Zagreb",
                "18/10 12:00",
                None,
                &mut StdRng::seed_from_u64(0),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_good_air_end_to_end() {
        let Some(typeface) = system_typeface() else { return };
        let fogs = fog_dir();
        let fogifier = Fogifier::new(typeface, FogLibrary::new(fogs.path()));
        let photo = RgbImage::from_pixel(120, 200, Rgb([40, 90, 160]));
        let jpeg = raster::encode_jpeg(&photo, 95).unwrap();

        let pair = fogifier
            .render_pair(
                ImageSource::Bytes(&jpeg),
                "Zagreb",
                "18/10 12:00",
                Some(45),
                &mut StdRng::seed_from_u64(3),
            )
            .unwrap()
            .unwrap();

        let good = Rgb(Severity::Good.rgb());
        for image in [&pair.processed, &pair.original] {
            assert_eq!(image.dimensions(), (130, 210));
            assert_eq!(image.get_pixel(0, 0), &good);
            assert_eq!(image.get_pixel(129, 209), &good);
        }
        // Fog changes the photo area; the original keeps it.
        assert_ne!(pair.processed.get_pixel(20, 20), pair.original.get_pixel(20, 20));
    }

    #[test]
    fn test_zero_aqi_processed() {
        let Some(typeface) = system_typeface() else { return };
        let fogs = fog_dir();
        let fogifier = Fogifier::new(typeface, FogLibrary::new(fogs.path()));
        let photo_dir = tempfile::tempdir().unwrap();
        let photo_path = photo_dir.path().join("photo.png");
        RgbImage::from_pixel(200, 120, Rgb([10, 20, 30])).save(&photo_path).unwrap();

        let out = fogifier
            .process_image(
                ImageSource::Path(&photo_path),
                &annotation(0),
                Rendering::Processed,
                &mut StdRng::seed_from_u64(9),
            )
            .unwrap();
        assert_eq!(out.dimensions(), (210, 130));
    }

    #[test]
    fn test_undecodable_photo_aborts() {
        let fogifier = Fogifier::new(Typeface::without_faces(), FogLibrary::new("/nonexistent"));
        let result = fogifier.process_image(
            ImageSource::Bytes(b"not an image"),
            &annotation(80),
            Rendering::Original,
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(FogError::Image(_))));
    }

    #[test]
    fn test_pair_of_undecodable_photo_aborts() {
        let fogifier = Fogifier::new(Typeface::without_faces(), FogLibrary::new("/nonexistent"));
        let result = fogifier.render_both(
            ImageSource::Bytes(b"\x89PNG truncated"),
            &annotation(120),
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(FogError::Image(_))));
    }

    #[test]
    fn test_processed_without_textures_aborts() {
        let empty = tempfile::tempdir().unwrap();
        let fogifier = Fogifier::new(Typeface::without_faces(), FogLibrary::new(empty.path()));
        let photo = raster::encode_jpeg(&RgbImage::from_pixel(20, 20, Rgb([0, 0, 0])), 90).unwrap();
        let result = fogifier.process_image(
            ImageSource::Bytes(&photo),
            &annotation(80),
            Rendering::Processed,
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(FogError::NoFogTextures(_))));
    }
}
