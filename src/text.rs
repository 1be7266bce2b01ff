//! Text overlay: AQI, location and timestamp lines inside the tab.
//!
//! Text goes through usvg: strings are measured by parsing a one-element SVG
//! and reading the outline bounding box, then all lines are rendered in one
//! overlay SVG with resvg.

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use tracing::debug;
use usvg::{Tree, fontdb};

use crate::error::FogError;
use crate::raster;
use crate::severity::Severity;

pub const AQI_LABEL: &str = "AQI ";
pub const AQI_HEIGHT_FRACTION: f32 = 0.075;
pub const DETAIL_HEIGHT_FRACTION: f32 = 0.035;
pub const AQI_LINE_POSITION: f32 = 0.86;
pub const LOCATION_LINE_POSITION: f32 = 0.93625;
pub const TIMESTAMP_LINE_POSITION: f32 = 0.99;
/// Search bound for [`Typeface::find_font_size`].
pub const MAX_FONT_SIZE: u32 = 4096;

const LABEL_FILL: &str = "#ffffff";

/// Outline bounds of a string drawn with its baseline at y = 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    /// Offset of the glyph tops from the baseline (negative above it).
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone)]
pub struct Typeface {
    family: String,
    options: Arc<usvg::Options<'static>>,
}

impl Typeface {
    pub fn load(path: &Path) -> Result<Self, FogError> {
        let mut db = fontdb::Database::new();
        db.load_font_file(path).map_err(|source| FogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_database(db).ok_or_else(|| FogError::FontLoad(path.to_path_buf()))
    }

    /// Uses the database's sans-serif face if it resolves, else its first face.
    pub fn from_database(db: fontdb::Database) -> Option<Self> {
        let query = fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            ..fontdb::Query::default()
        };
        let face = db
            .query(&query)
            .and_then(|id| db.face(id))
            .or_else(|| db.faces().next())?;
        let family = face.families.first()?.0.clone();

        let mut options = usvg::Options::default();
        options.fontdb = Arc::new(db);
        Some(Self {
            family,
            options: Arc::new(options),
        })
    }

    /// A typeface that resolves no glyphs, for exercising non-text paths.
    #[cfg(test)]
    pub(crate) fn without_faces() -> Self {
        Self {
            family: String::new(),
            options: Arc::new(usvg::Options::default()),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    fn parse(&self, svg: &str) -> Result<Tree, FogError> {
        Ok(Tree::from_str(svg, &self.options)?)
    }

    pub fn measure(&self, text: &str, size: u32) -> Result<TextExtent, FogError> {
        let svg = format!(
            r#"<svg width='1' height='1' xmlns='http://www.w3.org/2000/svg'><text x='0' y='0' font-family="{}" font-size='{}'>{}</text></svg>"#,
            escape_xml(&self.family),
            size,
            escape_xml(text)
        );
        let bbox = self.parse(&svg)?.root().abs_bounding_box();
        Ok(TextExtent {
            top: bbox.y(),
            width: bbox.width(),
            height: bbox.height(),
        })
    }

    /// Largest size whose rendered height stays just under
    /// `goal_fraction * image_height`: the first size that reaches the goal,
    /// minus one (never below 1).
    pub fn find_font_size(&self, text: &str, goal_fraction: f32, image_height: u32) -> Result<u32, FogError> {
        let goal = goal_fraction * image_height as f32;
        let reaches = |size: u32| self.measure(text, size).map(|e| e.height >= goal);

        if !reaches(MAX_FONT_SIZE)? {
            return Err(FogError::FontSizeUnreachable {
                text: text.to_string(),
                goal,
            });
        }

        // Heights grow with size, so bisect for the first size reaching the goal.
        let (mut lo, mut hi) = (1, MAX_FONT_SIZE);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if reaches(mid)? {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        let size = lo.saturating_sub(1).max(1);
        debug!("Font size {} for {:?} (goal {:.1}px)", size, text, goal);
        Ok(size)
    }
}

pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// One centred line of the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLine {
    /// `(text, fill)` runs, drawn back to back.
    pub runs: Vec<(String, &'static str)>,
    pub size: u32,
    pub baseline: f32,
}

impl OverlayLine {
    /// Place a line so its glyph top sits at `(image_height - text_height) * position`.
    fn placed(runs: Vec<(String, &'static str)>, size: u32, extent: TextExtent, image_height: u32, position: f32) -> Self {
        let top = (image_height as f32 - extent.height) * position;
        OverlayLine {
            runs,
            size,
            baseline: top - extent.top,
        }
    }
}

pub fn overlay_svg(width: u32, height: u32, family: &str, lines: &[OverlayLine]) -> String {
    let mut body = String::new();
    for line in lines {
        let mut runs = line.runs.iter();
        let Some((first, _)) = runs.next() else {
            continue;
        };
        let mut content = escape_xml(first);
        for (text, fill) in runs {
            content.push_str(&format!("<tspan fill='{}'>{}</tspan>", fill, escape_xml(text)));
        }
        let fill = line.runs[0].1;
        body.push_str(&format!(
            "  <text x='{x}' y='{y:.2}' font-family=\"{family}\" font-size='{size}' text-anchor='middle' fill='{fill}'>{content}</text>\n",
            x = width as f32 / 2.0,
            y = line.baseline,
            family = escape_xml(family),
            size = line.size,
        ));
    }

    format!(
        "<svg width='{width}' height='{height}' viewBox='0 0 {width} {height}' xmlns='http://www.w3.org/2000/svg'>\n{body}</svg>"
    )
}

/// Lay out the three tab lines for an image of `height` pixels.
pub fn layout_lines(
    typeface: &Typeface,
    height: u32,
    location: &str,
    timestamp: &str,
    aqi: u32,
) -> Result<Vec<OverlayLine>, FogError> {
    let aqi_size = typeface.find_font_size(AQI_LABEL, AQI_HEIGHT_FRACTION, height)?;
    let aqi_extent = typeface.measure(AQI_LABEL, aqi_size)?;
    let mut lines = vec![OverlayLine::placed(
        vec![
            (AQI_LABEL.to_string(), LABEL_FILL),
            (aqi.to_string(), Severity::classify(aqi).hex()),
        ],
        aqi_size,
        aqi_extent,
        height,
        AQI_LINE_POSITION,
    )];

    // The timestamp shares the location's size.
    let sizing_text = if location.trim().is_empty() { timestamp } else { location };
    let detail_size = typeface.find_font_size(sizing_text, DETAIL_HEIGHT_FRACTION, height)?;

    for (text, position) in [(location, LOCATION_LINE_POSITION), (timestamp, TIMESTAMP_LINE_POSITION)] {
        if text.trim().is_empty() {
            continue;
        }
        let extent = typeface.measure(text, detail_size)?;
        lines.push(OverlayLine::placed(
            vec![(text.to_string(), LABEL_FILL)],
            detail_size,
            extent,
            height,
            position,
        ));
    }
    Ok(lines)
}

pub fn write_overlay_text(
    image: &RgbImage,
    typeface: &Typeface,
    location: &str,
    timestamp: &str,
    aqi: u32,
) -> Result<RgbImage, FogError> {
    let lines = layout_lines(typeface, image.height(), location, timestamp, aqi)?;
    let svg = overlay_svg(image.width(), image.height(), typeface.family(), &lines);
    let tree = typeface.parse(&svg)?;

    let mut pixmap = raster::to_pixmap(image)?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    Ok(raster::from_pixmap(&pixmap))
}
