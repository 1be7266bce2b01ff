use std::path::PathBuf;
use thiserror::Error;

/// Failures while producing an annotated image. Any of these aborts the render.
#[derive(Error, Debug)]
pub enum FogError {
    #[error("image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no fog textures found in {0}")]
    NoFogTextures(PathBuf),

    #[error("no usable typeface in {0}")]
    FontLoad(PathBuf),

    #[error("text {text:?} never reaches {goal:.1}px at any supported font size")]
    FontSizeUnreachable { text: String, goal: f32 },

    #[error("overlay SVG rejected: {0}")]
    Svg(#[from] usvg::Error),

    #[error("raster error: {0}")]
    Raster(&'static str),
}

/// Failures talking to the sensor network or the geocoder.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} answered with status {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("geocoder error: {0}")]
    Geocoder(String),
}
