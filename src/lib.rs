//! Fogify a photo according to the local air quality.
//!
//! [`aqi`] turns nearby particulate sensors into one AQI value, and
//! [`pipeline::Fogifier`] hazes the photo accordingly and frames it with a
//! status tab showing the AQI, the place and the time.

pub mod aqi;
pub mod config;
pub mod error;
pub mod fog;
pub mod frame;
pub mod geo;
pub mod geocode;
pub mod pipeline;
pub mod raster;
pub mod severity;
pub mod text;

pub use error::{FogError, UpstreamError};
pub use pipeline::{Annotation, Fogifier, ImageSource, RenderedPair, Rendering};
pub use severity::Severity;
