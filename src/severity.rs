//! Pollution classifier: AQI value to severity band and display color.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Good,
    Mild,
    UnhealthySens,
    Unhealthy,
    UnhealthyVery,
    Hazard,
}

/// One row of the band table. `upper` is exclusive; `None` means unbounded.
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub severity: Severity,
    pub lower: u32,
    pub upper: Option<u32>,
    pub rgb: [u8; 3],
    pub hex: &'static str,
}

pub const BANDS: [Band; 6] = [
    Band { severity: Severity::Good, lower: 0, upper: Some(51), rgb: [62, 189, 17], hex: "#3ebd11" },
    Band { severity: Severity::Mild, lower: 51, upper: Some(101), rgb: [227, 220, 51], hex: "#e3dc33" },
    Band { severity: Severity::UnhealthySens, lower: 101, upper: Some(151), rgb: [224, 129, 17], hex: "#e08111" },
    Band { severity: Severity::Unhealthy, lower: 151, upper: Some(201), rgb: [209, 0, 0], hex: "#d10000" },
    Band { severity: Severity::UnhealthyVery, lower: 201, upper: Some(301), rgb: [118, 21, 134], hex: "#761586" },
    Band { severity: Severity::Hazard, lower: 301, upper: None, rgb: [78, 0, 0], hex: "#4e0000" },
];

impl Severity {
    pub fn classify(aqi: u32) -> Self {
        BANDS
            .iter()
            .find(|band| band.upper.is_none_or(|upper| aqi < upper))
            .map(|band| band.severity)
            .unwrap_or(Severity::Hazard)
    }

    pub fn band(self) -> &'static Band {
        // BANDS is declared in enum order.
        &BANDS[self as usize]
    }

    pub fn rgb(self) -> [u8; 3] {
        self.band().rgb
    }

    pub fn hex(self) -> &'static str {
        self.band().hex
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Good => "good",
            Severity::Mild => "mild",
            Severity::UnhealthySens => "unhealthy_sens",
            Severity::Unhealthy => "unhealthy",
            Severity::UnhealthyVery => "unhealthy_very",
            Severity::Hazard => "hazard",
        }
    }
}
