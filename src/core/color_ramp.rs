//! Piecewise-linear color ramps for single-band tiles.

use crate::types::{RasterError, RasterResult};
use serde::Serialize;
use std::collections::HashMap;

/// 8-bit RGB triple
pub type Rgb = [u8; 3];

/// Ordered (stop, color) breakpoints spanning [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorRamp {
    pub label: String,
    pub description: String,
    stops: Vec<f64>,
    colors: Vec<Rgb>,
}

impl ColorRamp {
    /// Stops must be strictly increasing from exactly 0.0 to exactly 1.0
    pub fn new(stops: Vec<f64>, colors: Vec<Rgb>) -> RasterResult<Self> {
        if stops.len() < 2 || stops.len() != colors.len() {
            return Err(RasterError::Config(format!(
                "color ramp needs at least 2 stops with one color each, got {} stops and {} colors",
                stops.len(),
                colors.len()
            )));
        }
        if stops[0] != 0.0 || stops[stops.len() - 1] != 1.0 {
            return Err(RasterError::Config(format!(
                "color ramp stops must span [0, 1], got [{}, {}]",
                stops[0],
                stops[stops.len() - 1]
            )));
        }
        if stops.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(RasterError::Config(format!(
                "color ramp stops must be strictly increasing: {:?}",
                stops
            )));
        }

        Ok(Self {
            label: String::new(),
            description: String::new(),
            stops,
            colors,
        })
    }

    pub fn with_label(mut self, label: &str, description: &str) -> Self {
        self.label = label.to_string();
        self.description = description.to_string();
        self
    }

    pub fn stops(&self) -> &[f64] {
        &self.stops
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// Color at normalized position `t`, clamped to [0, 1]. NaN maps to black.
    pub fn color_at(&self, t: f64) -> Rgb {
        if t.is_nan() {
            return [0, 0, 0];
        }
        let t = t.clamp(0.0, 1.0);

        // bracket [stop_i, stop_i+1), the last one closed on both ends
        let last = self.stops.len() - 2;
        let i = self.stops.partition_point(|&s| s <= t).saturating_sub(1).min(last);
        let (s0, s1) = (self.stops[i], self.stops[i + 1]);
        let (c0, c1) = (self.colors[i], self.colors[i + 1]);
        let ratio = ((t - s0) / (s1 - s0)).clamp(0.0, 1.0);

        let mut rgb = [0u8; 3];
        for channel in 0..3 {
            let a = c0[channel] as f64;
            let b = c1[channel] as f64;
            // truncated toward zero, as an 8-bit channel store does
            rgb[channel] = (a + (b - a) * ratio).floor().clamp(0.0, 255.0) as u8;
        }
        rgb
    }
}

/// Named color ramps, built once and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct ColorRampTable {
    ramps: HashMap<String, ColorRamp>,
}

impl ColorRampTable {
    /// Empty table, to be filled with [`ColorRampTable::insert`] during setup
    pub fn new() -> Self {
        Self::default()
    }

    /// Ramps for the built-in environmental layers
    pub fn builtin() -> Self {
        let stops = vec![0.0, 0.2, 0.4, 0.6, 0.7, 0.8, 1.0];
        let definitions: [(&str, &str, &str, [Rgb; 7]); 5] = [
            (
                "ndvi",
                "Vegetation Index",
                "Brown (no vegetation) to Green (dense vegetation)",
                [[139, 69, 19], [210, 180, 140], [244, 164, 96], [154, 205, 50], [50, 205, 50], [34, 139, 34], [0, 100, 0]],
            ),
            (
                "ndbi",
                "Built-up Index",
                "Blue (water) to Red (built-up areas)",
                [[0, 0, 128], [65, 105, 225], [135, 206, 235], [240, 230, 140], [255, 215, 0], [255, 99, 71], [220, 20, 60]],
            ),
            (
                "lst",
                "Surface Temperature",
                "Blue (cold) to Purple (hot)",
                [[0, 0, 255], [0, 255, 255], [0, 255, 0], [255, 255, 0], [255, 128, 0], [255, 0, 0], [128, 0, 128]],
            ),
            (
                "ntl",
                "Night Lights",
                "Black (no light) to White (bright)",
                [[0, 0, 0], [25, 25, 112], [0, 0, 128], [65, 105, 225], [135, 206, 235], [255, 255, 0], [255, 255, 255]],
            ),
            (
                "vulnerability",
                "Vulnerability Index",
                "Green (low risk) to Black (high risk)",
                [[0, 255, 0], [255, 255, 0], [255, 128, 0], [255, 0, 0], [128, 0, 0], [64, 0, 0], [0, 0, 0]],
            ),
        ];

        let mut table = Self::new();
        for (name, label, description, colors) in definitions {
            // the built-in definitions are known to be well formed
            if let Ok(ramp) = ColorRamp::new(stops.clone(), colors.to_vec()) {
                table.insert(name, ramp.with_label(label, description));
            }
        }
        table
    }

    pub fn insert(&mut self, name: &str, ramp: ColorRamp) {
        self.ramps.insert(name.to_string(), ramp);
    }

    pub fn get(&self, name: &str) -> Option<&ColorRamp> {
        self.ramps.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ramps.contains_key(name)
    }

    /// Sorted ramp names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ramps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The requested ramp name if known, otherwise `default`
    pub fn resolve<'a>(&self, requested: Option<&'a str>, default: &'a str) -> &'a str {
        match requested {
            Some(name) if self.contains(name) => name,
            _ => default,
        }
    }
}
