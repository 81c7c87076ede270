//! Machining request parameters
//!
//! Every field carries an explicit "absent" state (`None`); zero is never
//! used to mean "unspecified".

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::machining::ProcessStage;

/// Recognized dimension keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKey {
    Diameter,
    Length,
    Width,
    Height,
    Depth,
}

impl DimensionKey {
    pub const ALL: [DimensionKey; 5] = [
        DimensionKey::Diameter,
        DimensionKey::Length,
        DimensionKey::Width,
        DimensionKey::Height,
        DimensionKey::Depth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DimensionKey::Diameter => "diameter",
            DimensionKey::Length => "length",
            DimensionKey::Width => "width",
            DimensionKey::Height => "height",
            DimensionKey::Depth => "depth",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        DimensionKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimension values in millimetres. Stored values are always finite and
/// strictly positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDimensions")]
pub struct Dimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    diameter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    depth: Option<f64>,
}

impl Dimensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: DimensionKey) -> Option<f64> {
        match key {
            DimensionKey::Diameter => self.diameter,
            DimensionKey::Length => self.length,
            DimensionKey::Width => self.width,
            DimensionKey::Height => self.height,
            DimensionKey::Depth => self.depth,
        }
    }

    pub fn contains(&self, key: DimensionKey) -> bool {
        self.get(key).is_some()
    }

    /// Store `value` under `key`. Non-finite or non-positive values are
    /// rejected and leave the previous value in place.
    pub fn set(&mut self, key: DimensionKey, value: f64) -> bool {
        if !value.is_finite() || value <= 0.0 {
            return false;
        }
        *self.slot(key) = Some(value);
        true
    }

    /// Builder form of [`Dimensions::set`]
    pub fn with(mut self, key: DimensionKey, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        DimensionKey::ALL.iter().all(|key| !self.contains(*key))
    }

    /// Present entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (DimensionKey, f64)> + '_ {
        DimensionKey::ALL
            .into_iter()
            .filter_map(move |key| self.get(key).map(|value| (key, value)))
    }

    /// `min(length, width)`; `None` unless both are present
    pub fn diameter_limit(&self) -> Option<f64> {
        match (self.length, self.width) {
            (Some(length), Some(width)) => Some(length.min(width)),
            _ => None,
        }
    }

    fn slot(&mut self, key: DimensionKey) -> &mut Option<f64> {
        match key {
            DimensionKey::Diameter => &mut self.diameter,
            DimensionKey::Length => &mut self.length,
            DimensionKey::Width => &mut self.width,
            DimensionKey::Height => &mut self.height,
            DimensionKey::Depth => &mut self.depth,
        }
    }
}

#[derive(Deserialize)]
struct RawDimensions {
    #[serde(default)]
    diameter: Option<f64>,
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default)]
    depth: Option<f64>,
}

impl From<RawDimensions> for Dimensions {
    fn from(raw: RawDimensions) -> Self {
        let mut dims = Dimensions::new();
        let values = [
            (DimensionKey::Diameter, raw.diameter),
            (DimensionKey::Length, raw.length),
            (DimensionKey::Width, raw.width),
            (DimensionKey::Height, raw.height),
            (DimensionKey::Depth, raw.depth),
        ];
        for (key, value) in values {
            if let Some(value) = value {
                dims.set(key, value);
            }
        }
        dims
    }
}

/// Extracted / merged request shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_stage: Option<ProcessStage>,
    #[serde(default)]
    pub dimensions: Dimensions,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_name.is_none()
            && self.surface_type.is_none()
            && self.process_stage.is_none()
            && self.dimensions.is_empty()
    }

    pub fn diameter_limit(&self) -> Option<f64> {
        self.dimensions.diameter_limit()
    }

    pub fn with_feature(mut self, name: impl Into<String>) -> Self {
        self.feature_name = Some(name.into());
        self
    }

    pub fn with_surface(mut self, surface: impl Into<String>) -> Self {
        self.surface_type = Some(surface.into());
        self
    }

    pub fn with_stage(mut self, stage: ProcessStage) -> Self {
        self.process_stage = Some(stage);
        self
    }

    pub fn with_dimension(mut self, key: DimensionKey, value: f64) -> Self {
        self.dimensions.set(key, value);
        self
    }
}
