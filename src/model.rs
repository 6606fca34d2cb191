//! Data models for the shared packing state.
//!
//! This module defines the structures exchanged with viewers:
//! - `PackBox`: A box with extents and, once placed, a grid position
//! - `Container`: A fixed-size bin holding placed boxes in placement order
//! - `Layer` / `LayeredContainer` / `Generation`: The render-ready snapshot
//! - `PackerDimensions`: The container triple handed to the external packer
//!
//! Fields the engine does not interpret (ids, labels, colors, ...) are kept in
//! a flattened `meta` map and travel through placement and broadcast untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Dimensional, Extents, GridPoint, Positioned};

/// A box to be placed, or already placed, in a container.
///
/// `x`, `y`, `z` stay `None` until the placement engine commits the box.
/// After placement `width`, `height`, `length` hold the chosen orientation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackBox {
    pub width: i64,
    pub height: i64,
    pub length: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<i64>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl PackBox {
    /// Creates an unplaced box without metadata.
    pub fn new(width: i64, height: i64, length: i64) -> Self {
        Self {
            width,
            height,
            length,
            x: None,
            y: None,
            z: None,
            meta: Map::new(),
        }
    }

    /// Attaches an opaque metadata field (builder style).
    #[cfg(test)]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Fixes the orientation and position chosen by the placement engine.
    pub fn commit(&mut self, extents: Extents, position: GridPoint) {
        self.width = extents.width;
        self.height = extents.height;
        self.length = extents.length;
        self.x = Some(position.x);
        self.y = Some(position.y);
        self.z = Some(position.z);
    }

    /// Returns the box's `id` metadata field, if any.
    pub fn id(&self) -> Option<&Value> {
        self.meta.get("id")
    }
}

impl Dimensional for PackBox {
    fn extents(&self) -> Extents {
        Extents::new(self.width, self.height, self.length)
    }
}

impl Positioned for PackBox {
    fn position(&self) -> Option<GridPoint> {
        match (self.x, self.y, self.z) {
            (Some(x), Some(y), Some(z)) => Some(GridPoint::new(x, y, z)),
            _ => None,
        }
    }
}

/// A fixed-size bin and the boxes committed to it, in placement order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub id: Value,
    /// Missing extents read as 0; such a container accepts no boxes but can
    /// still be layered.
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub length: i64,
    #[serde(default)]
    pub boxes: Vec<PackBox>,
    /// Advisory value supplied by viewers, stored as sent; never derived
    /// from `boxes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_remaining_volume: Option<Value>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl Container {
    /// Creates an empty container.
    pub fn new(id: impl Into<Value>, width: i64, height: i64, length: i64) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            length,
            boxes: Vec::new(),
            total_remaining_volume: None,
            meta: Map::new(),
        }
    }
}

impl Dimensional for Container {
    fn extents(&self) -> Extents {
        Extents::new(self.width, self.height, self.length)
    }
}

/// Boxes sharing one vertical band of a container.
///
/// Serialized as a bare array of boxes; the band itself is implied by the
/// layer's position in the container's layer list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layer {
    pub boxes: Vec<PackBox>,
}

/// A container as stored in a generation: layers instead of a box list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayeredContainer {
    #[serde(default)]
    pub id: Value,
    pub width: i64,
    pub height: i64,
    pub length: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_remaining_volume: Option<Value>,
    pub layers: Vec<Layer>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl LayeredContainer {
    /// Replaces the box list of `container` with `layers`, dropping the boxes.
    pub fn from_container(container: Container, layers: Vec<Layer>) -> Self {
        let Container {
            id,
            width,
            height,
            length,
            boxes: _,
            total_remaining_volume,
            meta,
        } = container;

        Self {
            id,
            width,
            height,
            length,
            total_remaining_volume,
            layers,
            meta,
        }
    }
}

/// Generation payload as sent by a viewer: containers still carry their boxes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationDraft {
    pub containers: Vec<Container>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

/// A finalized, render-ready generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub containers: Vec<LayeredContainer>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

/// Rejection of a dimension value sent by a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name} must be an integer, got: {value}")]
    NotAnInteger { name: &'static str, value: String },
    #[error("{name} must be positive, got: {value}")]
    NotPositive { name: &'static str, value: i64 },
    #[error("{name} is too large, got: {value}")]
    TooLarge { name: &'static str, value: i64 },
}

/// Partial dimension triple as it arrives on the wire.
///
/// Each field may be a JSON integer or a string holding one; `null` counts as
/// absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionsPatch {
    #[serde(default)]
    pub width: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default)]
    pub length: Option<Value>,
}

/// Container dimensions handed to the external packer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackerDimensions {
    pub width: u32,
    pub height: u32,
    pub length: u32,
}

impl PackerDimensions {
    pub const DEFAULT_WIDTH: u32 = 1200;
    pub const DEFAULT_HEIGHT: u32 = 1380;
    pub const DEFAULT_LENGTH: u32 = 2800;

    pub const fn new(width: u32, height: u32, length: u32) -> Self {
        Self {
            width,
            height,
            length,
        }
    }

    /// Builds a triple where every field must be present.
    pub fn from_required(patch: &DimensionsPatch) -> Result<Self, DimensionError> {
        Ok(Self {
            width: required_dimension("width", patch.width.as_ref())?,
            height: required_dimension("height", patch.height.as_ref())?,
            length: required_dimension("length", patch.length.as_ref())?,
        })
    }

    /// Overlays the fields present in `patch` onto `self`.
    ///
    /// Fails without partial application if any present field is invalid.
    pub fn overlay(&self, patch: &DimensionsPatch) -> Result<Self, DimensionError> {
        Ok(Self {
            width: optional_dimension("width", patch.width.as_ref(), self.width)?,
            height: optional_dimension("height", patch.height.as_ref(), self.height)?,
            length: optional_dimension("length", patch.length.as_ref(), self.length)?,
        })
    }

    /// Command line arguments in width, height, length order.
    pub fn as_args(&self) -> [String; 3] {
        [
            self.width.to_string(),
            self.height.to_string(),
            self.length.to_string(),
        ]
    }
}

impl Default for PackerDimensions {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_WIDTH,
            Self::DEFAULT_HEIGHT,
            Self::DEFAULT_LENGTH,
        )
    }
}

impl std::fmt::Display for PackerDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.length)
    }
}

fn required_dimension(name: &'static str, raw: Option<&Value>) -> Result<u32, DimensionError> {
    match raw {
        Some(value) => parse_dimension(name, value),
        None => Err(DimensionError::Missing(name)),
    }
}

fn optional_dimension(
    name: &'static str,
    raw: Option<&Value>,
    fallback: u32,
) -> Result<u32, DimensionError> {
    match raw {
        Some(value) => parse_dimension(name, value),
        None => Ok(fallback),
    }
}

/// Validates a single dimension value.
fn parse_dimension(name: &'static str, value: &Value) -> Result<u32, DimensionError> {
    let not_an_integer = || DimensionError::NotAnInteger {
        name,
        value: value.to_string(),
    };

    let parsed = match value {
        Value::Number(number) => match number.as_i64() {
            Some(int) => int,
            None => match number.as_f64() {
                Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => {
                    float as i64
                }
                _ => return Err(not_an_integer()),
            },
        },
        Value::String(raw) => raw.trim().parse::<i64>().map_err(|_| not_an_integer())?,
        _ => return Err(not_an_integer()),
    };

    if parsed <= 0 {
        return Err(DimensionError::NotPositive {
            name,
            value: parsed,
        });
    }
    u32::try_from(parsed).map_err(|_| DimensionError::TooLarge {
        name,
        value: parsed,
    })
}
