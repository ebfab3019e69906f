//! Build packets: product types, caller-owned packet schemas, and the
//! synthesizer that fills them in.

pub mod prompt;
pub mod schema;
pub mod synthesizer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use schema::{FieldKind, FieldRule, PacketSchema};
pub use synthesizer::{PacketSynthesizer, SynthesisInput, Synthesize, SynthesizerConfig};

// ---------------------------------------------------------------------------
// Product type
// ---------------------------------------------------------------------------

/// Kind of digital product a packet describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Course,
    MiniCourse,
    Guide,
    Checklist,
    LeadMagnet,
}

impl ProductType {
    pub const ALL: [ProductType; 5] = [
        Self::Course,
        Self::MiniCourse,
        Self::Guide,
        Self::Checklist,
        Self::LeadMagnet,
    ];

    /// Human-readable name used in prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Course => "online course",
            Self::MiniCourse => "mini-course",
            Self::Guide => "digital guide",
            Self::Checklist => "printable checklist",
            Self::LeadMagnet => "free lead magnet",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Course => "course",
            Self::MiniCourse => "mini_course",
            Self::Guide => "guide",
            Self::Checklist => "checklist",
            Self::LeadMagnet => "lead_magnet",
        };
        f.write_str(s)
    }
}

impl FromStr for ProductType {
    type Err = ProductTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "course" => Ok(Self::Course),
            "mini_course" => Ok(Self::MiniCourse),
            "guide" => Ok(Self::Guide),
            "checklist" => Ok(Self::Checklist),
            "lead_magnet" => Ok(Self::LeadMagnet),
            _ => Err(ProductTypeParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ProductType`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid product type: {0:?} (expected course, mini_course, guide, checklist, or lead_magnet)")]
pub struct ProductTypeParseError(pub String);

// ---------------------------------------------------------------------------
// Build packet
// ---------------------------------------------------------------------------

/// A schema-validated product description.
///
/// The pipeline treats the contents as opaque; the shape is defined by the
/// [`PacketSchema`] it was validated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildPacket(Value);

impl BuildPacket {
    /// Wrap an already-validated value.
    pub(crate) fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// The packet's `title` field, when present.
    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }
}
