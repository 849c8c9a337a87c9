//! Request parameters.
//!
//! Width and height are validated strictly; effect parameters are lenient and
//! anything out of range or malformed is dropped instead of rejected.

use serde::Deserialize;
use std::num::IntErrorKind;
use thiserror::Error;

/// Dimension validation errors
///
/// The display strings are returned to clients verbatim.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid size")]
    InvalidSize,

    #[error("Dimensions must be positive")]
    NonPositiveDimension,

    #[error("Dimensions too large")]
    DimensionTooLarge,
}

/// Parse and bound-check raw width/height path segments.
///
/// Each rule is applied to both values before the next rule runs, so an
/// unparseable height is reported even when the width is also too large.
pub fn validate_dimensions(
    width: &str,
    height: &str,
    max: u32,
) -> Result<(u32, u32), ValidationError> {
    let (Some(w), Some(h)) = (parse_dimension(width), parse_dimension(height)) else {
        return Err(ValidationError::InvalidSize);
    };

    if w <= 0 || h <= 0 {
        return Err(ValidationError::NonPositiveDimension);
    }

    if w > i64::from(max) || h > i64::from(max) {
        return Err(ValidationError::DimensionTooLarge);
    }

    // Both fit in u32: they are within 1..=max
    Ok((w as u32, h as u32))
}

/// Integers beyond `i64` saturate so they still fail the sign and size rules
fn parse_dimension(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

/// Effect intensity on the user-facing 1-9 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectScale(u8);

impl EffectScale {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 9;

    /// Build from an integer, `None` when outside 1-9
    pub fn new(value: i64) -> Option<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// Parse a query value.
    ///
    /// Decimals are truncated toward zero before the range check, so `5.7`
    /// is scale 5. Anything unparseable is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(value) = raw.parse::<i64>() {
            return Self::new(value);
        }

        let value = raw.parse::<f64>().ok().filter(|v| v.is_finite())?;
        Self::new(value.trunc() as i64)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Tint colour parsed from a 3- or 6-digit hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Tint {
    /// Parse `#rgb`, `rgb`, `#rrggbb` or `rrggbb` (any case)
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let expanded = match digits.len() {
            6 => digits.to_string(),
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            _ => return None,
        };

        let bytes = hex::decode(expanded).ok()?;
        Some(Self {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
        })
    }

    /// Lower-case `rrggbb` form
    pub fn to_hex(self) -> String {
        hex::encode([self.r, self.g, self.b])
    }
}

/// Raw optional query parameters shared by both image endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EffectQuery {
    pub saturation: Option<String>,
    pub blur: Option<String>,
    pub contrast: Option<String>,
    pub tint: Option<String>,
    pub image: Option<String>,
}

/// A fully normalised image request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub width: u32,
    pub height: u32,
    pub saturation: Option<EffectScale>,
    pub blur: Option<EffectScale>,
    pub contrast: Option<EffectScale>,
    pub tint: Option<Tint>,
    /// Catalog index, only present when in range
    pub image: Option<usize>,
    /// Uniqueness marker that forces a cache bypass
    pub force_unique: Option<i64>,
}

impl ImageRequest {
    /// Plain request with no effects and a random source
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            saturation: None,
            blur: None,
            contrast: None,
            tint: None,
            image: None,
            force_unique: None,
        }
    }

    /// Build from validated dimensions and raw query values
    pub fn from_query(width: u32, height: u32, query: &EffectQuery, catalog_len: usize) -> Self {
        Self {
            saturation: query.saturation.as_deref().and_then(EffectScale::parse),
            blur: query.blur.as_deref().and_then(EffectScale::parse),
            contrast: query.contrast.as_deref().and_then(EffectScale::parse),
            tint: query.tint.as_deref().and_then(Tint::parse),
            image: query
                .image
                .as_deref()
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .filter(|index| *index < catalog_len),
            ..Self::new(width, height)
        }
    }

    /// Mark the request as unique so it never touches the cache
    pub fn with_force_unique(mut self, marker: i64) -> Self {
        self.force_unique = Some(marker);
        self
    }

    /// A request is cacheable when its source is pinned and it is not forced unique
    pub fn is_cacheable(&self) -> bool {
        self.image.is_some() && self.force_unique.is_none()
    }
}
