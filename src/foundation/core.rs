use std::fmt;
use std::time::Duration;

use crate::foundation::error::{PlayoutError, PlayoutResult};

/// Caller-assigned render layer id. Layers composite in ascending id order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct LayerId(pub i32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawFps")]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> PlayoutResult<Self> {
        if den == 0 {
            return Err(PlayoutError::config("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(PlayoutError::config("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Wall-clock duration of one frame.
    ///
    /// Fails for a zero numerator or denominator, which struct literals can still produce.
    pub fn frame_duration(self) -> PlayoutResult<Duration> {
        let fps = Self::new(self.num, self.den)?;
        Ok(Duration::from_secs_f64(f64::from(fps.den) / f64::from(fps.num)))
    }
}

#[derive(serde::Deserialize)]
struct RawFps {
    num: u32,
    den: u32,
}

impl TryFrom<RawFps> for Fps {
    type Error = PlayoutError;

    fn try_from(raw: RawFps) -> PlayoutResult<Self> {
        Self::new(raw.num, raw.den)
    }
}

/// Pixel layout of a frame's image payload. Both layouts are 4 bytes per pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Blue, green, red, alpha byte order (a little-endian `0xAARRGGBB` word).
    #[default]
    Bgra,
    /// Red, green, blue, alpha byte order.
    Rgba,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        4
    }
}

/// Output video format of a render device.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VideoFormat {
    /// Preset name, e.g. `"1080i5000"`.
    pub name: String,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fps,
}

const PRESETS: &[(&str, u32, u32, u32, u32)] = &[
    ("pal", 720, 576, 25, 1),
    ("ntsc", 720, 486, 30000, 1001),
    ("720p5000", 1280, 720, 50, 1),
    ("1080i5000", 1920, 1080, 25, 1),
    ("1080p2500", 1920, 1080, 25, 1),
    ("1080p5000", 1920, 1080, 50, 1),
];

impl VideoFormat {
    /// Create a custom, validated format.
    pub fn new(name: impl Into<String>, width: u32, height: u32, fps: Fps) -> PlayoutResult<Self> {
        if width == 0 || height == 0 {
            return Err(PlayoutError::config("video format dimensions must be non-zero"));
        }
        Ok(Self {
            name: name.into(),
            width,
            height,
            fps: Fps::new(fps.num, fps.den)?,
        })
    }

    /// Resolve a named preset (case-insensitive).
    pub fn from_name(name: &str) -> PlayoutResult<Self> {
        let key = name.trim().to_ascii_lowercase();
        PRESETS
            .iter()
            .find(|(n, ..)| *n == key)
            .map(|&(n, width, height, num, den)| Self {
                name: n.to_string(),
                width,
                height,
                fps: Fps { num, den },
            })
            .ok_or_else(|| PlayoutError::config(format!("unknown video format '{name}'")))
    }

    /// Names of all built-in presets.
    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(n, ..)| *n)
    }
}

impl Default for VideoFormat {
    fn default() -> Self {
        Self {
            name: "pal".to_string(),
            width: 720,
            height: 576,
            fps: Fps { num: 25, den: 1 },
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
