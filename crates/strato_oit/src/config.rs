//! Renderer configuration

use std::fmt;
use std::str::FromStr;

/// Transparency strategy selected at renderer creation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OitMode {
    /// Fixed-function alpha blending in submission order (baseline)
    Dummy,
    /// Per-pixel linked lists resolved with a depth sort
    #[default]
    LinkedList,
}

impl OitMode {
    pub const ALL: [OitMode; 2] = [OitMode::Dummy, OitMode::LinkedList];

    pub fn name(&self) -> &'static str {
        match self {
            OitMode::Dummy => "dummy",
            OitMode::LinkedList => "linked-list",
        }
    }
}

impl fmt::Display for OitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown mode name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown transparency mode '{}' (expected 'dummy' or 'linked-list')",
            self.0
        )
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for OitMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dummy" | "blend" => Ok(OitMode::Dummy),
            "linked-list" | "linked_list" | "linkedlist" | "ppll" => Ok(OitMode::LinkedList),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// Smallest and largest accepted entries-per-pixel values.
///
/// The resolve shader keeps that many fragments in registers, so the upper
/// bound is a register-pressure limit rather than a memory one.
pub const MIN_ENTRIES_PER_PIXEL: u32 = 1;
pub const MAX_ENTRIES_PER_PIXEL: u32 = 64;

/// Configuration for creating a transparency renderer
#[derive(Clone, Debug)]
pub struct OitConfig {
    pub mode: OitMode,
    /// Fragment slots reserved per pixel; also the resolve walk bound
    pub entries_per_pixel: u32,
    /// Fill ratio reported as "near capacity" by [`crate::OitStats`]
    pub near_capacity_ratio: f32,
    /// Alpha given to every transparent line fragment
    pub opacity: f32,
    /// Color target format of the scene the resolve pass composites into
    pub texture_format: wgpu::TextureFormat,
}

impl Default for OitConfig {
    fn default() -> Self {
        Self {
            mode: OitMode::default(),
            entries_per_pixel: 8,
            near_capacity_ratio: 0.9,
            opacity: 0.2,
            texture_format: wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
}

impl OitConfig {
    /// Apply environment overrides:
    ///
    /// - `STRATO_OIT_MODE=dummy|linked-list`
    /// - `STRATO_OIT_ENTRIES_PER_PIXEL=16`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(mode) = std::env::var("STRATO_OIT_MODE") {
            match mode.parse() {
                Ok(parsed) => self.mode = parsed,
                Err(e) => tracing::warn!("ignoring STRATO_OIT_MODE: {}", e),
            }
        }
        if let Some(v) = env_u32("STRATO_OIT_ENTRIES_PER_PIXEL") {
            self.entries_per_pixel = v;
        }
        self
    }

    /// Clamp values into their supported ranges
    pub fn sanitized(mut self) -> Self {
        let clamped = self
            .entries_per_pixel
            .clamp(MIN_ENTRIES_PER_PIXEL, MAX_ENTRIES_PER_PIXEL);
        if clamped != self.entries_per_pixel {
            tracing::warn!(
                "entries_per_pixel {} out of range, using {}",
                self.entries_per_pixel,
                clamped
            );
            self.entries_per_pixel = clamped;
        }
        self.near_capacity_ratio = self.near_capacity_ratio.clamp(0.0, 1.0);
        self.opacity = self.opacity.clamp(0.0, 1.0);
        self
    }
}
