//! Engine configuration and loudspeaker file loading

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FieldWarning, MdoError, MdoResult};
use crate::loudspeaker::{LoudspeakerEntry, parse_loudspeaker_json};
use crate::strategy::RoutingMethod;

/// Largest zone count a control command may set
pub const MAX_ZONES: u32 = 256;

/// How an incoming loudspeaker payload is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Merge into existing devices, history kept
    Update,
    /// Rebuild the registry, history cleared
    Overwrite,
}

impl UpdateMode {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "update" => Some(Self::Update),
            "overwrite" => Some(Self::Overwrite),
            _ => None,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Processing on; when off objects pass through untouched
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Emit device/object tables through the status sink
    #[serde(default)]
    pub verbose: bool,
    /// Configured method, also the cap for per-object overrides
    #[serde(default = "default_method")]
    pub method: RoutingMethod,
    /// Number of zones objects may assign priorities to
    #[serde(default = "default_zone_count")]
    pub zone_count: u32,
    #[serde(default = "default_update_mode")]
    pub update_mode: UpdateMode,
    /// Cycles between verbose object table dumps
    #[serde(default = "default_refresh_period")]
    pub refresh_period: u32,
    /// Nearest-neighbour compares unit vectors
    #[serde(default)]
    pub normalize_positions: bool,
    /// RNG seed for zonal shuffling; OS entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_true() -> bool {
    true
}
fn default_method() -> RoutingMethod {
    RoutingMethod::Zonal
}
fn default_zone_count() -> u32 {
    3
}
fn default_update_mode() -> UpdateMode {
    UpdateMode::Overwrite
}
fn default_refresh_period() -> u32 {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            verbose: false,
            method: RoutingMethod::Zonal,
            zone_count: 3,
            update_mode: UpdateMode::Overwrite,
            refresh_period: 100,
            normalize_positions: false,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> MdoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> MdoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> MdoResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// Read a JSON loudspeaker payload from disk.
///
/// XML layouts are not supported here and are rejected as a parse error.
pub fn load_payload_file(path: &Path) -> MdoResult<(Vec<LoudspeakerEntry>, Vec<FieldWarning>)> {
    let is_xml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
    if is_xml {
        return Err(MdoError::ConfigParse(format!(
            "{}: XML loudspeaker layouts are not supported",
            path.display()
        )));
    }

    let text = fs::read_to_string(path)?;
    let parsed = parse_loudspeaker_json(&text).map_err(|e| match e {
        MdoError::Json(err) => MdoError::ConfigParse(format!("{}: {}", path.display(), err)),
        MdoError::ConfigParse(msg) => MdoError::ConfigParse(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;

    log::info!(
        "Loaded {} loudspeaker(s) from {}",
        parsed.0.len(),
        path.display()
    );
    Ok(parsed)
}
