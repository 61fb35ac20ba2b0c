//! Loudspeaker registry
//!
//! Holds every physical device known to the session. Devices arrive as loose
//! JSON field maps (`{"mdoLoudspeakers": [...]}`) either as a full list
//! (overwrite mode) or as incremental patches keyed by id (update mode).
//! Coercion happens here, once, so the rest of the crate only sees typed
//! [`Loudspeaker`] records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coerce;
use crate::error::{FieldWarning, MdoError, MdoResult};
use crate::position::Position3D;

/// Loudspeaker id, also the output-channel routing target
pub type DeviceId = u32;

/// Coarse spatial zone, 1-based
pub type Zone = u32;

/// Raw field map for one loudspeaker
pub type FieldMap = Map<String, Value>;

/// Ranked device quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quality(pub i32);

impl Quality {
    pub const LOW: Quality = Quality(1);
    pub const MEDIUM: Quality = Quality(2);
    pub const HIGH: Quality = Quality(3);

    /// Parse from a rank number or one of `low`, `medium`, `high`
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(rank) = coerce::as_i64(value) {
            return i32::try_from(rank).ok().map(Quality);
        }
        match value.as_str()?.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::LOW),
            "medium" | "mid" => Some(Self::MEDIUM),
            "high" => Some(Self::HIGH),
            _ => None,
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::LOW
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::LOW => write!(f, "low"),
            Self::MEDIUM => write!(f, "medium"),
            Self::HIGH => write!(f, "high"),
            Quality(rank) => write!(f, "q{}", rank),
        }
    }
}

/// Physical playback device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loudspeaker {
    pub id: DeviceId,
    pub label: String,
    /// Output channel, when it differs from the id
    pub channel: Option<u32>,
    pub position: Position3D,
    /// Eligible for ad hoc object routing (vs. a fixed bed channel)
    pub mdo: bool,
    /// Runtime on/off switch
    pub enabled: bool,
    pub zone: Option<Zone>,
    pub quality: Quality,
    /// Join order; `None` sorts after every known value
    pub join_order: Option<i64>,
    /// Per-device trim applied when an object is routed here
    pub gain_adjust_db: Option<f32>,
    pub kind: Option<String>,
    pub function: Option<String>,
}

impl Loudspeaker {
    /// Fresh device with documented defaults: enabled, not MDO-capable,
    /// unassigned zone, low quality, unknown join order.
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            label: format!("ls{}", id),
            channel: None,
            position: Position3D::new(0.0, 1.0, 0.0),
            mdo: false,
            enabled: true,
            zone: None,
            quality: Quality::default(),
            join_order: None,
            gain_adjust_db: None,
            kind: None,
            function: None,
        }
    }

    /// Build a device from a payload entry
    pub fn from_fields(id: DeviceId, fields: &FieldMap) -> (Self, Vec<FieldWarning>) {
        let mut speaker = Self::new(id);
        let warnings = speaker.apply_fields(fields);
        (speaker, warnings)
    }

    /// Linear per-device trim (unity when unset)
    pub fn gain_linear(&self) -> f32 {
        self.gain_adjust_db.map(crate::gain::db_to_linear).unwrap_or(1.0)
    }

    /// Merge payload fields into this device.
    ///
    /// Unknown keys are ignored. A field that fails coercion keeps its
    /// current value and yields a warning.
    pub fn apply_fields(&mut self, fields: &FieldMap) -> Vec<FieldWarning> {
        let target = format!("loudspeaker {}", self.id);
        let mut warnings = Vec::new();
        let mut warn = |field: &str, value: &Value, expected: &'static str| {
            let warning = FieldWarning::new(target.as_str(), field, value, expected);
            warning.report();
            warnings.push(warning);
        };

        let mut spherical: [Option<f32>; 3] = [None, None, None];

        for (key, value) in fields {
            match key.as_str() {
                // Identity keys are resolved by the payload parser
                "id" | "speakerNumber" => {}
                "name" | "label" => match coerce::as_string(value) {
                    Some(label) => self.label = label,
                    None => warn(key.as_str(), value, "string"),
                },
                "channel" => match coerce::as_u32(value) {
                    Some(channel) => self.channel = Some(channel),
                    None => warn(key.as_str(), value, "channel number"),
                },
                "mdo" => match coerce::as_bool(value) {
                    Some(mdo) => self.mdo = mdo,
                    None => warn(key.as_str(), value, "boolean"),
                },
                "switch" => match coerce::as_bool(value) {
                    Some(enabled) => self.enabled = enabled,
                    None => warn(key.as_str(), value, "boolean"),
                },
                "quality" => match Quality::from_value(value) {
                    Some(quality) => self.quality = quality,
                    None => warn(key.as_str(), value, "quality rank"),
                },
                "type" => self.kind = coerce::as_string(value),
                "function" => self.function = coerce::as_string(value),
                "mdoZone" => match coerce::as_i64(value) {
                    Some(zone) if zone > 0 => self.zone = u32::try_from(zone).ok(),
                    Some(_) => self.zone = None,
                    None => warn(key.as_str(), value, "integer"),
                },
                "joined" => match coerce::as_i64(value) {
                    Some(order) if order >= 0 => self.join_order = Some(order),
                    Some(_) => self.join_order = None,
                    None => warn(key.as_str(), value, "integer"),
                },
                "mdoGainDB" => match coerce::as_f32(value) {
                    Some(db) => self.gain_adjust_db = Some(db),
                    None => warn(key.as_str(), value, "number"),
                },
                "x" | "y" | "z" => match coerce::as_f32(value) {
                    Some(v) => match key.as_str() {
                        "x" => self.position.x = v,
                        "y" => self.position.y = v,
                        _ => self.position.z = v,
                    },
                    None => warn(key.as_str(), value, "number"),
                },
                "az" | "el" | "r" => match coerce::as_f32(value) {
                    Some(v) => {
                        let slot = match key.as_str() {
                            "az" => 0,
                            "el" => 1,
                            _ => 2,
                        };
                        spherical[slot] = Some(v);
                    }
                    None => warn(key.as_str(), value, "number"),
                },
                _ => {}
            }
        }

        if spherical.iter().any(Option::is_some) {
            self.position = Position3D::from_polar(
                spherical[0].unwrap_or(0.0),
                spherical[1].unwrap_or(0.0),
                spherical[2].unwrap_or(1.0),
            );
        }

        warnings
    }
}

/// One device's worth of payload fields
#[derive(Debug, Clone, PartialEq)]
pub struct LoudspeakerEntry {
    pub id: DeviceId,
    pub fields: FieldMap,
}

impl LoudspeakerEntry {
    /// Build from a JSON object literal; non-object values yield no fields
    pub fn new(id: DeviceId, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => FieldMap::new(),
        };
        Self { id, fields }
    }
}

/// Parse `{"mdoLoudspeakers": [...]}` (or a bare array) into entries.
///
/// Entries without a usable `id`/`speakerNumber` are reported and skipped.
/// Only a payload that is not a list of devices at all is an error.
pub fn parse_loudspeaker_payload(
    payload: &Value,
) -> MdoResult<(Vec<LoudspeakerEntry>, Vec<FieldWarning>)> {
    let list = match payload {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("mdoLoudspeakers") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(MdoError::ConfigParse(
                    "'mdoLoudspeakers' is not an array".into(),
                ));
            }
            None => {
                return Err(MdoError::ConfigParse(
                    "payload has no 'mdoLoudspeakers' key".into(),
                ));
            }
        },
        _ => {
            return Err(MdoError::ConfigParse(
                "loudspeaker payload must be an object or array".into(),
            ));
        }
    };

    let mut entries = Vec::with_capacity(list.len());
    let mut warnings = Vec::new();

    for (index, item) in list.iter().enumerate() {
        let Value::Object(fields) = item else {
            let warning = FieldWarning::new(format!("loudspeaker #{}", index), "", item, "object");
            warning.report();
            warnings.push(warning);
            continue;
        };

        let raw_id = fields.get("id").or_else(|| fields.get("speakerNumber"));
        match raw_id.and_then(coerce::as_u32).filter(|id| *id > 0) {
            Some(id) => entries.push(LoudspeakerEntry {
                id,
                fields: fields.clone(),
            }),
            None => {
                let warning = FieldWarning::new(
                    format!("loudspeaker #{}", index),
                    "id",
                    raw_id.unwrap_or(&Value::Null),
                    "positive integer",
                );
                warning.report();
                warnings.push(warning);
            }
        }
    }

    Ok((entries, warnings))
}

/// Parse a JSON string payload
pub fn parse_loudspeaker_json(
    json: &str,
) -> MdoResult<(Vec<LoudspeakerEntry>, Vec<FieldWarning>)> {
    let value: Value = serde_json::from_str(json)?;
    parse_loudspeaker_payload(&value)
}

/// Set of known loudspeakers, in insertion order
#[derive(Debug, Clone, Default)]
pub struct LoudspeakerRegistry {
    speakers: Vec<Loudspeaker>,
}

impl LoudspeakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wholesale replace (overwrite mode).
    ///
    /// A repeated id in the list merges into the first occurrence.
    pub fn replace_all(&mut self, entries: &[LoudspeakerEntry]) -> Vec<FieldWarning> {
        self.speakers.clear();
        self.apply_patch(entries)
    }

    /// Merge fields into existing devices; unknown ids create new devices
    pub fn apply_patch(&mut self, entries: &[LoudspeakerEntry]) -> Vec<FieldWarning> {
        let mut warnings = Vec::new();
        for entry in entries {
            match self.get_mut(entry.id) {
                Some(speaker) => warnings.extend(speaker.apply_fields(&entry.fields)),
                None => {
                    let (speaker, w) = Loudspeaker::from_fields(entry.id, &entry.fields);
                    log::debug!("New loudspeaker {} ({})", speaker.id, speaker.label);
                    warnings.extend(w);
                    self.speakers.push(speaker);
                }
            }
        }
        warnings
    }

    /// Flip a device's runtime switch. Returns false if the id is unknown.
    pub fn set_switch(&mut self, id: DeviceId, enabled: bool) -> bool {
        match self.get_mut(id) {
            Some(speaker) => {
                speaker.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: DeviceId) -> Option<&Loudspeaker> {
        self.speakers.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: DeviceId) -> Option<&mut Loudspeaker> {
        self.speakers.iter_mut().find(|s| s.id == id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Loudspeaker> {
        self.speakers.iter()
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: DeviceId, fields: Value) -> LoudspeakerEntry {
        LoudspeakerEntry::new(id, fields)
    }

    #[test]
    fn test_payload_parsing() {
        let payload = json!({
            "mdoLoudspeakers": [
                {"id": 5, "name": "phone", "mdo": 1, "mdoZone": 2, "joined": 0},
                {"speakerNumber": "9", "mdo": "true", "quality": "high"},
                {"name": "no id"},
                {"id": 0}
            ]
        });

        let (entries, warnings) = parse_loudspeaker_payload(&payload).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 5);
        assert_eq!(entries[1].id, 9);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_payload_rejects_non_list() {
        assert!(parse_loudspeaker_payload(&json!({"speakers": []})).is_err());
        assert!(parse_loudspeaker_payload(&json!(42)).is_err());
        assert!(parse_loudspeaker_json("{not json").is_err());
    }

    #[test]
    fn test_field_coercion() {
        let (speaker, warnings) = Loudspeaker::from_fields(
            3,
            &entry(
                3,
                json!({
                    "label": "tablet",
                    "mdo": "1",
                    "switch": "off",
                    "mdoZone": "-1",
                    "joined": "4",
                    "quality": 2,
                    "mdoGainDB": "-3",
                    "channel": "nope"
                }),
            )
            .fields,
        );

        assert_eq!(speaker.label, "tablet");
        assert!(speaker.mdo);
        assert!(!speaker.enabled);
        assert_eq!(speaker.zone, None);
        assert_eq!(speaker.join_order, Some(4));
        assert_eq!(speaker.quality, Quality::MEDIUM);
        assert_eq!(speaker.gain_adjust_db, Some(-3.0));
        assert_eq!(speaker.channel, None);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "channel");
    }

    #[test]
    fn test_polar_position_converted() {
        let (speaker, _) =
            Loudspeaker::from_fields(1, &entry(1, json!({"az": 90, "el": 0, "r": 2})).fields);
        assert!((speaker.position.x - 2.0).abs() < 1e-4);
        assert!(speaker.position.y.abs() < 1e-4);
    }

    #[test]
    fn test_patch_creates_and_merges() {
        let mut registry = LoudspeakerRegistry::new();
        registry.replace_all(&[entry(1, json!({"mdo": 1, "x": 0.5}))]);

        registry.apply_patch(&[entry(1, json!({"y": 0.25})), entry(2, json!({"mdo": 1}))]);

        assert_eq!(registry.len(), 2);
        let first = registry.get(1).unwrap();
        assert_eq!(first.position.x, 0.5);
        assert_eq!(first.position.y, 0.25);
        assert!(registry.get(2).unwrap().mdo);
    }

    #[test]
    fn test_switch_patch_round_trip() {
        let mut registry = LoudspeakerRegistry::new();
        registry.replace_all(&[entry(5, json!({"mdo": 1, "mdoZone": 2, "label": "five"}))]);
        let before = registry.get(5).unwrap().clone();

        registry.apply_patch(&[entry(5, json!({"switch": 0}))]);
        assert!(!registry.get(5).unwrap().enabled);

        registry.apply_patch(&[entry(5, json!({"switch": 1}))]);
        assert_eq!(registry.get(5).unwrap(), &before);
    }

    #[test]
    fn test_replace_drops_missing_devices() {
        let mut registry = LoudspeakerRegistry::new();
        registry.replace_all(&[entry(1, json!({})), entry(2, json!({}))]);
        registry.replace_all(&[entry(2, json!({}))]);

        assert!(!registry.contains(1));
        assert!(registry.contains(2));
        assert!(registry.set_switch(2, false));
        assert!(!registry.set_switch(7, false));
    }
}
