//! Audio objects for one processing cycle
//!
//! Objects are rebuilt from upstream metadata every cycle. Ingestion is
//! lenient: a malformed field is reported and falls back to its default,
//! a missing id becomes `None` (written back out as `-1`).

use serde_json::{Map, Value, json};

use crate::coerce;
use crate::error::{FieldWarning, MdoError, MdoResult};
use crate::loudspeaker::{DeviceId, Quality};
use crate::position::ObjectPosition;
use crate::strategy::RoutingMethod;

/// Object id within a cycle
pub type ObjectId = u32;

/// Rendering path of an object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ObjectType {
    /// Panned object
    #[default]
    Objects,
    /// Routed straight to output channels
    DirectSpeakers,
    Hoa,
    Binaural,
    /// Any other tag, passed through untouched
    Other(String),
}

impl ObjectType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "Objects" | "objects" => Self::Objects,
            "DirectSpeakers" | "directSpeakers" => Self::DirectSpeakers,
            "HOA" | "hoa" => Self::Hoa,
            "Binaural" | "binaural" => Self::Binaural,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Objects => "Objects",
            Self::DirectSpeakers => "DirectSpeakers",
            Self::Hoa => "HOA",
            Self::Binaural => "Binaural",
            Self::Other(tag) => tag,
        }
    }
}

/// One spatial object in the current cycle
#[derive(Debug, Clone, PartialEq)]
pub struct AudioObject {
    /// `None` when the upstream id was missing or unparsable
    pub id: Option<ObjectId>,
    pub label: String,
    /// 0 = no group
    pub group: u32,
    /// Linear gain
    pub level: f32,
    pub kind: ObjectType,
    /// Bed channel(s), replaced by device ids once routed
    pub output_channels: Vec<u32>,
    pub position: ObjectPosition,

    /// Minimum device count for MDO; `None` = MDO not requested
    pub mdo_threshold: Option<u32>,
    /// Must be MDO or silent
    pub mdo_only: bool,
    pub min_quality: Option<Quality>,
    pub exclusive: bool,
    /// Mute when this object was active last cycle
    pub mute_if_object: Option<ObjectId>,
    /// Re-decide routing every cycle instead of sticking
    pub dynamic: bool,
    /// Zonal: route to every matching device instead of one
    pub spread: bool,
    pub method: Option<RoutingMethod>,
    /// Requested devices for the direct method
    pub speaker_number: Vec<DeviceId>,
    /// Priority per zone, index 0 = zone 1; 0 = not desired
    pub zone_priorities: Vec<u32>,
    /// Object gain applied on MDO routing, dB
    pub gain_db: f32,
}

impl Default for AudioObject {
    fn default() -> Self {
        Self {
            id: None,
            label: String::new(),
            group: 0,
            level: 1.0,
            kind: ObjectType::Objects,
            output_channels: Vec::new(),
            position: ObjectPosition::default(),
            mdo_threshold: None,
            mdo_only: false,
            min_quality: None,
            exclusive: false,
            mute_if_object: None,
            dynamic: false,
            spread: false,
            method: None,
            speaker_number: Vec::new(),
            zone_priorities: Vec::new(),
            gain_db: 0.0,
        }
    }
}

impl AudioObject {
    /// Object with a valid id and defaults elsewhere
    pub fn new(id: ObjectId) -> Self {
        Self {
            id: Some(id),
            label: format!("obj{}", id),
            ..Default::default()
        }
    }

    /// Priority of a 1-based zone (0 when unspecified)
    pub fn zone_priority(&self, zone: u32) -> u32 {
        zone.checked_sub(1)
            .and_then(|index| self.zone_priorities.get(index as usize))
            .copied()
            .unwrap_or(0)
    }

    /// `outputChannels` wire form: comma list, no spaces
    pub fn output_channels_string(&self) -> String {
        self.output_channels
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Decode one object from upstream JSON
    pub fn from_value(value: &Value) -> (Self, Vec<FieldWarning>) {
        let mut object = Self::default();
        let mut warnings = Vec::new();

        let Value::Object(fields) = value else {
            let warning = FieldWarning::new("object", "", value, "object");
            warning.report();
            warnings.push(warning);
            return (object, warnings);
        };

        match fields.get("id").and_then(coerce::as_u32) {
            Some(id) => object.id = Some(id),
            None => {
                let warning = FieldWarning::new(
                    "object",
                    "id",
                    fields.get("id").unwrap_or(&Value::Null),
                    "object id",
                );
                warning.report();
                warnings.push(warning);
            }
        }

        let target = match object.id {
            Some(id) => format!("object {}", id),
            None => "object -1".to_string(),
        };
        let mut warn = |field: &str, value: &Value, expected: &'static str| {
            let warning = FieldWarning::new(target.as_str(), field, value, expected);
            warning.report();
            warnings.push(warning);
        };

        for (key, value) in fields {
            let key = key.as_str();
            match key {
                "id" => {}
                "label" | "name" => match coerce::as_string(value) {
                    Some(label) => object.label = label,
                    None => warn(key, value, "string"),
                },
                "group" => match coerce::as_u32(value) {
                    Some(group) => object.group = group,
                    None => warn(key, value, "group number"),
                },
                "level" => match coerce::as_f32(value) {
                    Some(level) => object.level = level,
                    None => warn(key, value, "number"),
                },
                "type" => match value.as_str() {
                    Some(tag) => object.kind = ObjectType::parse(tag),
                    None => warn(key, value, "type tag"),
                },
                "outputChannels" => match coerce::as_int_list(value) {
                    Some(channels) => {
                        object.output_channels =
                            channels.into_iter().filter_map(|c| u32::try_from(c).ok()).collect()
                    }
                    None => warn(key, value, "channel list"),
                },
                "position" => match parse_position(value) {
                    Some(position) => object.position = position,
                    None => warn(key, value, "position"),
                },
                "mdoThreshold" => match coerce::as_u32(value) {
                    Some(threshold) => object.mdo_threshold = Some(threshold),
                    None if value.is_null() => object.mdo_threshold = None,
                    None => warn(key, value, "device count"),
                },
                "mdoOnly" => match coerce::as_bool(value) {
                    Some(flag) => object.mdo_only = flag,
                    None => warn(key, value, "boolean"),
                },
                "mdoMinQuality" => match Quality::from_value(value) {
                    Some(quality) => object.min_quality = Some(quality),
                    None => warn(key, value, "quality rank"),
                },
                "mdoExclusive" => match coerce::as_bool(value) {
                    Some(flag) => object.exclusive = flag,
                    None => warn(key, value, "boolean"),
                },
                "muteIfObject" => match coerce::as_i64(value) {
                    Some(id) if id >= 0 => object.mute_if_object = u32::try_from(id).ok(),
                    Some(_) => object.mute_if_object = None,
                    None => warn(key, value, "object id"),
                },
                "mdoDynamic" => match coerce::as_bool(value) {
                    Some(flag) => object.dynamic = flag,
                    None => warn(key, value, "boolean"),
                },
                "mdoSpread" => match coerce::as_bool(value) {
                    Some(flag) => object.spread = flag,
                    None => warn(key, value, "boolean"),
                },
                "mdoMethod" => match coerce::as_i64(value) {
                    Some(index) => object.method = RoutingMethod::from_index(index),
                    None => warn(key, value, "method index"),
                },
                "speakerNumber" => match coerce::as_int_list(value) {
                    Some(ids) => {
                        object.speaker_number = ids
                            .into_iter()
                            .filter(|id| *id > 0)
                            .filter_map(|id| u32::try_from(id).ok())
                            .collect()
                    }
                    None => warn(key, value, "speaker list"),
                },
                "mdoZones" => match coerce::as_int_list(value) {
                    Some(levels) => {
                        object.zone_priorities = levels
                            .into_iter()
                            .map(|level| u32::try_from(level.max(0)).unwrap_or(0))
                            .collect()
                    }
                    None => warn(key, value, "zone priority list"),
                },
                "mdoGainDB" => match coerce::as_f32(value) {
                    Some(db) => object.gain_db = db,
                    None => warn(key, value, "number"),
                },
                _ => {}
            }
        }

        (object, warnings)
    }

    /// Encode for the downstream pipeline
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), json!(self.id.map(i64::from).unwrap_or(-1)));
        map.insert("label".into(), json!(self.label));
        map.insert("group".into(), json!(self.group));
        map.insert("level".into(), json!(self.level));
        map.insert("type".into(), json!(self.kind.as_str()));
        map.insert("outputChannels".into(), json!(self.output_channels_string()));
        map.insert("position".into(), position_value(&self.position));
        if let Some(threshold) = self.mdo_threshold {
            map.insert("mdoThreshold".into(), json!(threshold));
        }
        map.insert("mdoOnly".into(), json!(self.mdo_only));
        if let Some(quality) = self.min_quality {
            map.insert("mdoMinQuality".into(), json!(quality.0));
        }
        map.insert("mdoExclusive".into(), json!(self.exclusive));
        if let Some(other) = self.mute_if_object {
            map.insert("muteIfObject".into(), json!(other));
        }
        map.insert("mdoDynamic".into(), json!(self.dynamic));
        map.insert("mdoSpread".into(), json!(self.spread));
        if let Some(method) = self.method {
            map.insert("mdoMethod".into(), json!(method.index()));
        }
        if !self.speaker_number.is_empty() {
            let list: Vec<String> = self.speaker_number.iter().map(|s| s.to_string()).collect();
            map.insert("speakerNumber".into(), json!(list.join(",")));
        }
        if !self.zone_priorities.is_empty() {
            map.insert("mdoZones".into(), json!(self.zone_priorities));
        }
        map.insert("mdoGainDB".into(), json!(self.gain_db));
        Value::Object(map)
    }
}

fn parse_position(value: &Value) -> Option<ObjectPosition> {
    let fields = value.as_object()?;
    let get = |key: &str| fields.get(key).and_then(coerce::as_f32);

    if fields.contains_key("x") || fields.contains_key("y") || fields.contains_key("z") {
        return Some(ObjectPosition::Cartesian {
            x: get("x").unwrap_or(0.0),
            y: get("y").unwrap_or(0.0),
            z: get("z").unwrap_or(0.0),
        });
    }
    if fields.contains_key("az") || fields.contains_key("el") {
        return Some(ObjectPosition::Polar {
            az: get("az").unwrap_or(0.0),
            el: get("el").unwrap_or(0.0),
            dist: get("dist").unwrap_or(1.0),
        });
    }
    None
}

fn position_value(position: &ObjectPosition) -> Value {
    match *position {
        ObjectPosition::Polar { az, el, dist } => json!({"az": az, "el": el, "dist": dist}),
        ObjectPosition::Cartesian { x, y, z } => json!({"x": x, "y": y, "z": z}),
    }
}

/// Decode a full object list.
///
/// Per-object problems are warnings; only a payload that is not a sequence
/// is an error.
pub fn parse_object_list(payload: &Value) -> MdoResult<(Vec<AudioObject>, Vec<FieldWarning>)> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("objects") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(MdoError::InvalidObjectList(
                    "expected an array or an 'objects' array".into(),
                ));
            }
        },
        other => {
            return Err(MdoError::InvalidObjectList(format!(
                "expected an array, got {}",
                other
            )));
        }
    };

    let mut objects = Vec::with_capacity(items.len());
    let mut warnings = Vec::new();
    for item in items {
        let (object, w) = AudioObject::from_value(item);
        objects.push(object);
        warnings.extend(w);
    }
    Ok((objects, warnings))
}

/// Encode an object list
pub fn object_list_value(objects: &[AudioObject]) -> Value {
    Value::Array(objects.iter().map(AudioObject::to_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_object() {
        let (object, warnings) = AudioObject::from_value(&json!({
            "id": 4,
            "label": "dialogue",
            "group": 2,
            "level": "0.5",
            "type": "Objects",
            "outputChannels": "1",
            "position": {"az": 30, "el": 0, "dist": 1},
            "mdoThreshold": 2,
            "mdoOnly": 1,
            "mdoMinQuality": "medium",
            "mdoExclusive": true,
            "muteIfObject": 9,
            "mdoDynamic": "0",
            "mdoSpread": false,
            "mdoMethod": 3,
            "speakerNumber": "5,9",
            "mdoZones": "2,0,1",
            "mdoGainDB": -6
        }));

        assert!(warnings.is_empty());
        assert_eq!(object.id, Some(4));
        assert_eq!(object.group, 2);
        assert_eq!(object.level, 0.5);
        assert_eq!(object.output_channels, vec![1]);
        assert_eq!(object.mdo_threshold, Some(2));
        assert!(object.mdo_only);
        assert_eq!(object.min_quality, Some(Quality::MEDIUM));
        assert!(object.exclusive);
        assert_eq!(object.mute_if_object, Some(9));
        assert!(!object.dynamic);
        assert_eq!(object.method, Some(RoutingMethod::Nearest));
        assert_eq!(object.speaker_number, vec![5, 9]);
        assert_eq!(object.zone_priorities, vec![2, 0, 1]);
        assert_eq!(object.zone_priority(1), 2);
        assert_eq!(object.zone_priority(3), 1);
        assert_eq!(object.zone_priority(4), 0);
        assert_eq!(object.zone_priority(0), 0);
    }

    #[test]
    fn test_malformed_fields_default() {
        let (object, warnings) = AudioObject::from_value(&json!({
            "id": "seven",
            "level": "loud",
            "mdoThreshold": "many",
            "mdoDynamic": "sometimes"
        }));

        assert_eq!(object.id, None);
        assert_eq!(object.level, 1.0);
        assert_eq!(object.mdo_threshold, None);
        assert!(!object.dynamic);
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().skip(1).all(|w| w.target == "object -1"));
    }

    #[test]
    fn test_encode_invalid_id_and_channels() {
        let mut object = AudioObject::default();
        object.output_channels = vec![5, 9];
        let value = object.to_value();
        assert_eq!(value["id"], json!(-1));
        assert_eq!(value["outputChannels"], json!("5,9"));
    }

    #[test]
    fn test_object_list() {
        let (objects, warnings) =
            parse_object_list(&json!([{"id": 1}, {"id": 2, "group": "x"}])).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(warnings.len(), 1);

        assert!(parse_object_list(&json!({"id": 1})).is_err());
        assert!(parse_object_list(&json!("objects")).is_err());
    }

    #[test]
    fn test_cartesian_position() {
        let (object, _) =
            AudioObject::from_value(&json!({"id": 1, "position": {"x": 0.5, "y": 1}}));
        assert_eq!(
            object.position,
            ObjectPosition::Cartesian {
                x: 0.5,
                y: 1.0,
                z: 0.0
            }
        );
    }
}
