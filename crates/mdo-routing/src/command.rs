//! Control commands addressed to the engine

use std::path::PathBuf;

use crate::config::{MAX_ZONES, UpdateMode};
use crate::error::{MdoError, MdoResult};
use crate::loudspeaker::DeviceId;
use crate::strategy::RoutingMethod;

/// Commands from control/network threads to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Processing on/off (off = pass-through)
    On(bool),
    /// Verbose diagnostic tables
    Verbose(bool),
    /// Configured routing method
    Method(RoutingMethod),
    /// Number of zones objects may address
    NumberZones(u32),
    /// Reload the loudspeaker list from a file (always overwrites)
    LoudspeakerConfig(PathBuf),
    /// Switch one loudspeaker on or off
    LoudspeakerSwitch { id: DeviceId, enabled: bool },
    /// Treat the next cycle as a loudspeaker update
    UpdateDevices,
    /// Forget every object's previous routing
    ClearDeviceHistory,
    UpdateMode(UpdateMode),
    /// Cycles between verbose object tables
    RefreshPeriod(u32),
    /// Load a JSON loudspeaker dump using the configured update mode
    ReadFromFile(PathBuf),
}

impl EngineCommand {
    /// Parse a keyed command with its argument list
    pub fn parse(key: &str, args: &[String]) -> MdoResult<Self> {
        let command = match key {
            "on" => Self::On(flag(key, args, 0)?),
            "verbose" => Self::Verbose(flag(key, args, 0)?),
            "method" => {
                let index = int(key, args, 0)?;
                let method = RoutingMethod::from_index(index).ok_or_else(|| {
                    MdoError::InvalidCommand(format!("method: invalid index {}", index))
                })?;
                Self::Method(method)
            }
            "numberZones" => {
                let zones = count(key, args, 0)?;
                if zones > MAX_ZONES {
                    return Err(MdoError::InvalidCommand(format!(
                        "numberZones: {} exceeds {}",
                        zones, MAX_ZONES
                    )));
                }
                Self::NumberZones(zones)
            }
            "loudspeakerconfig" => Self::LoudspeakerConfig(path(key, args)?),
            "loudspeakerswitch" => {
                let id = count(key, args, 0)?;
                let enabled = flag(key, args, 1)?;
                Self::LoudspeakerSwitch { id, enabled }
            }
            "updateDevices" => Self::UpdateDevices,
            "clearDeviceHistory" => Self::ClearDeviceHistory,
            "updateMode" | "lsMode" => {
                let text = arg(key, args, 0)?;
                let mode = UpdateMode::parse(text).ok_or_else(|| {
                    MdoError::InvalidCommand(format!("{}: unknown mode '{}'", key, text))
                })?;
                Self::UpdateMode(mode)
            }
            "refreshPeriod" => Self::RefreshPeriod(count(key, args, 0)?),
            "readFromFile" => Self::ReadFromFile(path(key, args)?),
            other => {
                return Err(MdoError::InvalidCommand(format!("unknown command '{}'", other)));
            }
        };
        Ok(command)
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Self::On(_) => "on",
            Self::Verbose(_) => "verbose",
            Self::Method(_) => "method",
            Self::NumberZones(_) => "numberZones",
            Self::LoudspeakerConfig(_) => "loudspeakerconfig",
            Self::LoudspeakerSwitch { .. } => "loudspeakerswitch",
            Self::UpdateDevices => "updateDevices",
            Self::ClearDeviceHistory => "clearDeviceHistory",
            Self::UpdateMode(_) => "updateMode",
            Self::RefreshPeriod(_) => "refreshPeriod",
            Self::ReadFromFile(_) => "readFromFile",
        }
    }
}

fn arg<'a>(key: &str, args: &'a [String], index: usize) -> MdoResult<&'a str> {
    args.get(index)
        .map(|a| a.trim())
        .ok_or_else(|| MdoError::InvalidCommand(format!("{}: missing argument {}", key, index + 1)))
}

fn int(key: &str, args: &[String], index: usize) -> MdoResult<i64> {
    let text = arg(key, args, index)?;
    text.parse::<i64>()
        .or_else(|_| text.parse::<f64>().map(|f| f as i64))
        .map_err(|_| MdoError::InvalidCommand(format!("{}: '{}' is not a number", key, text)))
}

fn count(key: &str, args: &[String], index: usize) -> MdoResult<u32> {
    let value = int(key, args, index)?;
    u32::try_from(value)
        .map_err(|_| MdoError::InvalidCommand(format!("{}: {} is out of range", key, value)))
}

fn flag(key: &str, args: &[String], index: usize) -> MdoResult<bool> {
    Ok(int(key, args, index)? != 0)
}

fn path(key: &str, args: &[String]) -> MdoResult<PathBuf> {
    let text = arg(key, args, 0)?;
    if text.is_empty() {
        return Err(MdoError::InvalidCommand(format!("{}: empty path", key)));
    }
    Ok(PathBuf::from(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(EngineCommand::parse("on", &args(&["0"])).unwrap(), EngineCommand::On(false));
        assert_eq!(
            EngineCommand::parse("method", &args(&["1"])).unwrap(),
            EngineCommand::Method(RoutingMethod::UnknownLocation)
        );
        assert_eq!(
            EngineCommand::parse("loudspeakerswitch", &args(&["5", "1"])).unwrap(),
            EngineCommand::LoudspeakerSwitch { id: 5, enabled: true }
        );
        assert_eq!(
            EngineCommand::parse("lsMode", &args(&["update"])).unwrap(),
            EngineCommand::UpdateMode(UpdateMode::Update)
        );
        assert_eq!(
            EngineCommand::parse("readFromFile", &args(&["/tmp/ls.json"])).unwrap(),
            EngineCommand::ReadFromFile(PathBuf::from("/tmp/ls.json"))
        );
        assert_eq!(
            EngineCommand::parse("clearDeviceHistory", &[]).unwrap().name(),
            "clearDeviceHistory"
        );
    }

    #[test]
    fn test_invalid_commands() {
        assert!(EngineCommand::parse("volume", &args(&["1"])).is_err());
        assert!(EngineCommand::parse("numberZones", &[]).is_err());
        assert!(EngineCommand::parse("numberZones", &args(&["-2"])).is_err());
        assert!(EngineCommand::parse("numberZones", &args(&["4000000000"])).is_err());
        assert_eq!(
            EngineCommand::parse("numberZones", &args(&["256"])).unwrap(),
            EngineCommand::NumberZones(MAX_ZONES)
        );
        assert!(EngineCommand::parse("method", &args(&["fast"])).is_err());
        assert!(EngineCommand::parse("updateMode", &args(&["merge"])).is_err());
        assert!(EngineCommand::parse("loudspeakerswitch", &args(&["5"])).is_err());
    }
}
