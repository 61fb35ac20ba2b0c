//! Status output
//!
//! Verbose tables are not log lines: they go through a [`StatusSink`]
//! injected into the engine, so a host can forward them over its own
//! transport. [`LogSink`] is the default.

use std::fmt::Write as _;

use crossbeam_channel::Sender;

use crate::loudspeaker::LoudspeakerRegistry;
use crate::object::AudioObject;

/// One status message
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    /// Loudspeaker table after a registry change
    DeviceTable(String),
    /// Periodic object table
    ObjectTable(String),
    /// Free-form notice (mode changes, rejected commands)
    Notice(String),
}

impl StatusMessage {
    pub fn text(&self) -> &str {
        match self {
            Self::DeviceTable(text) | Self::ObjectTable(text) | Self::Notice(text) => text,
        }
    }
}

/// Receiver for engine status output
pub trait StatusSink: Send {
    fn emit(&mut self, message: StatusMessage);
}

/// Forwards status messages to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn emit(&mut self, message: StatusMessage) {
        match &message {
            StatusMessage::Notice(text) => log::info!("{}", text),
            StatusMessage::DeviceTable(text) | StatusMessage::ObjectTable(text) => {
                log::info!("\n{}", text)
            }
        }
    }
}

/// Sends status messages over a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<StatusMessage>,
}

impl ChannelSink {
    pub fn new(tx: Sender<StatusMessage>) -> Self {
        Self { tx }
    }
}

impl StatusSink for ChannelSink {
    fn emit(&mut self, message: StatusMessage) {
        if self.tx.send(message).is_err() {
            log::debug!("Status receiver dropped");
        }
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Loudspeaker table: id, label, channel, mdo, position, switch, zone,
/// quality, join order
pub fn device_table(registry: &LoudspeakerRegistry) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4} {:<12} {:>4} {:>3} {:>22} {:>3} {:>4} {:>6} {:>6}",
        "id", "label", "ch", "mdo", "position", "on", "zone", "qual", "joined"
    );
    for speaker in registry.iter() {
        let position = format!(
            "({:.2}, {:.2}, {:.2})",
            speaker.position.x, speaker.position.y, speaker.position.z
        );
        let _ = writeln!(
            out,
            "{:>4} {:<12} {:>4} {:>3} {:>22} {:>3} {:>4} {:>6} {:>6}",
            speaker.id,
            speaker.label,
            opt(speaker.channel),
            u8::from(speaker.mdo),
            position,
            u8::from(speaker.enabled),
            opt(speaker.zone),
            speaker.quality,
            opt(speaker.join_order),
        );
    }
    out
}

/// Object table: id, group, type, output channels, level
pub fn object_table(objects: &[AudioObject]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4} {:>5} {:<14} {:<12} {:>8}",
        "id", "group", "type", "channels", "level"
    );
    for object in objects {
        let id = object.id.map_or(-1, i64::from);
        let _ = writeln!(
            out,
            "{:>4} {:>5} {:<14} {:<12} {:>8.4}",
            id,
            object.group,
            object.kind.as_str(),
            object.output_channels_string(),
            object.level
        );
    }
    out
}
