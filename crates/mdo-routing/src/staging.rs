//! Staged loudspeaker updates
//!
//! Payloads arrive on network or control threads at any time. They are
//! parked here and swapped out by the engine at the start of its next
//! cycle, so strategies never observe a half-applied loudspeaker list.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::UpdateMode;
use crate::error::{FieldWarning, MdoResult};
use crate::loudspeaker::{DeviceId, LoudspeakerEntry, parse_loudspeaker_json};

/// One received payload
#[derive(Debug, Clone, PartialEq)]
pub struct StagedPayload {
    pub entries: Vec<LoudspeakerEntry>,
    /// Forced mode; `None` uses the engine's configured mode
    pub mode: Option<UpdateMode>,
}

/// One change received between cycles
#[derive(Debug, Clone, PartialEq)]
pub enum StagedEvent {
    Payload(StagedPayload),
    Switch { id: DeviceId, enabled: bool },
}

/// Everything received since the last cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedUpdate {
    /// Payloads and switch changes, in arrival order
    pub events: Vec<StagedEvent>,
    /// Treat the next cycle as a loudspeaker update even without payload
    pub refresh: bool,
}

impl StagedUpdate {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && !self.refresh
    }
}

/// Clonable handle to the staging buffer
#[derive(Debug, Clone, Default)]
pub struct UpdateStager {
    inner: Arc<Mutex<StagedUpdate>>,
}

impl UpdateStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage parsed entries
    pub fn stage_entries(&self, entries: Vec<LoudspeakerEntry>, mode: Option<UpdateMode>) {
        self.inner
            .lock()
            .events
            .push(StagedEvent::Payload(StagedPayload { entries, mode }));
    }

    /// Parse and stage a JSON payload.
    ///
    /// On a parse error nothing is staged and the engine keeps its
    /// last-known-good registry.
    pub fn stage_json(&self, json: &str) -> MdoResult<Vec<FieldWarning>> {
        let (entries, warnings) = parse_loudspeaker_json(json)?;
        log::debug!("Staged loudspeaker payload with {} entries", entries.len());
        self.stage_entries(entries, None);
        Ok(warnings)
    }

    pub fn stage_switch(&self, id: DeviceId, enabled: bool) {
        self.inner
            .lock()
            .events
            .push(StagedEvent::Switch { id, enabled });
    }

    pub fn request_refresh(&self) {
        self.inner.lock().refresh = true;
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.lock().is_empty()
    }

    /// Swap out everything staged so far
    pub fn take(&self) -> StagedUpdate {
        mem::take(&mut *self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_take_swaps_out() {
        let stager = UpdateStager::new();
        assert!(!stager.has_pending());

        stager.stage_entries(vec![LoudspeakerEntry::new(1, json!({}))], None);
        stager.stage_switch(1, false);
        assert!(stager.has_pending());

        let update = stager.take();
        assert_eq!(update.events.len(), 2);
        assert!(matches!(update.events[0], StagedEvent::Payload(_)));
        assert_eq!(update.events[1], StagedEvent::Switch { id: 1, enabled: false });
        assert!(!stager.has_pending());
    }

    #[test]
    fn test_events_keep_arrival_order() {
        let stager = UpdateStager::new();
        stager.stage_switch(5, false);
        stager.stage_json(r#"{"mdoLoudspeakers": [{"id": 5, "switch": 1}]}"#).unwrap();
        stager.stage_switch(5, true);

        let events = stager.take().events;
        assert_eq!(events[0], StagedEvent::Switch { id: 5, enabled: false });
        assert!(matches!(&events[1], StagedEvent::Payload(p) if p.entries.len() == 1));
        assert_eq!(events[2], StagedEvent::Switch { id: 5, enabled: true });
    }

    #[test]
    fn test_bad_json_stages_nothing() {
        let stager = UpdateStager::new();
        assert!(stager.stage_json("{\"mdoLoudspeakers\": 3}").is_err());
        assert!(!stager.has_pending());
    }

    #[test]
    fn test_staging_from_other_threads() {
        let stager = UpdateStager::new();
        let handles: Vec<_> = (1..=4)
            .map(|id| {
                let stager = stager.clone();
                thread::spawn(move || {
                    let payload = format!(r#"{{"mdoLoudspeakers": [{{"id": {}}}]}}"#, id);
                    stager.stage_json(&payload).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let update = stager.take();
        assert_eq!(update.events.len(), 4);
        assert!(update.events.iter().all(|e| matches!(e, StagedEvent::Payload(_))));
    }
}
