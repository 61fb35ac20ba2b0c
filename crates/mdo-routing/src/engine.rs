//! MDO Routing Engine
//!
//! Runs one routing cycle per metadata period. Everything that can arrive
//! between cycles (loudspeaker payloads, switch changes, control commands)
//! is queued or staged and only applied at the start of the next cycle.
//!
//! Per cycle:
//! 1. drain control commands, swap in staged loudspeaker updates
//! 2. derive the active device view
//! 3. visit objects exclusive-first, then by id
//! 4. per object: group short-circuit, lock and quality filtering,
//!    eligibility gating, strategy invocation, gain composition
//! 5. persist routing state, reset the edge-triggered flags

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use crossbeam_channel::{Receiver, Sender};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;

use crate::active::ActiveDevices;
use crate::command::EngineCommand;
use crate::config::{self, EngineConfig, UpdateMode};
use crate::diagnostics::{LogSink, StatusMessage, StatusSink, device_table, object_table};
use crate::error::{MdoError, MdoResult};
use crate::gain::{compose_device_gains, db_to_linear};
use crate::loudspeaker::{DeviceId, LoudspeakerEntry, LoudspeakerRegistry};
use crate::object::{AudioObject, ObjectId, ObjectType, object_list_value, parse_object_list};
use crate::state::{GroupCache, RoutingState, RoutingTable};
use crate::strategy::{RouteRequest, RoutingMethod, StrategySet};
use crate::staging::{StagedEvent, UpdateStager};

/// Objects at or below this linear level (about -100 dB) are inactive
pub const MIN_ACTIVE_LEVEL: f32 = 1e-5;

/// Summary of the last cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Cycle counter (0-based)
    pub cycle: u64,
    /// Processing was switched off; objects passed through
    pub bypassed: bool,
    /// A loudspeaker update was applied at the start of the cycle
    pub topology_changed: bool,
    pub routed: usize,
    pub muted: usize,
    /// Left on their bed channel (not eligible, or no device found)
    pub bed: usize,
    /// Copied from a group leader
    pub group_copied: usize,
    /// Devices claimed by exclusive objects
    pub locked: BTreeSet<DeviceId>,
}

/// Clonable, thread-safe entry point for control threads
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: Sender<EngineCommand>,
    stager: UpdateStager,
}

impl EngineHandle {
    /// Submit a command for the next cycle.
    ///
    /// Loudspeaker changes are staged right away, in the same order as
    /// payloads. Loader commands read their file on the calling thread; a
    /// failed read leaves the engine on its current registry.
    pub fn send(&self, command: EngineCommand) -> MdoResult<()> {
        match command {
            EngineCommand::LoudspeakerConfig(path) => {
                stage_file(&self.stager, &path, Some(UpdateMode::Overwrite))
            }
            EngineCommand::ReadFromFile(path) => stage_file(&self.stager, &path, None),
            EngineCommand::LoudspeakerSwitch { id, enabled } => {
                self.stager.stage_switch(id, enabled);
                Ok(())
            }
            EngineCommand::UpdateDevices => {
                self.stager.request_refresh();
                Ok(())
            }
            other => {
                let name = other.name();
                self.commands
                    .send(other)
                    .map_err(|_| MdoError::InvalidCommand(format!("{}: engine dropped", name)))
            }
        }
    }

    /// Parse and submit a keyed command
    pub fn send_keyed(&self, key: &str, args: &[String]) -> MdoResult<()> {
        self.send(EngineCommand::parse(key, args)?)
    }

    /// Stage a JSON loudspeaker payload (configured update mode)
    pub fn stage_payload(&self, json: &str) -> MdoResult<()> {
        let warnings = self.stager.stage_json(json)?;
        if !warnings.is_empty() {
            log::debug!("Loudspeaker payload staged with {} warning(s)", warnings.len());
        }
        Ok(())
    }
}

fn stage_file(stager: &UpdateStager, path: &Path, mode: Option<UpdateMode>) -> MdoResult<()> {
    let (entries, _warnings) = config::load_payload_file(path)?;
    stager.stage_entries(entries, mode);
    Ok(())
}

/// Per-cycle routing engine
pub struct MdoRoutingEngine {
    config: EngineConfig,
    registry: LoudspeakerRegistry,
    table: RoutingTable,
    strategies: StrategySet,
    rng: ChaCha8Rng,
    sink: Box<dyn StatusSink>,

    // Cross-thread inputs
    stager: UpdateStager,
    command_tx: Sender<EngineCommand>,
    command_rx: Receiver<EngineCommand>,

    // Edge-triggered flags, consumed by the next enabled cycle
    topology_pending: bool,
    clear_pending: bool,
    devices_dirty: bool,

    cycle: u64,
    last_output: Vec<AudioObject>,
    last_report: CycleReport,
}

impl MdoRoutingEngine {
    /// Create an engine logging its status output
    pub fn new(config: EngineConfig) -> Self {
        Self::with_sink(config, Box::new(LogSink))
    }

    /// Create an engine with a custom status sink
    pub fn with_sink(config: EngineConfig, sink: Box<dyn StatusSink>) -> Self {
        let rng = config
            .seed
            .map_or_else(ChaCha8Rng::from_os_rng, ChaCha8Rng::seed_from_u64);
        let (command_tx, command_rx) = crossbeam_channel::unbounded();

        Self {
            strategies: StrategySet::new(config.normalize_positions),
            config,
            registry: LoudspeakerRegistry::new(),
            table: RoutingTable::new(),
            rng,
            sink,
            stager: UpdateStager::new(),
            command_tx,
            command_rx,
            topology_pending: false,
            clear_pending: false,
            devices_dirty: false,
            cycle: 0,
            last_output: Vec::new(),
            last_report: CycleReport::default(),
        }
    }

    /// Reseed the zonal shuffle RNG
    pub fn seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn set_sink(&mut self, sink: Box<dyn StatusSink>) {
        self.sink = sink;
    }

    /// Handle for control threads
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            commands: self.command_tx.clone(),
            stager: self.stager.clone(),
        }
    }

    /// Stage loudspeaker entries for the next cycle
    pub fn stage_loudspeakers(&self, entries: Vec<LoudspeakerEntry>, mode: Option<UpdateMode>) {
        self.stager.stage_entries(entries, mode);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &LoudspeakerRegistry {
        &self.registry
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn last_report(&self) -> &CycleReport {
        &self.last_report
    }

    pub fn last_output(&self) -> &[AudioObject] {
        &self.last_output
    }

    // ═══════════════════════════════════════════════════════════════════════
    // COMMANDS
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply a command on the engine's own thread.
    ///
    /// Settings take effect immediately; loudspeaker changes are staged for
    /// the next cycle.
    pub fn handle_command(&mut self, command: EngineCommand) -> MdoResult<()> {
        let staged = match &command {
            EngineCommand::LoudspeakerConfig(path) => {
                Some(stage_file(&self.stager, path, Some(UpdateMode::Overwrite)))
            }
            EngineCommand::ReadFromFile(path) => Some(stage_file(&self.stager, path, None)),
            _ => None,
        };

        match staged {
            Some(Err(e)) => {
                self.sink
                    .emit(StatusMessage::Notice(format!("{} failed: {}", command.name(), e)));
                Err(e)
            }
            Some(Ok(())) => Ok(()),
            None => {
                self.apply_command(command);
                Ok(())
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: EngineCommand) {
        log::debug!("Engine command: {}", command.name());
        match command {
            EngineCommand::On(on) => {
                if self.config.enabled != on {
                    self.sink.emit(StatusMessage::Notice(format!(
                        "MDO routing {}",
                        if on { "on" } else { "off" }
                    )));
                }
                self.config.enabled = on;
            }
            EngineCommand::Verbose(verbose) => {
                self.config.verbose = verbose;
                self.devices_dirty |= verbose;
            }
            EngineCommand::Method(method) => {
                log::info!("Routing method: {:?}", method);
                self.config.method = method;
            }
            EngineCommand::NumberZones(zones) => {
                log::info!("Zone count: {}", zones);
                self.config.zone_count = zones;
            }
            EngineCommand::LoudspeakerSwitch { id, enabled } => {
                self.stager.stage_switch(id, enabled);
            }
            EngineCommand::UpdateDevices => self.stager.request_refresh(),
            EngineCommand::ClearDeviceHistory => self.clear_pending = true,
            EngineCommand::UpdateMode(mode) => {
                log::info!("Loudspeaker update mode: {:?}", mode);
                self.config.update_mode = mode;
            }
            EngineCommand::RefreshPeriod(period) => self.config.refresh_period = period,
            EngineCommand::LoudspeakerConfig(path) => {
                if let Err(e) = stage_file(&self.stager, &path, Some(UpdateMode::Overwrite)) {
                    log::warn!("loudspeakerconfig {}: {}", path.display(), e);
                }
            }
            EngineCommand::ReadFromFile(path) => {
                if let Err(e) = stage_file(&self.stager, &path, None) {
                    log::warn!("readFromFile {}: {}", path.display(), e);
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CYCLE
    // ═══════════════════════════════════════════════════════════════════════

    fn apply_staged(&mut self) {
        let staged = self.stager.take();
        if staged.is_empty() {
            return;
        }

        for event in staged.events {
            match event {
                StagedEvent::Payload(payload) => {
                    let mode = payload.mode.unwrap_or(self.config.update_mode);
                    let warnings = match mode {
                        UpdateMode::Overwrite => {
                            self.clear_pending = true;
                            self.registry.replace_all(&payload.entries)
                        }
                        UpdateMode::Update => self.registry.apply_patch(&payload.entries),
                    };
                    log::info!(
                        "Applied loudspeaker payload: {} entries, {:?}, {} warning(s)",
                        payload.entries.len(),
                        mode,
                        warnings.len()
                    );
                }
                StagedEvent::Switch { id, enabled } => {
                    if !self.registry.set_switch(id, enabled) {
                        log::warn!("Switch for unknown loudspeaker {}", id);
                    }
                }
            }
        }

        self.topology_pending = true;
        self.devices_dirty = true;
    }

    /// Run one cycle and return the routed objects in input order
    pub fn process(&mut self, mut objects: Vec<AudioObject>) -> Vec<AudioObject> {
        self.drain_commands();

        if !self.config.enabled {
            self.last_report = CycleReport {
                cycle: self.cycle,
                bypassed: true,
                ..Default::default()
            };
            self.cycle += 1;
            self.last_output = objects.clone();
            return objects;
        }

        self.apply_staged();

        // Mute dependencies read the flags as they stood at the end of the last cycle
        let previous_active = self.table.active_flags();
        if self.clear_pending {
            log::debug!("Clearing routing history");
            self.table.clear_history();
        }

        if self.config.verbose && self.devices_dirty {
            self.sink
                .emit(StatusMessage::DeviceTable(device_table(&self.registry)));
        }

        let active = ActiveDevices::compute(&self.registry);
        let join_zoned = active.with_join_order_zones(self.config.zone_count);

        let mut report = CycleReport {
            cycle: self.cycle,
            topology_changed: self.topology_pending,
            ..Default::default()
        };
        let mut groups = GroupCache::new();

        for index in evaluation_order(&objects) {
            let object = &mut objects[index];
            self.route_object(
                object,
                &active,
                &join_zoned,
                &previous_active,
                &mut groups,
                &mut report,
            );
        }

        // Objects missing from this cycle no longer hold routing or active state
        let present: HashSet<ObjectId> = objects.iter().filter_map(|o| o.id).collect();
        self.table.retain(|id| present.contains(&id));

        self.topology_pending = false;
        self.clear_pending = false;
        self.devices_dirty = false;

        if self.config.verbose
            && self.config.refresh_period > 0
            && self.cycle % u64::from(self.config.refresh_period) == 0
        {
            self.sink.emit(StatusMessage::ObjectTable(object_table(&objects)));
        }

        log::trace!(
            "Cycle {}: {} routed, {} muted, {} bed, {} grouped",
            report.cycle,
            report.routed,
            report.muted,
            report.bed,
            report.group_copied
        );

        self.cycle += 1;
        self.last_report = report;
        self.last_output = objects.clone();
        objects
    }

    /// Run one cycle on a JSON object list.
    ///
    /// A payload that is not a sequence is reported and the previous
    /// cycle's output is returned unchanged.
    pub fn process_value(&mut self, payload: &Value) -> Value {
        match parse_object_list(payload) {
            Ok((objects, _warnings)) => object_list_value(&self.process(objects)),
            Err(e) => {
                log::warn!("{}; repeating previous output", e);
                object_list_value(&self.last_output)
            }
        }
    }

    fn route_object(
        &mut self,
        object: &mut AudioObject,
        active: &ActiveDevices,
        join_zoned: &ActiveDevices,
        previous_active: &HashMap<ObjectId, bool>,
        groups: &mut GroupCache,
        report: &mut CycleReport,
    ) {
        // Invalid ids never share or persist results
        let Some(id) = object.id else {
            let state = self.evaluate(
                object,
                active,
                join_zoned,
                &RoutingState::NoHistory,
                previous_active,
                report,
            );
            log::debug!("object -1: {:?}", state);
            return;
        };

        if let Some(state) = groups.apply(object) {
            log::debug!("object {}: copied from group {}", id, object.group);
            self.table.set(id, state);
            report.group_copied += 1;
            return;
        }

        let previous = self.table.get(id).clone();
        let state =
            self.evaluate(object, active, join_zoned, &previous, previous_active, report);
        log::debug!("object {}: {:?}", id, state);

        groups.insert(object.group, object, &state);
        self.table.set(id, state);
    }

    /// Gate one object and route it if eligible. Mutates the object's
    /// output fields and returns its new routing state.
    fn evaluate(
        &mut self,
        object: &mut AudioObject,
        active: &ActiveDevices,
        join_zoned: &ActiveDevices,
        previous: &RoutingState,
        previous_active: &HashMap<ObjectId, bool>,
        report: &mut CycleReport,
    ) -> RoutingState {
        let method = RoutingMethod::resolve(object.method, self.config.method);
        let base = if method == RoutingMethod::UnknownLocation {
            join_zoned
        } else {
            active
        };
        let available = base
            .without(&report.locked)
            .with_min_quality(object.min_quality);
        let count = available.len() as u32;

        // mdoOnly without a threshold can never be satisfied
        let threshold = if object.mdo_only && object.mdo_threshold.is_none() {
            Some(count + 1)
        } else {
            object.mdo_threshold
        };
        let eligible = threshold.is_some_and(|t| count >= t);

        let muted_by_dependency = object
            .mute_if_object
            .and_then(|other| previous_active.get(&other).copied())
            .unwrap_or(false);
        let is_active = !(object.mdo_only && !eligible)
            && object.level > MIN_ACTIVE_LEVEL
            && !muted_by_dependency;

        if !is_active {
            object.level = 0.0;
            report.muted += 1;
            return RoutingState::Muted;
        }
        if !eligible {
            report.bed += 1;
            return RoutingState::NoHistory;
        }

        let decision = {
            let request = RouteRequest {
                object: &*object,
                devices: &available,
                previous,
                topology_changed: self.topology_pending,
                zone_count: self.config.zone_count,
            };
            self.strategies.for_method(method).route(&request, &mut self.rng)
        };

        let Some(decision) = decision else {
            if object.mdo_only {
                object.level = 0.0;
                report.muted += 1;
                return RoutingState::Muted;
            }
            report.bed += 1;
            return RoutingState::NoHistory;
        };

        let ids = decision.ids();
        let gains: Vec<f32> = ids
            .iter()
            .map(|device| available.get(*device).map_or(1.0, |d| d.gain))
            .collect();

        object.kind = ObjectType::DirectSpeakers;
        object.output_channels = ids.clone();
        object.level *= db_to_linear(object.gain_db) * compose_device_gains(&gains);

        if object.exclusive {
            report.locked.extend(ids);
        }
        report.routed += 1;
        RoutingState::from_decision(&decision)
    }
}

/// Exclusive objects first, then ascending id; invalid ids count as -1.
///
/// The key is `(1 - exclusive) + id * 1e-4`. The sort is stable so equal
/// keys keep input order.
fn evaluation_order(objects: &[AudioObject]) -> Vec<usize> {
    let key = |object: &AudioObject| {
        let exclusive = if object.exclusive { 1.0 } else { 0.0 };
        let id = object.id.map_or(-1.0, f64::from);
        (1.0 - exclusive) + id * 1e-4
    };

    let mut order: Vec<usize> = (0..objects.len()).collect();
    order.sort_by(|a, b| key(&objects[*a]).total_cmp(&key(&objects[*b])));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ChannelSink;
    use crate::position::ObjectPosition;
    use approx::assert_relative_eq;
    use serde_json::json;
    use std::io::Write;

    const SPEAKERS: &str = r#"{"mdoLoudspeakers": [
        {"id": 1, "mdo": 1, "mdoZone": 1, "joined": 0, "x": -1, "y": 1, "z": 0},
        {"id": 2, "mdo": 1, "mdoZone": 1, "joined": 1, "x": 1, "y": 1, "z": 0},
        {"id": 3, "mdo": 1, "mdoZone": 2, "joined": 2, "x": 0, "y": -4, "z": 0}
    ]}"#;

    fn engine(method: RoutingMethod) -> MdoRoutingEngine {
        let config = EngineConfig {
            method,
            seed: Some(11),
            ..Default::default()
        };
        let engine = MdoRoutingEngine::new(config);
        engine.handle().stage_payload(SPEAKERS).unwrap();
        engine
    }

    fn placed(id: ObjectId, x: f32, y: f32) -> AudioObject {
        let mut object = AudioObject::new(id);
        object.mdo_threshold = Some(1);
        object.position = ObjectPosition::Cartesian { x, y, z: 0.0 };
        object
    }

    #[test]
    fn test_staged_update_applied_at_cycle_start() {
        let mut engine = engine(RoutingMethod::Nearest);
        assert!(engine.registry().is_empty());

        let out = engine.process(vec![placed(1, -0.9, 0.9)]);
        assert_eq!(engine.registry().len(), 3);
        assert!(engine.last_report().topology_changed);
        assert_eq!(out[0].output_channels, vec![1]);
        assert_eq!(out[0].kind, ObjectType::DirectSpeakers);

        engine.process(vec![placed(1, -0.9, 0.9)]);
        assert!(!engine.last_report().topology_changed);
    }

    #[test]
    fn test_output_keeps_input_order() {
        let mut engine = engine(RoutingMethod::Nearest);
        let out = engine.process(vec![
            AudioObject::new(3),
            AudioObject::new(1),
            AudioObject::new(2),
        ]);
        let ids: Vec<_> = out.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![Some(3), Some(1), Some(2)]);
    }

    #[test]
    fn test_evaluation_order_exclusive_first() {
        let mut exclusive = AudioObject::new(9);
        exclusive.exclusive = true;
        let objects = vec![
            AudioObject::new(2),
            exclusive,
            AudioObject::default(),
            AudioObject::new(1),
        ];
        assert_eq!(evaluation_order(&objects), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_clear_history_forces_research() {
        let mut engine = engine(RoutingMethod::Nearest);
        assert_eq!(engine.process(vec![placed(1, -0.9, 0.9)])[0].output_channels, vec![1]);

        // Static object sticks while nothing changes
        assert_eq!(engine.process(vec![placed(1, 0.9, 0.9)])[0].output_channels, vec![1]);

        engine.handle().send(EngineCommand::ClearDeviceHistory).unwrap();
        assert_eq!(engine.process(vec![placed(1, 0.9, 0.9)])[0].output_channels, vec![2]);
    }

    #[test]
    fn test_switch_is_a_topology_change() {
        let mut engine = engine(RoutingMethod::Nearest);
        engine.process(vec![placed(1, -0.9, 0.9)]);

        engine
            .handle()
            .send_keyed("loudspeakerswitch", &["3".to_string(), "0".to_string()])
            .unwrap();
        let out = engine.process(vec![placed(1, 0.9, 0.9)]);
        assert_eq!(out[0].output_channels, vec![2]);
        assert!(!engine.registry().get(3).unwrap().enabled);
    }

    #[test]
    fn test_staged_changes_apply_in_arrival_order() {
        let mut engine = engine(RoutingMethod::Nearest);
        engine.handle_command(EngineCommand::UpdateMode(UpdateMode::Update)).unwrap();
        engine.process(Vec::new());
        let patch_on = r#"{"mdoLoudspeakers": [{"id": 3, "switch": 1}]}"#;
        let patch_off = r#"{"mdoLoudspeakers": [{"id": 3, "switch": 0}]}"#;

        // Switch off, then a later patch turns the device back on
        let handle = engine.handle();
        handle.send(EngineCommand::LoudspeakerSwitch { id: 3, enabled: false }).unwrap();
        handle.stage_payload(patch_on).unwrap();
        engine.process(Vec::new());
        assert!(engine.registry().get(3).unwrap().enabled);

        handle.stage_payload(patch_off).unwrap();
        handle.send_keyed("loudspeakerswitch", &["3".to_string(), "1".to_string()]).unwrap();
        engine.process(Vec::new());
        assert!(engine.registry().get(3).unwrap().enabled);

        handle.stage_payload(patch_on).unwrap();
        engine.handle_command(EngineCommand::LoudspeakerSwitch { id: 3, enabled: false }).unwrap();
        engine.process(Vec::new());
        assert!(!engine.registry().get(3).unwrap().enabled);
    }

    #[test]
    fn test_mute_dependency_is_one_cycle_stale() {
        let mut engine = engine(RoutingMethod::Zonal);
        let leader = |level: f32| {
            let mut object = AudioObject::new(1);
            object.level = level;
            object
        };
        let follower = || {
            let mut object = AudioObject::new(2);
            object.mute_if_object = Some(1);
            object.level = 0.8;
            object
        };

        let out = engine.process(vec![leader(1.0), follower()]);
        assert_eq!(out[1].level, 0.8);

        let out = engine.process(vec![leader(1.0), follower()]);
        assert_eq!(out[1].level, 0.0);

        // Leader goes silent; follower still sees last cycle's flag
        let out = engine.process(vec![leader(0.0), follower()]);
        assert_eq!(out[1].level, 0.0);

        let out = engine.process(vec![leader(0.0), follower()]);
        assert_eq!(out[1].level, 0.8);
    }

    #[test]
    fn test_departed_mute_target_releases_follower() {
        let mut engine = engine(RoutingMethod::Zonal);
        let mut follower = AudioObject::new(2);
        follower.mute_if_object = Some(1);
        follower.level = 0.8;

        engine.process(vec![AudioObject::new(1), follower.clone()]);
        assert_eq!(engine.routing_table().len(), 2);

        // Object 1 was active at the end of the last cycle
        let out = engine.process(vec![follower.clone()]);
        assert_eq!(out[0].level, 0.0);
        assert_eq!(engine.routing_table().len(), 1);

        for _ in 0..4 {
            let out = engine.process(vec![follower.clone()]);
            assert_eq!(out[0].level, 0.8);
        }
        assert!(!engine.routing_table().active_flags().contains_key(&1));
    }

    #[test]
    fn test_bypass_keeps_pending_update() {
        let mut engine = engine(RoutingMethod::Nearest);
        engine.handle_command(EngineCommand::On(false)).unwrap();

        let out = engine.process(vec![placed(1, -0.9, 0.9)]);
        assert!(engine.last_report().bypassed);
        assert!(out[0].output_channels.is_empty());
        assert!(engine.registry().is_empty());

        engine.handle().send(EngineCommand::On(true)).unwrap();
        let out = engine.process(vec![placed(1, -0.9, 0.9)]);
        assert!(engine.last_report().topology_changed);
        assert_eq!(out[0].output_channels, vec![1]);
    }

    #[test]
    fn test_invalid_payload_repeats_last_output() {
        let mut engine = engine(RoutingMethod::Nearest);
        let first = engine.process_value(&json!([
            {"id": 1, "mdoThreshold": 1, "position": {"x": -0.9, "y": 0.9, "z": 0}}
        ]));
        assert_eq!(first[0]["outputChannels"], json!("1"));

        let repeated = engine.process_value(&json!({"id": 1}));
        assert_eq!(repeated, first);
    }

    #[test]
    fn test_invalid_id_still_routed() {
        let mut engine = engine(RoutingMethod::Nearest);
        let mut object = placed(0, -0.9, 0.9);
        object.id = None;
        object.group = 4;
        let out = engine.process(vec![object]);
        assert_eq!(out[0].output_channels, vec![1]);
        assert!(engine.routing_table().is_empty());
    }

    #[test]
    fn test_object_and_device_gain() {
        let mut engine = engine(RoutingMethod::Nearest);
        engine
            .handle()
            .stage_payload(r#"{"mdoLoudspeakers": [{"id": 1, "mdoGainDB": -6}]}"#)
            .unwrap();
        engine.handle_command(EngineCommand::UpdateMode(UpdateMode::Update)).unwrap();

        let mut object = placed(1, -0.9, 0.9);
        object.level = 0.5;
        object.gain_db = 6.0;
        let out = engine.process(vec![object]);

        // Patch kept the other fields of device 1
        assert_eq!(out[0].output_channels, vec![1]);
        assert_relative_eq!(out[0].level, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_readfromfile_uses_configured_mode() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"mdoLoudspeakers": [{{"id": 2, "switch": 0}}]}}"#).unwrap();

        let mut engine = engine(RoutingMethod::Nearest);
        engine.process(Vec::new());
        engine.handle_command(EngineCommand::UpdateMode(UpdateMode::Update)).unwrap();
        engine
            .handle_command(EngineCommand::ReadFromFile(file.path().to_path_buf()))
            .unwrap();
        engine.process(Vec::new());
        assert_eq!(engine.registry().len(), 3);
        assert!(!engine.registry().get(2).unwrap().enabled);

        engine
            .handle_command(EngineCommand::LoudspeakerConfig(file.path().to_path_buf()))
            .unwrap();
        engine.process(Vec::new());
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn test_missing_file_keeps_registry() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = engine(RoutingMethod::Nearest);
        engine.set_sink(Box::new(ChannelSink::new(tx)));
        engine.process(Vec::new());

        let missing = EngineCommand::LoudspeakerConfig("/nonexistent/ls.json".into());
        let result = engine.handle_command(missing);
        assert!(result.is_err());
        assert!(rx.try_recv().is_ok());

        engine.process(Vec::new());
        assert_eq!(engine.registry().len(), 3);
    }

    #[test]
    fn test_verbose_emits_tables() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let config = EngineConfig {
            verbose: true,
            refresh_period: 2,
            seed: Some(1),
            ..Default::default()
        };
        let mut engine = MdoRoutingEngine::with_sink(config, Box::new(ChannelSink::new(tx)));
        engine.handle().stage_payload(SPEAKERS).unwrap();

        engine.process(vec![AudioObject::new(1)]);
        let first: Vec<_> = rx.try_iter().collect();
        assert!(matches!(first[0], StatusMessage::DeviceTable(_)));
        assert!(matches!(first[1], StatusMessage::ObjectTable(_)));

        engine.process(vec![AudioObject::new(1)]);
        assert_eq!(rx.try_iter().count(), 0);

        engine.process(vec![AudioObject::new(1)]);
        assert_eq!(rx.try_iter().count(), 1);
    }
}
