//! # MDO Routing
//!
//! Per-cycle routing of spatial audio objects onto ad hoc playback devices
//! ("MDO" loudspeakers) that join and leave a listening session.
//!
//! ## Architecture
//!
//! - **LoudspeakerRegistry**: known devices, replaced or patched from payloads
//! - **ActiveDevices**: enabled MDO devices in join order
//! - **Strategies**: direct, zonal (single-pick or spread), nearest neighbour
//! - **RoutingTable / GroupCache**: hysteresis across cycles, per-group sharing
//! - **MdoRoutingEngine**: gating, strategy dispatch, gain composition
//!
//! ## Threading
//!
//! A cycle runs on one thread. Loudspeaker payloads and control commands
//! from other threads go through an [`EngineHandle`] and are applied at the
//! start of the next cycle.

pub mod active;
pub mod coerce;
pub mod command;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod gain;
pub mod loudspeaker;
pub mod object;
pub mod position;
pub mod staging;
pub mod state;
pub mod strategy;

mod error;

pub use active::{ActiveDevice, ActiveDevices};
pub use command::EngineCommand;
pub use config::{EngineConfig, MAX_ZONES, UpdateMode, load_payload_file};
pub use diagnostics::{ChannelSink, LogSink, StatusMessage, StatusSink};
pub use engine::{CycleReport, EngineHandle, MIN_ACTIVE_LEVEL, MdoRoutingEngine};
pub use error::{FieldWarning, MdoError, MdoResult};
pub use loudspeaker::{
    DeviceId, Loudspeaker, LoudspeakerEntry, LoudspeakerRegistry, Quality, Zone,
    parse_loudspeaker_json, parse_loudspeaker_payload,
};
pub use object::{AudioObject, ObjectId, ObjectType, object_list_value, parse_object_list};
pub use position::{ObjectPosition, Position3D};
pub use state::{GroupCache, RoutingState, RoutingTable};
pub use strategy::{RouteDecision, RouteRequest, RoutedDevice, RoutingMethod, RoutingStrategy};
