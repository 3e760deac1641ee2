//! Control-panel core for the ideaspread simulation service.
//!
//! The service runs an agent-based model of idea propagation through a city
//! population and renders each run to a video. This crate owns the client
//! side of that exchange: the editable parameter baseline, the single-flight
//! run lifecycle, and the derived display values (resolved media URL, raw
//! statistics) a presentation layer renders. Presentation itself lives
//! elsewhere; see `src/bin/panel_cli.rs` for a terminal front end.

pub mod controller;
pub mod params;
pub mod service;

pub use controller::{PanelConfig, RunController, RunState};
pub use params::{FIELD_NAMES, ParamEntry, ParameterStore, SimulationParameters};
pub use service::{
    HttpSimulationService, RunStatistics, STATUS_SUCCESS, ServiceError, SimulateReply,
    SimulationService, join_url,
};
