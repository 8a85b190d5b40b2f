//! Reusable view components.

pub mod energy_graph;
pub mod live_coach;
