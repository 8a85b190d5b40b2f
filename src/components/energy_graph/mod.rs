mod color;
mod component;
mod render;
mod simulation;
mod state;
mod types;

pub use component::EnergyGraph;
pub use types::{
	Archetype, Entity, GraphData, Reaction, ReactionSentiment, RelationKind, Relationship,
};
