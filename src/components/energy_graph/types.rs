use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

/// Lowest and highest accepted influence/weight score.
pub const SCORE_RANGE: (u8, u8) = (1, 10);

/// Color used when an entity arrives without a sentiment color.
pub const DEFAULT_SENTIMENT_COLOR: &str = "#cbd5e1";

/// Social archetype assigned to a chat participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Archetype {
	#[serde(rename = "The Anchor")]
	Anchor,
	#[serde(rename = "The Spark")]
	Spark,
	#[serde(rename = "The Glue")]
	Glue,
	#[serde(rename = "The Ghost")]
	Ghost,
	#[serde(rename = "The Void")]
	Void,
	#[default]
	#[serde(rename = "NPC")]
	Npc,
}

impl Archetype {
	/// Short name shown under the node.
	pub fn short_name(self) -> &'static str {
		match self {
			Archetype::Anchor => "Anchor",
			Archetype::Spark => "Spark",
			Archetype::Glue => "Glue",
			Archetype::Ghost => "Ghost",
			Archetype::Void => "Void",
			Archetype::Npc => "NPC",
		}
	}

	/// Accepts both `"The Anchor"` and `"Anchor"`, any case. Unknown roles are NPCs.
	pub fn from_label(label: &str) -> Self {
		let label = label.trim();
		let name = label
			.strip_prefix("The ")
			.or_else(|| label.strip_prefix("the "))
			.unwrap_or(label);
		match name.to_ascii_lowercase().as_str() {
			"anchor" => Archetype::Anchor,
			"spark" => Archetype::Spark,
			"glue" => Archetype::Glue,
			"ghost" => Archetype::Ghost,
			"void" => Archetype::Void,
			_ => Archetype::Npc,
		}
	}
}

impl<'de> Deserialize<'de> for Archetype {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let label = Option::<String>::deserialize(deserializer)?;
		Ok(label.map_or_else(Self::default, |l| Archetype::from_label(&l)))
	}
}

/// A chat participant (graph node).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
	pub id: String,
	#[serde(default)]
	pub role: Archetype,
	/// Missing scores clamp up to the lowest influence.
	#[serde(default)]
	pub influence_score: f64,
	#[serde(default = "default_sentiment_color")]
	pub sentiment_color: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub avatar_initial: Option<String>,
}

impl Entity {
	/// Influence clamped into `1..=10` and rounded.
	pub fn influence(&self) -> u8 {
		clamp_score(self.influence_score)
	}
}

/// What kind of interaction a relationship records.
/// Unknown kinds are read as replies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
	#[default]
	Reply,
	Mention,
	React,
	Conflict,
}

impl RelationKind {
	pub fn from_label(label: &str) -> Self {
		match label.trim().to_ascii_lowercase().as_str() {
			"mention" => RelationKind::Mention,
			"react" | "reaction" => RelationKind::React,
			"conflict" => RelationKind::Conflict,
			"reply" => RelationKind::Reply,
			other => {
				warn!("unknown relationship type {other:?}, treating as reply");
				RelationKind::Reply
			}
		}
	}
}

impl<'de> Deserialize<'de> for RelationKind {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let label = Option::<String>::deserialize(deserializer)?;
		Ok(label.map_or_else(Self::default, |l| RelationKind::from_label(&l)))
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionSentiment {
	Positive,
	Negative,
	#[default]
	Neutral,
}

impl ReactionSentiment {
	/// Anything other than positive or negative is neutral.
	pub fn from_label(label: &str) -> Self {
		match label.trim().to_ascii_lowercase().as_str() {
			"positive" => ReactionSentiment::Positive,
			"negative" => ReactionSentiment::Negative,
			_ => ReactionSentiment::Neutral,
		}
	}
}

impl<'de> Deserialize<'de> for ReactionSentiment {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let label = Option::<String>::deserialize(deserializer)?;
		Ok(label.map_or_else(Self::default, |l| ReactionSentiment::from_label(&l)))
	}
}

/// An emoji reaction folded into a relationship (source reacted to target).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
	pub emoji: String,
	#[serde(default)]
	pub sentiment: ReactionSentiment,
	#[serde(default = "one")]
	pub count: u32,
}

/// A directed, weighted interaction between two entities (graph edge).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
	pub source: String,
	pub target: String,
	#[serde(default)]
	pub weight: f64,
	#[serde(rename = "type", default)]
	pub kind: RelationKind,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub reactions: Vec<Reaction>,
}

impl Relationship {
	/// Weight clamped into `1..=10` and rounded.
	pub fn weight(&self) -> u8 {
		clamp_score(self.weight)
	}

	/// Reaction with the highest count, if any.
	pub fn top_reaction(&self) -> Option<&Reaction> {
		self.reactions.iter().max_by_key(|r| r.count)
	}
}

/// Everything the graph view needs from one analysis run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
	pub nodes: Vec<Entity>,
	pub links: Vec<Relationship>,
}

pub fn clamp_score(score: f64) -> u8 {
	let (lo, hi) = SCORE_RANGE;
	if !score.is_finite() {
		return lo;
	}
	score.round().clamp(lo as f64, hi as f64) as u8
}

fn default_sentiment_color() -> String {
	DEFAULT_SENTIMENT_COLOR.into()
}

fn one() -> u32 {
	1
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn archetype_accepts_wire_and_bare_names() {
		assert_eq!(Archetype::from_label("The Anchor"), Archetype::Anchor);
		assert_eq!(Archetype::from_label("spark"), Archetype::Spark);
		assert_eq!(Archetype::from_label("NPC"), Archetype::Npc);
		assert_eq!(Archetype::from_label("The Wizard"), Archetype::Npc);
	}

	#[test]
	fn scores_are_clamped() {
		assert_eq!(clamp_score(0.0), 1);
		assert_eq!(clamp_score(14.0), 10);
		assert_eq!(clamp_score(6.6), 7);
		assert_eq!(clamp_score(f64::NAN), 1);
	}

	#[test]
	fn relationship_deserializes_with_type_tag() {
		let link: Relationship = serde_json::from_str(
			r#"{"source":"a","target":"b","weight":4,"type":"conflict",
			"reactions":[{"emoji":"🔥","sentiment":"positive","count":2},{"emoji":"👍","count":5}]}"#,
		)
		.unwrap();
		assert_eq!(link.kind, RelationKind::Conflict);
		assert_eq!(link.weight(), 4);
		assert_eq!(link.top_reaction().unwrap().emoji, "👍");
	}

	#[test]
	fn unknown_labels_and_missing_scores_fall_back() {
		let data: GraphData = serde_json::from_str(
			r#"{"nodes":[{"id":"a","role":null},{"id":"b","role":"The Wizard","influence_score":30}],
			"links":[{"source":"a","target":"b","type":"like",
				"reactions":[{"emoji":"🙃","sentiment":"sarcastic"}]},
				{"source":"b","target":"a","weight":3,"type":"Mention"}]}"#,
		)
		.unwrap();
		assert_eq!(data.nodes[0].role, Archetype::Npc);
		assert_eq!(data.nodes[0].influence(), 1);
		assert_eq!(data.nodes[1].influence(), 10);
		assert_eq!(data.links[0].kind, RelationKind::Reply);
		assert_eq!(data.links[0].weight(), 1);
		assert_eq!(data.links[0].reactions[0].sentiment, ReactionSentiment::Neutral);
		assert_eq!(data.links[0].reactions[0].count, 1);
		assert_eq!(data.links[1].kind, RelationKind::Mention);
	}
}
