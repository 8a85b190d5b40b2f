//! Structured output of the chat analysis service.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::energy_graph::{Entity, GraphData, Relationship};

#[derive(Error, Debug)]
pub enum AnalysisError {
	#[error("no response from the analysis service")]
	Empty,

	#[error("response does not contain a JSON object")]
	NoJson,

	#[error("failed to parse analysis response: {0}")]
	Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensionLevel {
	#[default]
	Low,
	Medium,
	High,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyFlow {
	#[serde(default)]
	pub peak_time: String,
	#[serde(default)]
	pub dominant_emotion: String,
	#[serde(default)]
	pub tension_level: TensionLevel,
	#[serde(default)]
	pub topic_summary: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
	Crush,
	Beef,
	TopicKiller,
	TopicSaver,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insight {
	pub title: String,
	pub description: String,
	#[serde(rename = "type")]
	pub kind: InsightKind,
	#[serde(default)]
	pub involved_users: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeKind {
	Killer,
	Reviver,
}

/// Topic killer / reviver award.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicBadge {
	pub user: String,
	pub title: String,
	#[serde(rename = "type")]
	pub kind: BadgeKind,
	#[serde(default)]
	pub description: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub icon: Option<String>,
}

/// One analysis run. Only `nodes` and `links` are required.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
	pub nodes: Vec<Entity>,
	pub links: Vec<Relationship>,
	#[serde(default)]
	pub energy_flow: EnergyFlow,
	#[serde(default)]
	pub insights: Vec<Insight>,
	#[serde(default)]
	pub topic_badges: Vec<TopicBadge>,
	#[serde(default)]
	pub markdown_report: String,
}

impl AnalysisResult {
	pub fn graph(&self) -> GraphData {
		GraphData {
			nodes: self.nodes.clone(),
			links: self.links.clone(),
		}
	}
}

/// Parses a model response that should be JSON but may arrive wrapped in a
/// fenced code block or surrounded by prose.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, AnalysisError> {
	let text = text.trim();
	if text.is_empty() {
		return Err(AnalysisError::Empty);
	}
	match serde_json::from_str(text) {
		Ok(result) => Ok(result),
		Err(direct) => {
			let start = text.find('{').ok_or(AnalysisError::NoJson)?;
			let end = text.rfind('}').ok_or(AnalysisError::NoJson)?;
			if end <= start {
				return Err(AnalysisError::NoJson);
			}
			let inner = &text[start..=end];
			if inner.len() == text.len() {
				return Err(direct.into());
			}
			Ok(serde_json::from_str(inner)?)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = r##"{
		"nodes": [
			{"id": "Leo", "role": "The Anchor", "influence_score": 9, "sentiment_color": "#3b82f6"},
			{"id": "Mia", "role": "The Spark", "influence_score": 6, "sentiment_color": "#f97316"}
		],
		"links": [
			{"source": "Mia", "target": "Leo", "weight": 7, "type": "reply"}
		],
		"energy_flow": {"peak_time": "20:30", "dominant_emotion": "Excited",
			"tension_level": "Medium", "topic_summary": "weekend plans"},
		"insights": [{"title": "Secret Crush", "description": "fast replies",
			"type": "crush", "involved_users": ["Mia", "Leo"]}],
		"topic_badges": [{"user": "Leo", "title": "Hype Man", "type": "reviver",
			"description": "Revived 3 threads", "icon": "🔥"}],
		"markdown_report": "# Summary"
	}"##;

	#[test]
	fn parses_full_result() {
		let result = parse_analysis(SAMPLE).unwrap();
		assert_eq!(result.nodes.len(), 2);
		assert_eq!(result.energy_flow.tension_level, TensionLevel::Medium);
		assert_eq!(result.insights[0].kind, InsightKind::Crush);
		assert_eq!(result.topic_badges[0].kind, BadgeKind::Reviver);
		let graph = result.graph();
		assert_eq!(graph.links[0].source, "Mia");
	}

	#[test]
	fn unwraps_fenced_and_prose_wrapped_json() {
		let fenced = format!("```json\n{SAMPLE}\n```");
		assert_eq!(parse_analysis(&fenced).unwrap().nodes.len(), 2);
		let prose = format!("Here is the analysis you asked for:\n{SAMPLE}\nHope it helps!");
		assert_eq!(parse_analysis(&prose).unwrap().links.len(), 1);
	}

	#[test]
	fn optional_sections_default() {
		let result = parse_analysis(r#"{"nodes": [], "links": []}"#).unwrap();
		assert!(result.insights.is_empty());
		assert!(result.topic_badges.is_empty());
		assert_eq!(result.energy_flow, EnergyFlow::default());
	}

	#[test]
	fn malformed_relationship_does_not_reject_the_analysis() {
		let text = r#"{"nodes": [{"id": "Leo", "influence_score": 5}, {"id": "Mia"}],
			"links": [
				{"source": "Mia", "target": "Leo", "weight": 7, "type": "reply"},
				{"source": "Leo", "target": "Mia", "type": "like"}
			]}"#;
		let result = parse_analysis(text).unwrap();
		assert_eq!(result.links.len(), 2);
		assert_eq!(result.links[1].weight(), 1);
	}

	#[test]
	fn rejects_missing_graph_and_non_json() {
		assert!(matches!(parse_analysis("   "), Err(AnalysisError::Empty)));
		assert!(matches!(parse_analysis("sorry, I can't"), Err(AnalysisError::NoJson)));
		assert!(matches!(
			parse_analysis(r#"{"nodes": []}"#),
			Err(AnalysisError::Json(_))
		));
	}
}
