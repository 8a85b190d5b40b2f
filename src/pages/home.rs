use leptos::prelude::*;
use log::warn;

use crate::analysis::{AnalysisResult, parse_analysis};
use crate::components::energy_graph::{
	Archetype, EnergyGraph, Entity, Reaction, ReactionSentiment, RelationKind, Relationship,
};

/// A small group chat to show before any analysis has been loaded.
fn sample_result() -> AnalysisResult {
	let entity = |id: &str, role: Archetype, influence: f64, color: &str| Entity {
		id: id.into(),
		role,
		influence_score: influence,
		sentiment_color: color.into(),
		avatar_initial: None,
	};
	let link = |source: &str, target: &str, weight: f64, kind: RelationKind| Relationship {
		source: source.into(),
		target: target.into(),
		weight,
		kind,
		reactions: Vec::new(),
	};

	let mut react = link("Kai", "Mia", 4.0, RelationKind::React);
	react.reactions.push(Reaction {
		emoji: "😂".into(),
		sentiment: ReactionSentiment::Positive,
		count: 3,
	});

	AnalysisResult {
		nodes: vec![
			entity("Leo", Archetype::Anchor, 9.0, "#3b82f6"),
			entity("Mia", Archetype::Spark, 7.0, "#f97316"),
			entity("Sam", Archetype::Glue, 5.0, "#22c55e"),
			entity("Ivy", Archetype::Ghost, 3.0, "#a855f7"),
			entity("Kai", Archetype::Void, 2.0, "#ef4444"),
			entity("Noa", Archetype::Npc, 1.0, "#94a3b8"),
		],
		links: vec![
			link("Mia", "Leo", 8.0, RelationKind::Reply),
			link("Sam", "Leo", 6.0, RelationKind::Reply),
			link("Leo", "Ivy", 3.0, RelationKind::Mention),
			link("Kai", "Mia", 5.0, RelationKind::Conflict),
			link("Sam", "Mia", 4.0, RelationKind::Reply),
			link("Noa", "Sam", 1.0, RelationKind::Reply),
			react,
		],
		..AnalysisResult::default()
	}
}

/// Default Home Page: paste an analysis result and explore its energy graph.
#[component]
pub fn Home() -> impl IntoView {
	let result = RwSignal::new(sample_result());
	let input = RwSignal::new(String::new());
	let parse_error = RwSignal::new(None::<String>);

	let graph_data = Signal::derive(move || result.with(|r| r.graph()));

	let on_load = move |_| match parse_analysis(&input.get_untracked()) {
		Ok(parsed) => {
			parse_error.set(None);
			result.set(parsed);
		}
		Err(e) => {
			warn!("rejected analysis: {e}");
			parse_error.set(Some(e.to_string()));
		}
	};

	let on_reset = move |_| {
		input.set(String::new());
		parse_error.set(None);
		result.set(sample_result());
	};

	view! {
		<h1>"Energy Decoder"</h1>

		<div class="graph-container">
			<EnergyGraph data=graph_data />
		</div>

		<section class="energy-flow">
			{move || {
				result
					.with(|r| {
						let flow = &r.energy_flow;
						(!flow.topic_summary.is_empty())
							.then(|| {
								format!(
									"Peak {} · {} · tension {:?} · {}",
									flow.peak_time,
									flow.dominant_emotion,
									flow.tension_level,
									flow.topic_summary,
								)
							})
					})
					.map(|line| view! { <p>{line}</p> })
			}}
			<ul>
				{move || {
					result
						.with(|r| {
							r.insights
								.iter()
								.map(|i| format!("{}: {} ({})", i.title, i.description, i.involved_users.join(", ")))
								.chain(
									r.topic_badges
										.iter()
										.map(|b| {
											format!(
												"{} {} · {}: {}",
												b.icon.as_deref().unwrap_or(""),
												b.user,
												b.title,
												b.description,
											)
										}),
								)
								.collect::<Vec<_>>()
						})
						.into_iter()
						.map(|line| view! { <li>{line}</li> })
						.collect_view()
				}}
			</ul>
		</section>

		<section class="analysis-input">
			<h2>"Load analysis"</h2>
			<textarea
				placeholder="Paste the analysis JSON here"
				bind:value=input
			/>
			<div>
				<button on:click=on_load>"Render"</button>
				<button on:click=on_reset>"Reset"</button>
			</div>
			{move || parse_error.get().map(|e| view! { <p class="error">{e}</p> })}
		</section>

		<details>
			<summary>"Report"</summary>
			<pre>{move || result.with(|r| r.markdown_report.clone())}</pre>
		</details>
	}
}
