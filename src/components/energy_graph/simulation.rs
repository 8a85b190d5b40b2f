//! Force-directed layout for the relationship graph.
//!
//! Link springs, pairwise repulsion, collision and centering forces are applied
//! each tick under a cooling `alpha`. Repulsion and collision are pairwise, so the
//! cost per tick is O(n²): fine for tens of entities, not for thousands.

use std::collections::HashMap;
use std::f64::consts::PI;

use log::{debug, warn};

use super::types::{Entity, Relationship};

/// Physics tuning for the layout.
#[derive(Clone, Debug)]
pub struct LayoutConfig {
	/// Many-body strength; negative repels.
	pub charge_strength: f64,
	/// Rest length of a weight-0 link.
	pub link_base_length: f64,
	/// Rest length removed per unit of weight.
	pub link_length_factor: f64,
	pub link_min_length: f64,
	/// Collision radius is `influence * collide_factor + collide_padding`.
	pub collide_factor: f64,
	pub collide_padding: f64,
	pub collide_strength: f64,
	pub center_strength: f64,
	pub alpha_min: f64,
	pub alpha_decay: f64,
	pub velocity_decay: f64,
	/// `alpha_target` held while an entity is dragged.
	pub drag_alpha_target: f64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		let alpha_min = 0.001;
		Self {
			charge_strength: -300.0,
			link_base_length: 150.0,
			link_length_factor: 10.0,
			link_min_length: 20.0,
			collide_factor: 4.0,
			collide_padding: 20.0,
			collide_strength: 1.0,
			center_strength: 1.0,
			alpha_min,
			alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
			velocity_decay: 0.4,
			drag_alpha_target: 0.3,
		}
	}
}

impl LayoutConfig {
	/// Spring rest length for a link weight; strictly decreasing in weight until the floor.
	pub fn rest_length(&self, weight: u8) -> f64 {
		(self.link_base_length - weight as f64 * self.link_length_factor)
			.max(self.link_min_length)
	}

	pub fn collide_radius(&self, influence: u8) -> f64 {
		influence as f64 * self.collide_factor + self.collide_padding
	}
}

#[derive(Clone, Debug, Default)]
pub struct SimNode {
	pub x: f64,
	pub y: f64,
	pub vx: f64,
	pub vy: f64,
	pub pinned: Option<(f64, f64)>,
	pub radius: f64,
}

#[derive(Clone, Debug)]
pub struct SimLink {
	pub source: usize,
	pub target: usize,
	pub rest_length: f64,
	strength: f64,
	bias: f64,
}

/// Physical state of one layout run. Node `i` corresponds to entity `i` of the input.
pub struct Simulation {
	pub config: LayoutConfig,
	nodes: Vec<SimNode>,
	links: Vec<SimLink>,
	/// Indices into the input relationship list that survived validation, parallel to `links`.
	kept_links: Vec<usize>,
	dropped_links: usize,
	center: (f64, f64),
	alpha: f64,
	alpha_target: f64,
}

impl Simulation {
	pub fn new(
		entities: &[Entity],
		relationships: &[Relationship],
		center: (f64, f64),
		config: LayoutConfig,
	) -> Self {
		let mut id_to_idx = HashMap::with_capacity(entities.len());
		for (i, entity) in entities.iter().enumerate() {
			if id_to_idx.insert(entity.id.as_str(), i).is_some() {
				warn!("duplicate entity id {:?}; links resolve to the last one", entity.id);
			}
		}

		let golden = PI * (3.0 - 5f64.sqrt());
		let nodes = entities
			.iter()
			.enumerate()
			.map(|(i, entity)| {
				let r = 10.0 * (0.5 + i as f64).sqrt();
				let angle = i as f64 * golden;
				SimNode {
					x: center.0 + r * angle.cos(),
					y: center.1 + r * angle.sin(),
					radius: config.collide_radius(entity.influence()),
					..Default::default()
				}
			})
			.collect::<Vec<_>>();

		let mut links = Vec::new();
		let mut kept_links = Vec::new();
		for (li, rel) in relationships.iter().enumerate() {
			match (
				id_to_idx.get(rel.source.as_str()),
				id_to_idx.get(rel.target.as_str()),
			) {
				(Some(&s), Some(&t)) if s != t => {
					links.push(SimLink {
						source: s,
						target: t,
						rest_length: config.rest_length(rel.weight()),
						strength: 0.0,
						bias: 0.0,
					});
					kept_links.push(li);
				}
				(Some(_), Some(_)) => {
					warn!("dropping self-loop on {:?}", rel.source);
				}
				_ => {
					warn!(
						"dropping relationship {:?} -> {:?}: unknown entity",
						rel.source, rel.target
					);
				}
			}
		}

		let mut degree = vec![0usize; nodes.len()];
		for link in &links {
			degree[link.source] += 1;
			degree[link.target] += 1;
		}
		for link in &mut links {
			let (ds, dt) = (degree[link.source] as f64, degree[link.target] as f64);
			link.strength = 1.0 / ds.min(dt);
			link.bias = ds / (ds + dt);
		}

		let dropped_links = relationships.len() - links.len();
		debug!(
			"simulation: {} nodes, {} links ({} dropped)",
			nodes.len(),
			links.len(),
			dropped_links
		);

		Self {
			config,
			nodes,
			links,
			kept_links,
			dropped_links,
			center,
			alpha: 1.0,
			alpha_target: 0.0,
		}
	}

	pub fn nodes(&self) -> &[SimNode] {
		&self.nodes
	}

	pub fn links(&self) -> &[SimLink] {
		&self.links
	}

	/// Input relationship index for each simulated link.
	pub fn kept_links(&self) -> &[usize] {
		&self.kept_links
	}

	pub fn dropped_links(&self) -> usize {
		self.dropped_links
	}

	#[cfg(test)]
	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	pub fn is_cooled(&self) -> bool {
		self.alpha < self.config.alpha_min && self.alpha_target < self.config.alpha_min
	}

	pub fn set_center(&mut self, x: f64, y: f64) {
		self.center = (x, y);
	}

	/// Sets the temperature the simulation converges to, and wakes it if it was idle.
	pub fn reheat(&mut self, alpha_target: f64) {
		self.alpha_target = alpha_target;
		if self.alpha < alpha_target {
			self.alpha = self.alpha.max(self.config.alpha_min * 2.0);
		}
	}

	/// Raises the temperature to at least `alpha` so an idle layout runs again.
	pub fn restart(&mut self, alpha: f64) {
		self.alpha = self.alpha.max(alpha);
	}

	pub fn pin(&mut self, idx: usize, x: f64, y: f64) {
		if let Some(node) = self.nodes.get_mut(idx) {
			node.pinned = Some((x, y));
		}
	}

	pub fn unpin(&mut self, idx: usize) {
		if let Some(node) = self.nodes.get_mut(idx) {
			node.pinned = None;
		}
	}

	#[cfg(test)]
	pub fn kinetic_energy(&self) -> f64 {
		self.nodes
			.iter()
			.map(|n| 0.5 * (n.vx * n.vx + n.vy * n.vy))
			.sum()
	}

	/// Advances one step. Returns `false` (and does nothing) once cooled.
	pub fn tick(&mut self) -> bool {
		if self.is_cooled() {
			return false;
		}
		self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;

		self.apply_links();
		self.apply_charge();
		self.apply_collision();

		let keep = 1.0 - self.config.velocity_decay;
		for node in &mut self.nodes {
			match node.pinned {
				Some((px, py)) => {
					node.x = px;
					node.y = py;
					node.vx = 0.0;
					node.vy = 0.0;
				}
				None => {
					node.vx *= keep;
					node.vy *= keep;
					node.x += node.vx;
					node.y += node.vy;
				}
			}
		}

		self.apply_centering();
		true
	}

	fn apply_links(&mut self) {
		let alpha = self.alpha;
		for (i, link) in self.links.iter().enumerate() {
			let (s, t) = (&self.nodes[link.source], &self.nodes[link.target]);
			let mut dx = t.x + t.vx - s.x - s.vx;
			let mut dy = t.y + t.vy - s.y - s.vy;
			if dx == 0.0 && dy == 0.0 {
				(dx, dy) = jiggle(i);
			}
			let dist = (dx * dx + dy * dy).sqrt();
			let l = (dist - link.rest_length) / dist * alpha * link.strength;
			let (fx, fy) = (dx * l, dy * l);

			let target = &mut self.nodes[link.target];
			target.vx -= fx * link.bias;
			target.vy -= fy * link.bias;
			let source = &mut self.nodes[link.source];
			source.vx += fx * (1.0 - link.bias);
			source.vy += fy * (1.0 - link.bias);
		}
	}

	fn apply_charge(&mut self) {
		let w = self.config.charge_strength * self.alpha;
		let n = self.nodes.len();
		for i in 0..n {
			let (mut ax, mut ay) = (0.0, 0.0);
			for j in 0..n {
				if i == j {
					continue;
				}
				let mut dx = self.nodes[j].x - self.nodes[i].x;
				let mut dy = self.nodes[j].y - self.nodes[i].y;
				if dx == 0.0 && dy == 0.0 {
					(dx, dy) = jiggle(i * n + j);
				}
				// distance floor of 1 keeps coincident nodes from exploding
				let l = (dx * dx + dy * dy).max(1.0);
				ax += dx * w / l;
				ay += dy * w / l;
			}
			self.nodes[i].vx += ax;
			self.nodes[i].vy += ay;
		}
	}

	fn apply_collision(&mut self) {
		let strength = self.config.collide_strength;
		let n = self.nodes.len();
		for i in 0..n {
			for j in (i + 1)..n {
				let (a, b) = (&self.nodes[i], &self.nodes[j]);
				let r = a.radius + b.radius;
				let mut dx = a.x + a.vx - b.x - b.vx;
				let mut dy = a.y + a.vy - b.y - b.vy;
				let mut l = dx * dx + dy * dy;
				if l >= r * r {
					continue;
				}
				if l == 0.0 {
					(dx, dy) = jiggle(i * n + j);
					l = dx * dx + dy * dy;
				}
				let dist = l.sqrt();
				let k = (r - dist) / dist * strength;
				let (ra2, rb2) = (a.radius * a.radius, b.radius * b.radius);
				let share = rb2 / (ra2 + rb2);
				let (fx, fy) = (dx * k, dy * k);

				let a = &mut self.nodes[i];
				a.vx += fx * share;
				a.vy += fy * share;
				let b = &mut self.nodes[j];
				b.vx -= fx * (1.0 - share);
				b.vy -= fy * (1.0 - share);
			}
		}
	}

	/// Translates the free nodes so their mean sits on the center.
	fn apply_centering(&mut self) {
		let free = self.nodes.iter().filter(|n| n.pinned.is_none());
		let (mut sx, mut sy, mut count) = (0.0, 0.0, 0usize);
		for node in free {
			sx += node.x;
			sy += node.y;
			count += 1;
		}
		if count == 0 {
			return;
		}
		let shift_x = (sx / count as f64 - self.center.0) * self.config.center_strength;
		let shift_y = (sy / count as f64 - self.center.1) * self.config.center_strength;
		for node in self.nodes.iter_mut().filter(|n| n.pinned.is_none()) {
			node.x -= shift_x;
			node.y -= shift_y;
		}
	}
}

/// Small deterministic offset for coincident positions.
fn jiggle(seed: usize) -> (f64, f64) {
	let angle = seed as f64 * 2.399_963;
	(1e-6 * angle.cos(), 1e-6 * angle.sin())
}

#[cfg(test)]
mod tests {
	use super::super::types::{Archetype, RelationKind};
	use super::*;

	fn entity(id: &str, influence: f64) -> Entity {
		Entity {
			id: id.into(),
			role: Archetype::Npc,
			influence_score: influence,
			sentiment_color: "#3b82f6".into(),
			avatar_initial: None,
		}
	}

	fn link(source: &str, target: &str, weight: f64) -> Relationship {
		Relationship {
			source: source.into(),
			target: target.into(),
			weight,
			kind: RelationKind::Reply,
			reactions: Vec::new(),
		}
	}

	fn distance(a: &SimNode, b: &SimNode) -> f64 {
		((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
	}

	#[test]
	fn rest_length_strictly_decreases_with_weight() {
		let config = LayoutConfig::default();
		for w in 1..10u8 {
			assert!(config.rest_length(w + 1) < config.rest_length(w));
		}
		assert!(config.rest_length(10) > 0.0);
	}

	#[test]
	fn dangling_relationships_are_dropped() {
		let entities = [entity("ana", 5.0), entity("bo", 3.0)];
		let rels = [
			link("ana", "bo", 5.0),
			link("ana", "ghost", 5.0),
			link("bo", "bo", 2.0),
		];
		let sim = Simulation::new(&entities, &rels, (0.0, 0.0), LayoutConfig::default());
		assert_eq!(sim.nodes().len(), 2);
		assert_eq!(sim.links().len(), 1);
		assert_eq!(sim.kept_links(), &[0]);
		assert_eq!(sim.dropped_links(), 2);
		assert_eq!(sim.links().len() + sim.dropped_links(), rels.len());
	}

	#[test]
	fn empty_graph_ticks_without_work() {
		let mut sim = Simulation::new(&[], &[], (400.0, 250.0), LayoutConfig::default());
		for _ in 0..10 {
			sim.tick();
		}
		assert!(sim.nodes().is_empty());
		assert!(sim.links().is_empty());
		assert_eq!(sim.kinetic_energy(), 0.0);
	}

	#[test]
	fn cools_and_then_idles() {
		let entities = [entity("a", 8.0), entity("b", 4.0), entity("c", 2.0)];
		let rels = [link("a", "b", 9.0), link("b", "c", 3.0)];
		let mut sim = Simulation::new(&entities, &rels, (0.0, 0.0), LayoutConfig::default());
		let mut ticks = 0;
		while sim.tick() {
			ticks += 1;
			assert!(ticks < 1000, "simulation never cooled");
		}
		assert!(sim.is_cooled());
		let before: Vec<_> = sim.nodes().iter().map(|n| (n.x, n.y)).collect();
		assert!(!sim.tick());
		let after: Vec<_> = sim.nodes().iter().map(|n| (n.x, n.y)).collect();
		assert_eq!(before, after);
	}

	#[test]
	fn settled_layout_does_not_overlap_and_stays_centered() {
		let entities = [entity("a", 10.0), entity("b", 10.0), entity("c", 1.0)];
		let rels = [link("a", "b", 10.0), link("a", "c", 10.0)];
		let mut sim = Simulation::new(&entities, &rels, (300.0, 200.0), LayoutConfig::default());
		while sim.tick() {}
		let nodes = sim.nodes();
		for i in 0..nodes.len() {
			for j in (i + 1)..nodes.len() {
				// body radii are influence * 3 + 5, well inside the collision radii
				let bodies = (10.0 * 3.0 + 5.0) * 2.0;
				assert!(distance(&nodes[i], &nodes[j]) > bodies);
			}
		}
		let mx = nodes.iter().map(|n| n.x).sum::<f64>() / 3.0;
		let my = nodes.iter().map(|n| n.y).sum::<f64>() / 3.0;
		assert!((mx - 300.0).abs() < 1e-6 && (my - 200.0).abs() < 1e-6);
	}

	#[test]
	fn stronger_links_settle_closer() {
		let entities = [
			entity("hub", 5.0),
			entity("close", 5.0),
			entity("far", 5.0),
		];
		let rels = [link("hub", "close", 10.0), link("hub", "far", 1.0)];
		let mut sim = Simulation::new(&entities, &rels, (0.0, 0.0), LayoutConfig::default());
		while sim.tick() {}
		let n = sim.nodes();
		assert!(distance(&n[0], &n[1]) < distance(&n[0], &n[2]));
	}

	#[test]
	fn pinned_node_follows_pointer_every_tick() {
		let entities = [entity("a", 5.0), entity("b", 5.0), entity("c", 5.0)];
		let rels = [link("a", "b", 5.0), link("b", "c", 5.0)];
		let mut sim = Simulation::new(&entities, &rels, (0.0, 0.0), LayoutConfig::default());
		sim.reheat(sim.config.drag_alpha_target);
		for step in 0..50 {
			let (px, py) = (step as f64 * 3.0, -(step as f64));
			sim.pin(1, px, py);
			assert!(sim.tick());
			assert_eq!((sim.nodes()[1].x, sim.nodes()[1].y), (px, py));
		}
		assert!(sim.alpha() > 0.2);

		sim.unpin(1);
		sim.reheat(0.0);
		let held = (sim.nodes()[1].x, sim.nodes()[1].y);
		sim.tick();
		assert_ne!((sim.nodes()[1].x, sim.nodes()[1].y), held);
	}
}
