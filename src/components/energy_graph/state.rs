use std::collections::HashSet;

use log::debug;

use super::color::{Rgb, adjust_for_influence};
use super::render::{aura_opacity, aura_radius, body_radius, edge_color, edge_width};
use super::simulation::{LayoutConfig, Simulation};
use super::types::{GraphData, RelationKind};

/// Temperature a resize restarts the layout with, so a settled graph re-centers.
const RESIZE_ALPHA: f64 = 0.3;

/// Pre-computed drawing attributes for one entity.
#[derive(Clone, Debug)]
pub struct NodeVisual {
	pub label: String,
	pub role: &'static str,
	pub color: Rgb,
	pub body_radius: f64,
	pub aura_radius: f64,
	pub aura_opacity: f64,
}

/// Pre-computed drawing attributes for one surviving relationship.
#[derive(Clone, Debug)]
pub struct EdgeVisual {
	pub kind: RelationKind,
	pub width: f64,
	pub color: &'static str,
	/// Most frequent reaction glyph and its count.
	pub reaction: Option<(String, u32)>,
}

#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub node_idx: Option<usize>,
	/// Graph-space offset between pointer and node center at grab time.
	pub offset_x: f64,
	pub offset_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

/// One entity together with everything it shares a relationship with.
#[derive(Clone, Debug, PartialEq)]
pub struct Spotlight {
	pub node: usize,
	pub neighbors: HashSet<usize>,
}

impl Spotlight {
	fn covers(&self, idx: usize) -> bool {
		self.node == idx || self.neighbors.contains(&idx)
	}
}

/// The spotlight under the pointer, plus the one still fading after the pointer left.
#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub current: Option<Spotlight>,
	pub fading: Option<Spotlight>,
	/// Eased highlight strength in `0..=1`.
	pub strength: f64,
	dwell: f64,
}

impl HoverState {
	/// Pointer rest time before a fresh spotlight starts to brighten.
	const DWELL: f64 = 0.08;
	const RISE_RATE: f64 = 1.8;
	const FALL_RATE: f64 = 1.26;

	fn lit(&self) -> impl Iterator<Item = &Spotlight> {
		self.current.iter().chain(self.fading.iter())
	}

	pub fn is_active(&self) -> bool {
		self.current.is_some() || self.fading.is_some()
	}

	/// Whether `idx` is the focus or a neighbor of a visible spotlight.
	pub fn lights(&self, idx: usize) -> bool {
		self.lit().any(|spot| spot.covers(idx))
	}

	pub fn is_focus(&self, idx: usize) -> bool {
		self.lit().any(|spot| spot.node == idx)
	}

	fn focus(&mut self, next: Option<Spotlight>) {
		let prev = self.current.take();
		match next {
			None => self.fading = prev,
			Some(spot) => {
				if prev.is_none() {
					self.dwell = 0.0;
				}
				self.fading = None;
				self.current = Some(spot);
			}
		}
	}

	fn ease(&mut self, dt: f64) {
		if self.current.is_some() {
			self.dwell = (self.dwell + dt).min(Self::DWELL);
			if self.dwell >= Self::DWELL {
				self.strength += (1.0 - self.strength) * Self::RISE_RATE * dt;
			}
		} else {
			self.strength -= self.strength * Self::FALL_RATE * dt;
			if self.strength < 0.01 {
				self.strength = 0.0;
				self.fading = None;
			}
		}
	}
}

pub struct EnergyGraphState {
	pub simulation: Simulation,
	pub nodes: Vec<NodeVisual>,
	pub edges: Vec<EdgeVisual>,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	pub width: f64,
	pub height: f64,
}

impl EnergyGraphState {
	pub fn new(data: &GraphData, width: f64, height: f64) -> Self {
		let simulation = Simulation::new(
			&data.nodes,
			&data.links,
			(width / 2.0, height / 2.0),
			LayoutConfig::default(),
		);

		let nodes = data
			.nodes
			.iter()
			.map(|entity| {
				let influence = entity.influence();
				NodeVisual {
					label: entity.id.clone(),
					role: entity.role.short_name(),
					color: adjust_for_influence(&entity.sentiment_color, influence),
					body_radius: body_radius(influence),
					aura_radius: aura_radius(influence),
					aura_opacity: aura_opacity(influence),
				}
			})
			.collect();

		let edges = simulation
			.kept_links()
			.iter()
			.map(|&li| {
				let rel = &data.links[li];
				EdgeVisual {
					kind: rel.kind,
					width: edge_width(rel.weight()),
					color: edge_color(rel.kind),
					reaction: rel.top_reaction().map(|r| (r.emoji.clone(), r.count)),
				}
			})
			.collect();

		Self {
			simulation,
			nodes,
			edges,
			transform: ViewTransform {
				x: 0.0,
				y: 0.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			width,
			height,
		}
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	/// Topmost entity whose body covers the screen point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<usize> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		self.simulation
			.nodes()
			.iter()
			.zip(&self.nodes)
			.enumerate()
			.rev()
			.find(|(_, (node, visual))| {
				let (dx, dy) = (node.x - gx, node.y - gy);
				(dx * dx + dy * dy).sqrt() <= visual.body_radius
			})
			.map(|(idx, _)| idx)
	}

	/// Grabs the entity under the pointer, if any. Returns whether a drag began.
	pub fn begin_drag(&mut self, sx: f64, sy: f64) -> bool {
		let Some(idx) = self.node_at_position(sx, sy) else {
			return false;
		};
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let node = &self.simulation.nodes()[idx];
		self.drag = DragState {
			node_idx: Some(idx),
			offset_x: node.x - gx,
			offset_y: node.y - gy,
		};
		let (x, y) = (node.x, node.y);
		self.simulation.pin(idx, x, y);
		let target = self.simulation.config.drag_alpha_target;
		self.simulation.reheat(target);
		debug!("drag start on {}", self.nodes[idx].label);
		true
	}

	pub fn drag_to(&mut self, sx: f64, sy: f64) {
		if let Some(idx) = self.drag.node_idx {
			let (gx, gy) = self.screen_to_graph(sx, sy);
			self.simulation
				.pin(idx, gx + self.drag.offset_x, gy + self.drag.offset_y);
		}
	}

	pub fn end_drag(&mut self) {
		if let Some(idx) = self.drag.node_idx.take() {
			self.simulation.unpin(idx);
			self.simulation.reheat(0.0);
		}
	}

	pub fn is_dragging(&self) -> bool {
		self.drag.node_idx.is_some()
	}

	pub fn begin_pan(&mut self, sx: f64, sy: f64) {
		self.pan = PanState {
			active: true,
			start_x: sx,
			start_y: sy,
			transform_start_x: self.transform.x,
			transform_start_y: self.transform.y,
		};
	}

	pub fn pan_to(&mut self, sx: f64, sy: f64) {
		if self.pan.active {
			self.transform.x = self.pan.transform_start_x + (sx - self.pan.start_x);
			self.transform.y = self.pan.transform_start_y + (sy - self.pan.start_y);
		}
	}

	pub fn end_pan(&mut self) {
		self.pan.active = false;
	}

	/// Zooms by `factor` keeping the screen point fixed.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
		let new_k = (self.transform.k * factor).clamp(0.1, 10.0);
		let ratio = new_k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	/// Moves the spotlight to `node`, or lets the current one fade out.
	pub fn set_hover(&mut self, node: Option<usize>) {
		if self.hover.current.as_ref().map(|spot| spot.node) == node {
			return;
		}
		let next = node.map(|idx| Spotlight {
			node: idx,
			neighbors: self
				.simulation
				.links()
				.iter()
				.filter_map(|link| {
					if link.source == idx {
						Some(link.target)
					} else if link.target == idx {
						Some(link.source)
					} else {
						None
					}
				})
				.collect(),
		});
		self.hover.focus(next);
	}

	/// Advances the layout one step and eases the hover highlight.
	pub fn tick(&mut self, dt: f64) {
		self.simulation.tick();
		self.hover.ease(dt);
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		self.simulation.set_center(width / 2.0, height / 2.0);
		self.simulation.restart(RESIZE_ALPHA);
	}
}
