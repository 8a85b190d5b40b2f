use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::EnergyGraphState;
use super::types::RelationKind;

const BACKGROUND: &str = "#0f172a";
const EDGE_ALPHA: f64 = 0.6;
const ARROW_SIZE: f64 = 8.0;

pub fn body_radius(influence: u8) -> f64 {
	influence as f64 * 3.0 + 5.0
}

pub fn aura_radius(influence: u8) -> f64 {
	influence as f64 * 3.0 + 12.0
}

pub fn aura_opacity(influence: u8) -> f64 {
	0.1 + influence as f64 / 30.0
}

pub fn edge_width(weight: u8) -> f64 {
	(weight as f64).sqrt() * 2.0
}

pub fn edge_color(kind: RelationKind) -> &'static str {
	match kind {
		RelationKind::Conflict => "#ef4444",
		RelationKind::Mention => "#8b5cf6",
		RelationKind::Reply | RelationKind::React => "#475569",
	}
}

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

fn hex_alpha(hex: &str, alpha: f64) -> String {
	super::color::Rgb::parse_hex(hex)
		.map(|c| c.css_alpha(alpha))
		.unwrap_or_else(|| hex.to_string())
}

pub fn render(state: &EnergyGraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	if state.nodes.is_empty() {
		return;
	}
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_edges(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();
}

fn draw_edges(state: &EnergyGraphState, ctx: &CanvasRenderingContext2d) {
	let t = ease_out_cubic(state.hover.strength);
	let has_highlight = state.hover.is_active();
	let nodes = state.simulation.nodes();

	for (link, edge) in state.simulation.links().iter().zip(&state.edges) {
		let (n1, n2) = (&nodes[link.source], &nodes[link.target]);
		let (dx, dy) = (n2.x - n1.x, n2.y - n1.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}

		// t=0: every edge at base alpha; t=1: highlighted edges brighten, the rest dim
		let alpha = if !has_highlight {
			EDGE_ALPHA
		} else if state.hover.lights(link.source) && state.hover.lights(link.target) {
			EDGE_ALPHA + 0.3 * t
		} else {
			EDGE_ALPHA - 0.45 * t
		};

		let source_r = state.nodes[link.source].body_radius;
		let target_r = state.nodes[link.target].body_radius;
		let (ux, uy) = (dx / dist, dy / dist);
		let color = hex_alpha(edge.color, alpha);

		ctx.set_stroke_style_str(&color);
		ctx.set_line_width(edge.width);
		if edge.kind == RelationKind::React {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(
				&JsValue::from_f64(6.0),
				&JsValue::from_f64(4.0),
			));
		}
		ctx.begin_path();
		ctx.move_to(n1.x + ux * source_r, n1.y + uy * source_r);
		ctx.line_to(
			n2.x - ux * (target_r + ARROW_SIZE),
			n2.y - uy * (target_r + ARROW_SIZE),
		);
		ctx.stroke();
		let _ = ctx.set_line_dash(&js_sys::Array::new());

		ctx.set_fill_style_str(&color);
		let (tip_x, tip_y) = (n2.x - ux * target_r, n2.y - uy * target_r);
		let (back_x, back_y) = (tip_x - ux * ARROW_SIZE, tip_y - uy * ARROW_SIZE);
		let (px, py) = (-uy * ARROW_SIZE * 0.5, ux * ARROW_SIZE * 0.5);
		ctx.begin_path();
		ctx.move_to(tip_x, tip_y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();

		if let Some((emoji, count)) = &edge.reaction {
			let (mx, my) = ((n1.x + n2.x) / 2.0, (n1.y + n2.y) / 2.0);
			let text = if *count > 1 {
				format!("{emoji}×{count}")
			} else {
				emoji.clone()
			};
			ctx.set_font("12px sans-serif");
			ctx.set_text_align("center");
			ctx.set_fill_style_str("#f8fafc");
			let _ = ctx.fill_text(&text, mx, my - 4.0);
		}
	}
}

fn draw_nodes(state: &EnergyGraphState, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, t) = (
		state.hover.is_active(),
		ease_out_cubic(state.hover.strength),
	);

	for (idx, (node, visual)) in state.simulation.nodes().iter().zip(&state.nodes).enumerate() {
		let (x, y) = (node.x, node.y);
		let dimmed = has_highlight && !state.hover.lights(idx);
		ctx.set_global_alpha(if dimmed { 1.0 - 0.7 * t } else { 1.0 });

		// influence aura
		ctx.begin_path();
		let _ = ctx.arc(x, y, visual.aura_radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(&visual.color.css_alpha(visual.aura_opacity));
		ctx.fill();
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(4.0),
			&JsValue::from_f64(3.0),
		));
		ctx.set_stroke_style_str(&visual.color.css_alpha(0.5));
		ctx.set_line_width(1.0);
		ctx.stroke();
		let _ = ctx.set_line_dash(&js_sys::Array::new());

		// body
		ctx.begin_path();
		let _ = ctx.arc(x, y, visual.body_radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(&visual.color.css());
		ctx.fill();
		ctx.set_stroke_style_str("rgba(255, 255, 255, 0.9)");
		ctx.set_line_width(2.0);
		ctx.stroke();

		if state.hover.is_focus(idx) && t > 0.01 {
			ctx.begin_path();
			let _ = ctx.arc(x, y, visual.aura_radius + 3.0, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str(&format!("rgba(255, 255, 255, {})", 0.7 * t));
			ctx.set_line_width(1.5);
			ctx.stroke();
		}

		ctx.set_text_align("center");
		ctx.set_font("bold 12px sans-serif");
		ctx.set_fill_style_str("#f8fafc");
		let _ = ctx.fill_text(&visual.label, x, y - visual.body_radius - 3.0);

		ctx.set_font("600 10px sans-serif");
		ctx.set_fill_style_str(&visual.color.css());
		let _ = ctx.fill_text(visual.role, x, y + visual.body_radius + 15.0);
	}
	ctx.set_global_alpha(1.0);
}
