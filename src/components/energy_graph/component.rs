use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use log::{error, info};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, TouchEvent, WheelEvent};

use super::render;
use super::state::EnergyGraphState;
use super::types::GraphData;

/// Canvas height in CSS pixels; the width follows the container.
pub const GRAPH_HEIGHT: f64 = 500.0;
const FRAME_DT: f64 = 0.016;

type SharedState = Rc<RefCell<Option<EnergyGraphState>>>;
type SharedCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn container_width(canvas: &HtmlCanvasElement) -> f64 {
	canvas
		.parent_element()
		.map(|p| p.client_width() as f64)
		.filter(|w| *w > 0.0)
		.unwrap_or(800.0)
}

fn canvas_point(canvas_ref: NodeRef<leptos::html::Canvas>, cx: i32, cy: i32) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((cx as f64 - rect.left(), cy as f64 - rect.top()))
}

fn press(state: &SharedState, x: f64, y: f64) -> bool {
	let mut guard = state.borrow_mut();
	let Some(s) = guard.as_mut() else {
		return false;
	};
	if s.begin_drag(x, y) {
		return true;
	}
	s.begin_pan(x, y);
	false
}

fn move_pointer(state: &SharedState, x: f64, y: f64, hover: bool) {
	if let Some(ref mut s) = *state.borrow_mut() {
		if s.is_dragging() {
			s.drag_to(x, y);
		} else {
			if hover {
				let hovered = s.node_at_position(x, y);
				s.set_hover(hovered);
			}
			s.pan_to(x, y);
		}
	}
}

fn release(state: &SharedState, leave: bool) {
	if let Some(ref mut s) = *state.borrow_mut() {
		s.end_drag();
		s.end_pan();
		if leave {
			s.set_hover(None);
		}
	}
}

/// Interactive force-directed view of one analysis result.
#[component]
pub fn EnergyGraph(#[prop(into)] data: Signal<GraphData>) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: SharedCallback = Rc::new(RefCell::new(None));
	let resize_cb: SharedCallback = Rc::new(RefCell::new(None));
	let (state_init, animate_init, resize_cb_init) =
		(state.clone(), animate.clone(), resize_cb.clone());

	Effect::new(move |_| {
		let graph = data.get();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			error!("energy graph: no window");
			return;
		};

		let w = container_width(&canvas);
		canvas.set_width(w as u32);
		canvas.set_height(GRAPH_HEIGHT as u32);
		let next = EnergyGraphState::new(&graph, w, GRAPH_HEIGHT);
		info!(
			"energy graph: {} entities, {} relationships ({} dropped)",
			next.nodes.len(),
			next.edges.len(),
			next.simulation.dropped_links()
		);
		*state_init.borrow_mut() = Some(next);

		// one frame loop per component; later runs only swap the state
		if animate_init.borrow().is_some() {
			return;
		}

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			error!("energy graph: 2d context unavailable");
			return;
		};

		let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
		*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
			let nw = container_width(&canvas_resize);
			canvas_resize.set_width(nw as u32);
			if let Some(ref mut s) = *state_resize.borrow_mut() {
				s.resize(nw, GRAPH_HEIGHT);
			}
		}));
		if let Some(ref cb) = *resize_cb_init.borrow() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		let (state_anim, animate_inner, resize_inner) =
			(state_init.clone(), animate_init.clone(), resize_cb_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			// the canvas left the page: stop scheduling frames
			if !canvas.is_connected() {
				if let (Some(cb), Some(win)) = (&*resize_inner.borrow(), web_sys::window()) {
					let _ = win.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
				}
				return;
			}
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				s.tick(FRAME_DT);
				render::render(s, &ctx);
			}
			if let (Some(cb), Some(win)) = (&*animate_inner.borrow(), web_sys::window()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		if let Some((x, y)) = canvas_point(canvas_ref, ev.client_x(), ev.client_y()) {
			press(&state_md, x, y);
		}
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		if let Some((x, y)) = canvas_point(canvas_ref, ev.client_x(), ev.client_y()) {
			move_pointer(&state_mm, x, y, true);
		}
	};

	let state_mu = state.clone();
	let on_mouseup = move |_: MouseEvent| release(&state_mu, false);

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| release(&state_ml, true);

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		if let Some((x, y)) = canvas_point(canvas_ref, ev.client_x(), ev.client_y()) {
			if let Some(ref mut s) = *state_wh.borrow_mut() {
				let factor = if ev.delta_y() > 0.0 { 0.9 } else { 1.1 };
				s.zoom_at(x, y, factor);
			}
		}
	};

	let state_ts = state.clone();
	let on_touchstart = move |ev: TouchEvent| {
		let Some(touch) = ev.touches().get(0) else {
			return;
		};
		if let Some((x, y)) = canvas_point(canvas_ref, touch.client_x(), touch.client_y()) {
			if press(&state_ts, x, y) {
				ev.prevent_default();
			}
		}
	};

	let state_tm = state.clone();
	let on_touchmove = move |ev: TouchEvent| {
		let Some(touch) = ev.touches().get(0) else {
			return;
		};
		if let Some((x, y)) = canvas_point(canvas_ref, touch.client_x(), touch.client_y()) {
			ev.prevent_default();
			move_pointer(&state_tm, x, y, false);
		}
	};

	let state_te = state.clone();
	let on_touchend = move |_: TouchEvent| release(&state_te, true);

	view! {
		<canvas
			node_ref=canvas_ref
			class="energy-graph-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			on:touchstart=on_touchstart
			on:touchmove=on_touchmove
			on:touchend=on_touchend
			style="display: block; cursor: grab;"
		/>
	}
}
