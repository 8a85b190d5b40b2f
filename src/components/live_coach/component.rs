use std::sync::{Arc, Mutex};

use futures::channel::mpsc;
use leptos::prelude::*;
use log::{error, info};
use wasm_bindgen_futures::spawn_local;
use web_sys::MouseEvent;

use super::config::LiveConfig;
use super::error::SessionResult;
use super::session::{LiveSession, SessionInput, SessionSnapshot, SessionStatus, run_session};
use super::web::{InputSender, WebAudioCapture, WebAudioOutput, WebSocketTransport};

const MAX_LOG_LINES: usize = 5;

type WebSession = LiveSession<WebSocketTransport, WebAudioOutput, WebAudioCapture>;
type Control = Arc<Mutex<Option<InputSender>>>;

/// Acquires the microphone first so a denied permission never reaches the network.
async fn open_session(config: &LiveConfig, inputs: InputSender) -> SessionResult<WebSession> {
	let capture = WebAudioCapture::open(inputs.clone()).await?;
	let output = WebAudioOutput::new(inputs.clone())?;
	let transport = WebSocketTransport::connect(config, inputs)?;
	Ok(LiveSession::connecting(transport, output, capture))
}

fn request_stop(control: &Control) {
	if let Ok(guard) = control.lock() {
		if let Some(tx) = guard.as_ref() {
			let _ = tx.unbounded_send(SessionInput::Stop);
		}
	}
}

/// Real-time voice conversation with the coaching agent.
#[component]
pub fn LiveCoach() -> impl IntoView {
	let (snapshot, set_snapshot) = signal(SessionSnapshot::default());
	let (logs, set_logs) = signal(Vec::<String>::new());
	let api_key = RwSignal::new(LiveConfig::from_build_env().api_key);
	let control: Control = Arc::new(Mutex::new(None));

	let push_log = move |line: String| {
		info!("live coach: {line}");
		let _ = set_logs.try_update(|logs| {
			logs.push(line);
			let excess = logs.len().saturating_sub(MAX_LOG_LINES);
			logs.drain(..excess);
		});
	};

	let control_start = control.clone();
	let on_start = move |_: MouseEvent| {
		if !snapshot.get_untracked().status.can_start() {
			return;
		}
		let config = LiveConfig {
			api_key: api_key.get_untracked().trim().to_string(),
			..LiveConfig::from_build_env()
		};
		let (tx, rx) = mpsc::unbounded();
		if let Ok(mut guard) = control_start.lock() {
			*guard = Some(tx.clone());
		}
		set_logs.set(Vec::new());
		set_snapshot.set(SessionSnapshot {
			status: SessionStatus::Connecting,
			speaking: false,
		});

		spawn_local(async move {
			match open_session(&config, tx).await {
				Ok(session) => {
					run_session(session, rx, move |snap, notice| {
						if let Some(notice) = notice {
							push_log(notice.to_string());
						}
						let _ = set_snapshot.try_set(snap);
					})
					.await;
				}
				Err(e) => {
					error!("failed to start live session: {e}");
					push_log(format!("Failed to start session: {e}"));
					let _ = set_snapshot.try_set(SessionSnapshot {
						status: SessionStatus::Closed {
							reason: Some(e.to_string()),
						},
						speaking: false,
					});
				}
			}
		});
	};

	let control_stop = control.clone();
	let on_stop = move |_: MouseEvent| request_stop(&control_stop);

	on_cleanup(move || request_stop(&control));

	view! {
		<section class="live-coach">
			<h2>"Live Coach"</h2>
			<p>"Practice your social skills in real-time."</p>

			<label>
				"API key "
				<input type="password" bind:value=api_key />
			</label>

			<div class="live-controls">
				<button
					on:click=on_start
					disabled=move || !snapshot.get().status.can_start()
				>
					"Start Session"
				</button>
				<button
					on:click=on_stop
					disabled=move || snapshot.get().status.can_start()
				>
					"End Session"
				</button>
			</div>

			<p class="live-status">
				"Status: " {move || snapshot.get().status.to_string()}
				{move || snapshot.get().speaking.then_some(" (agent speaking)")}
			</p>

			<div class="live-log">
				{move || {
					let lines = logs.get();
					if lines.is_empty() {
						view! { <div class="placeholder">"System logs..."</div> }.into_any()
					} else {
						lines
							.into_iter()
							.map(|line| view! { <div>"> " {line}</div> })
							.collect_view()
							.into_any()
					}
				}}
			</div>
		</section>
	}
}
