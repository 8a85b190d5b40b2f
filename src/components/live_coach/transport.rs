//! Wire format of the bidirectional live session and the transport seam.

use log::warn;
use serde::{Deserialize, Serialize};

use super::config::LiveConfig;
use super::error::SessionResult;
use super::pcm::AudioChunk;

/// Outbound half of a live connection.
pub trait VoiceTransport {
	fn send(&mut self, chunk: &AudioChunk) -> SessionResult<()>;

	/// Closes the connection. Calling it again is a no-op.
	fn close(&mut self) -> SessionResult<()>;
}

/// Something the remote side did.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
	/// Handshake finished; audio may flow.
	Opened,
	/// Base64 16-bit PCM from the agent.
	Audio(String),
	/// The agent abandoned its current utterance.
	Interrupted,
	Closed(Option<String>),
	Error(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupMessage<'a> {
	setup: Setup<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup<'a> {
	model: String,
	generation_config: GenerationConfig<'a>,
	system_instruction: Content<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
	response_modalities: [&'static str; 1],
	speech_config: SpeechConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
	voice_config: VoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
	prebuilt_voice_config: PrebuiltVoice<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoice<'a> {
	voice_name: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
	parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
	text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInputMessage<'a> {
	realtime_input: RealtimeInput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput<'a> {
	media_chunks: [&'a AudioChunk; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
	setup_complete: Option<serde_json::Value>,
	server_content: Option<ServerContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
	model_turn: Option<ModelTurn>,
	#[serde(default)]
	interrupted: bool,
}

#[derive(Deserialize)]
struct ModelTurn {
	#[serde(default)]
	parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
	inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
	mime_type: Option<String>,
	data: String,
}

/// First message on a fresh connection.
pub fn setup_message(config: &LiveConfig) -> SessionResult<String> {
	let msg = SetupMessage {
		setup: Setup {
			model: config.model_path(),
			generation_config: GenerationConfig {
				response_modalities: ["AUDIO"],
				speech_config: SpeechConfig {
					voice_config: VoiceConfig {
						prebuilt_voice_config: PrebuiltVoice {
							voice_name: &config.voice,
						},
					},
				},
			},
			system_instruction: Content {
				parts: [TextPart {
					text: &config.system_instruction,
				}],
			},
		},
	};
	Ok(serde_json::to_string(&msg)?)
}

pub fn realtime_input_message(chunk: &AudioChunk) -> SessionResult<String> {
	let msg = RealtimeInputMessage {
		realtime_input: RealtimeInput {
			media_chunks: [chunk],
		},
	};
	Ok(serde_json::to_string(&msg)?)
}

/// Events carried by one server frame, in the order they must be handled.
/// Non-audio inline data and unrelated fields are ignored.
pub fn parse_server_message(text: &str) -> SessionResult<Vec<TransportEvent>> {
	let msg: ServerMessage = serde_json::from_str(text)?;
	let mut events = Vec::new();
	if msg.setup_complete.is_some() {
		events.push(TransportEvent::Opened);
	}
	if let Some(content) = msg.server_content {
		let parts = content.model_turn.map(|t| t.parts).unwrap_or_default();
		for data in parts.into_iter().filter_map(|p| p.inline_data) {
			let is_audio = data
				.mime_type
				.as_deref()
				.is_none_or(|m| m.starts_with("audio/"));
			if is_audio && !data.data.is_empty() {
				events.push(TransportEvent::Audio(data.data));
			}
		}
		if content.interrupted {
			events.push(TransportEvent::Interrupted);
		}
	}
	Ok(events)
}

/// Events for one inbound frame. A frame that cannot be read or parsed becomes
/// an `Error`, which closes the session.
pub fn frame_events(text: Option<&str>) -> Vec<TransportEvent> {
	let parsed = text
		.ok_or_else(|| "unreadable frame from live socket".to_string())
		.and_then(|text| parse_server_message(text).map_err(|e| e.to_string()));
	parsed.unwrap_or_else(|reason| {
		warn!("live socket: {reason}");
		vec![TransportEvent::Error(reason)]
	})
}
