//! Browser implementations of the session seams: getUserMedia capture, Web Audio
//! playback and the live WebSocket.
//!
//! Every JS callback only forwards a `SessionInput` into the session's channel.
//! Handlers are detached before their closures are dropped.

use futures::channel::mpsc::UnboundedSender;
use log::{debug, info};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
	AudioBufferSourceNode, AudioContext, AudioContextOptions, AudioProcessingEvent,
	AudioScheduledSourceNode, BinaryType, CloseEvent, Event, MediaStream, MediaStreamAudioSourceNode,
	MediaStreamConstraints, MediaStreamTrack, MessageEvent, ScriptProcessorNode, WebSocket,
};

use super::config::LiveConfig;
use super::error::{SessionError, SessionResult, js_error_message};
use super::pcm::{AudioChunk, CAPTURE_FRAME_SIZE, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use super::playback::{AudioOutput, Voice, VoiceId};
use super::session::{AudioCapture, SessionInput};
use super::transport::{
	TransportEvent, VoiceTransport, frame_events, realtime_input_message, setup_message,
};

pub type InputSender = UnboundedSender<SessionInput>;

fn audio_err(e: JsValue) -> SessionError {
	SessionError::Audio(js_error_message(&e))
}

fn audio_context(sample_rate: u32) -> SessionResult<AudioContext> {
	let options = AudioContextOptions::new();
	options.set_sample_rate(sample_rate as f32);
	let ctx = AudioContext::new_with_context_options(&options).map_err(audio_err)?;
	// contexts created after an await may start suspended
	let _ = ctx.resume();
	Ok(ctx)
}

/// Microphone at 16 kHz mono, delivered in fixed-size frames.
pub struct WebAudioCapture {
	stream: MediaStream,
	ctx: AudioContext,
	source: MediaStreamAudioSourceNode,
	processor: ScriptProcessorNode,
	on_frame: Closure<dyn FnMut(AudioProcessingEvent)>,
	running: bool,
	released: bool,
}

impl WebAudioCapture {
	/// Asks for microphone permission. Fails before any session is opened.
	pub async fn open(frames: InputSender) -> SessionResult<Self> {
		let window = web_sys::window().ok_or_else(|| SessionError::Microphone("no window".into()))?;
		let devices = window
			.navigator()
			.media_devices()
			.map_err(|e| SessionError::Microphone(js_error_message(&e)))?;
		let constraints = MediaStreamConstraints::new();
		constraints.set_audio(&JsValue::TRUE);
		let promise = devices
			.get_user_media_with_constraints(&constraints)
			.map_err(|e| SessionError::Microphone(js_error_message(&e)))?;
		let stream: MediaStream = JsFuture::from(promise)
			.await
			.map_err(|e| SessionError::Microphone(js_error_message(&e)))?
			.dyn_into()
			.map_err(|_| SessionError::Microphone("unexpected getUserMedia result".into()))?;

		let ctx = match audio_context(INPUT_SAMPLE_RATE) {
			Ok(ctx) => ctx,
			Err(e) => {
				stop_tracks(&stream);
				return Err(e);
			}
		};
		let nodes = ctx.create_media_stream_source(&stream).and_then(|source| {
			ctx.create_script_processor_with_buffer_size_and_number_of_input_channels_and_number_of_output_channels(
				CAPTURE_FRAME_SIZE,
				1,
				1,
			)
			.map(|processor| (source, processor))
		});
		let (source, processor) = match nodes {
			Ok(nodes) => nodes,
			Err(e) => {
				stop_tracks(&stream);
				let _ = ctx.close();
				return Err(audio_err(e));
			}
		};

		let on_frame = Closure::<dyn FnMut(AudioProcessingEvent)>::new(move |ev: AudioProcessingEvent| {
			let Ok(buffer) = ev.input_buffer() else {
				return;
			};
			if let Ok(samples) = buffer.get_channel_data(0) {
				let _ = frames.unbounded_send(SessionInput::CaptureFrame(samples));
			}
		});

		info!("microphone acquired");
		Ok(Self {
			stream,
			ctx,
			source,
			processor,
			on_frame,
			running: false,
			released: false,
		})
	}
}

fn stop_tracks(stream: &MediaStream) {
	for track in stream.get_tracks().iter() {
		if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
			track.stop();
		}
	}
}

impl AudioCapture for WebAudioCapture {
	fn start(&mut self) -> SessionResult<()> {
		if self.running || self.released {
			return Ok(());
		}
		self.processor
			.set_onaudioprocess(Some(self.on_frame.as_ref().unchecked_ref()));
		self.source
			.connect_with_audio_node(&self.processor)
			.map_err(audio_err)?;
		// a script processor only runs while connected to an output
		self.processor
			.connect_with_audio_node(&self.ctx.destination())
			.map_err(audio_err)?;
		self.running = true;
		Ok(())
	}

	fn stop(&mut self) -> SessionResult<()> {
		if self.released {
			return Ok(());
		}
		self.released = true;
		self.running = false;
		self.processor.set_onaudioprocess(None);
		let _ = self.source.disconnect();
		let _ = self.processor.disconnect();
		stop_tracks(&self.stream);
		debug!("microphone released");
		self.ctx.close().map(|_| ()).map_err(audio_err)
	}
}

impl Drop for WebAudioCapture {
	fn drop(&mut self) {
		let _ = self.stop();
	}
}

/// One scheduled agent chunk.
pub struct WebVoice {
	source: AudioBufferSourceNode,
	on_ended: Closure<dyn FnMut()>,
}

impl WebVoice {
	fn scheduled(&self) -> &AudioScheduledSourceNode {
		self.source.as_ref()
	}
}

impl Voice for WebVoice {
	fn stop(&self) {
		let node = self.scheduled();
		node.set_onended(None);
		let _ = node.stop();
	}
}

impl Drop for WebVoice {
	fn drop(&mut self) {
		self.scheduled().set_onended(None);
	}
}

/// Speaker output at 24 kHz mono.
pub struct WebAudioOutput {
	ctx: AudioContext,
	ended: InputSender,
	closed: bool,
}

impl WebAudioOutput {
	pub fn new(ended: InputSender) -> SessionResult<Self> {
		Ok(Self {
			ctx: audio_context(OUTPUT_SAMPLE_RATE)?,
			ended,
			closed: false,
		})
	}
}

impl AudioOutput for WebAudioOutput {
	type Voice = WebVoice;

	fn current_time(&self) -> f64 {
		self.ctx.current_time()
	}

	fn play(&mut self, samples: &[f32], start_at: f64, id: VoiceId) -> SessionResult<WebVoice> {
		if self.closed {
			return Err(SessionError::Audio("output closed".into()));
		}
		let buffer = self
			.ctx
			.create_buffer(1, samples.len().max(1) as u32, OUTPUT_SAMPLE_RATE as f32)
			.map_err(audio_err)?;
		buffer.copy_to_channel(samples, 0).map_err(audio_err)?;

		let source = self.ctx.create_buffer_source().map_err(audio_err)?;
		source.set_buffer(Some(&buffer));
		source
			.connect_with_audio_node(&self.ctx.destination())
			.map_err(audio_err)?;

		let ended = self.ended.clone();
		let on_ended = Closure::<dyn FnMut()>::new(move || {
			let _ = ended.unbounded_send(SessionInput::PlaybackEnded(id));
		});
		let voice = WebVoice {
			source,
			on_ended,
		};
		let node = voice.scheduled();
		node.set_onended(Some(voice.on_ended.as_ref().unchecked_ref()));
		node.start_with_when(start_at).map_err(audio_err)?;
		Ok(voice)
	}

	fn close(&mut self) -> SessionResult<()> {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		self.ctx.close().map(|_| ()).map_err(audio_err)
	}
}

impl Drop for WebAudioOutput {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

/// Bidirectional live socket.
pub struct WebSocketTransport {
	socket: WebSocket,
	_on_open: Closure<dyn FnMut(Event)>,
	_on_message: Closure<dyn FnMut(MessageEvent)>,
	_on_close: Closure<dyn FnMut(CloseEvent)>,
	_on_error: Closure<dyn FnMut(Event)>,
	closed: bool,
}

impl WebSocketTransport {
	/// Opens the socket. The setup message goes out on open, and `Opened` is
	/// reported once the server acknowledges it.
	pub fn connect(config: &LiveConfig, events: InputSender) -> SessionResult<Self> {
		if config.api_key.is_empty() {
			return Err(SessionError::Transport("missing API key".into()));
		}
		let setup = setup_message(config)?;
		let socket = WebSocket::new(&config.socket_url())
			.map_err(|e| SessionError::Transport(js_error_message(&e)))?;
		socket.set_binary_type(BinaryType::Arraybuffer);

		let (open_socket, open_events) = (socket.clone(), events.clone());
		let on_open = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
			debug!("live socket open, sending setup");
			if let Err(e) = open_socket.send_with_str(&setup) {
				let _ = open_events.unbounded_send(SessionInput::Transport(TransportEvent::Error(
					js_error_message(&e),
				)));
			}
		});

		let message_events = events.clone();
		let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |ev: MessageEvent| {
			for event in frame_events(message_text(&ev.data()).as_deref()) {
				let _ = message_events.unbounded_send(SessionInput::Transport(event));
			}
		});

		let close_events = events.clone();
		let on_close = Closure::<dyn FnMut(CloseEvent)>::new(move |ev: CloseEvent| {
			let reason = ev.reason();
			let reason = if ev.was_clean() && reason.is_empty() {
				None
			} else if reason.is_empty() {
				Some(format!("connection closed (code {})", ev.code()))
			} else {
				Some(reason)
			};
			let _ = close_events.unbounded_send(SessionInput::Transport(TransportEvent::Closed(reason)));
		});

		let on_error = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
			let _ = events.unbounded_send(SessionInput::Transport(TransportEvent::Error(
				"connection error".into(),
			)));
		});

		socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
		socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
		socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));
		socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));

		info!("connecting to live endpoint {}", config.endpoint);
		Ok(Self {
			socket,
			_on_open: on_open,
			_on_message: on_message,
			_on_close: on_close,
			_on_error: on_error,
			closed: false,
		})
	}

	fn detach(&self) {
		self.socket.set_onopen(None);
		self.socket.set_onmessage(None);
		self.socket.set_onclose(None);
		self.socket.set_onerror(None);
	}
}

/// Server frames arrive as text or as binary JSON.
fn message_text(data: &JsValue) -> Option<String> {
	if let Some(text) = data.as_string() {
		return Some(text);
	}
	let buffer = data.dyn_ref::<js_sys::ArrayBuffer>()?;
	let bytes = js_sys::Uint8Array::new(buffer).to_vec();
	String::from_utf8(bytes).ok()
}

impl VoiceTransport for WebSocketTransport {
	fn send(&mut self, chunk: &AudioChunk) -> SessionResult<()> {
		if self.closed || self.socket.ready_state() != WebSocket::OPEN {
			return Err(SessionError::Transport("socket not open".into()));
		}
		let msg = realtime_input_message(chunk)?;
		self.socket
			.send_with_str(&msg)
			.map_err(|e| SessionError::Transport(js_error_message(&e)))
	}

	fn close(&mut self) -> SessionResult<()> {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		self.detach();
		self.socket
			.close()
			.map_err(|e| SessionError::Transport(js_error_message(&e)))
	}
}

impl Drop for WebSocketTransport {
	fn drop(&mut self) {
		let _ = self.close();
	}
}
