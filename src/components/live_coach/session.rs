//! Live session state machine.
//!
//! One `LiveSession` owns the transport, the playback queue and the microphone.
//! Every callback (socket, microphone, playback end, UI stop button) is turned into
//! a `SessionInput` and fed to `run_session`, so the state only changes in one place.

use std::fmt;

use futures::{Stream, StreamExt};
use log::{info, warn};

use super::error::SessionResult;
use super::pcm::{decode_chunk, encode_frame};
use super::playback::{AudioOutput, PlaybackQueue, VoiceId};
use super::transport::{TransportEvent, VoiceTransport};

/// Microphone seam.
pub trait AudioCapture {
	/// Starts delivering frames.
	fn start(&mut self) -> SessionResult<()>;

	/// Stops capture and releases the device. Calling it again is a no-op.
	fn stop(&mut self) -> SessionResult<()>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionStatus {
	#[default]
	Idle,
	Connecting,
	Open,
	Closed { reason: Option<String> },
}

impl SessionStatus {
	pub fn is_closed(&self) -> bool {
		matches!(self, SessionStatus::Closed { .. })
	}

	/// Whether a new session may be started from this state.
	pub fn can_start(&self) -> bool {
		matches!(self, SessionStatus::Idle | SessionStatus::Closed { .. })
	}
}

impl fmt::Display for SessionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionStatus::Idle => f.write_str("idle"),
			SessionStatus::Connecting => f.write_str("connecting"),
			SessionStatus::Open => f.write_str("open"),
			SessionStatus::Closed { reason: None } => f.write_str("closed"),
			SessionStatus::Closed { reason: Some(r) } => write!(f, "closed: {r}"),
		}
	}
}

/// Everything that can happen to a running session.
#[derive(Debug)]
pub enum SessionInput {
	Transport(TransportEvent),
	CaptureFrame(Vec<f32>),
	PlaybackEnded(VoiceId),
	Stop,
}

/// Short user-facing log lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionNotice {
	Connected,
	Interrupted,
	Disconnected,
	Failed(String),
}

impl fmt::Display for SessionNotice {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionNotice::Connected => f.write_str("Connected to Live API"),
			SessionNotice::Interrupted => f.write_str("Interrupted"),
			SessionNotice::Disconnected => f.write_str("Disconnected"),
			SessionNotice::Failed(reason) => write!(f, "Error: {reason}"),
		}
	}
}

/// What the UI shows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
	pub status: SessionStatus,
	pub speaking: bool,
}

pub struct LiveSession<T: VoiceTransport, O: AudioOutput, C: AudioCapture> {
	transport: T,
	playback: PlaybackQueue<O>,
	capture: C,
	status: SessionStatus,
}

impl<T: VoiceTransport, O: AudioOutput, C: AudioCapture> LiveSession<T, O, C> {
	/// A session whose resources are acquired and whose handshake is in flight.
	pub fn connecting(transport: T, output: O, capture: C) -> Self {
		Self {
			transport,
			playback: PlaybackQueue::new(output),
			capture,
			status: SessionStatus::Connecting,
		}
	}

	pub fn status(&self) -> &SessionStatus {
		&self.status
	}

	pub fn is_speaking(&self) -> bool {
		self.playback.is_speaking()
	}

	pub fn snapshot(&self) -> SessionSnapshot {
		SessionSnapshot {
			status: self.status.clone(),
			speaking: self.is_speaking(),
		}
	}

	#[cfg(test)]
	pub fn playback(&self) -> &PlaybackQueue<O> {
		&self.playback
	}

	pub fn handle(&mut self, input: SessionInput) -> Option<SessionNotice> {
		if self.status.is_closed() {
			return None;
		}
		match input {
			SessionInput::Transport(event) => self.on_transport(event),
			SessionInput::CaptureFrame(samples) => {
				if self.status != SessionStatus::Open {
					return None;
				}
				let chunk = encode_frame(&samples);
				match self.transport.send(&chunk) {
					Ok(()) => None,
					Err(e) => Some(self.fail(e.to_string())),
				}
			}
			SessionInput::PlaybackEnded(id) => {
				self.playback.finished(id);
				None
			}
			SessionInput::Stop => {
				self.stop();
				Some(SessionNotice::Disconnected)
			}
		}
	}

	fn on_transport(&mut self, event: TransportEvent) -> Option<SessionNotice> {
		match event {
			TransportEvent::Opened => {
				if self.status != SessionStatus::Connecting {
					return None;
				}
				if let Err(e) = self.capture.start() {
					return Some(self.fail(e.to_string()));
				}
				self.status = SessionStatus::Open;
				info!("live session open");
				Some(SessionNotice::Connected)
			}
			TransportEvent::Audio(data) => {
				let scheduled = decode_chunk(&data).and_then(|samples| self.playback.enqueue(&samples));
				match scheduled {
					Ok(_) => None,
					Err(e) => Some(self.fail(e.to_string())),
				}
			}
			TransportEvent::Interrupted => {
				self.playback.interrupt();
				Some(SessionNotice::Interrupted)
			}
			TransportEvent::Closed(reason) if self.status == SessionStatus::Connecting => {
				let reason = reason.unwrap_or_else(|| "connection closed before setup completed".into());
				Some(self.fail(reason))
			}
			TransportEvent::Closed(reason) => {
				self.shutdown(reason);
				Some(SessionNotice::Disconnected)
			}
			TransportEvent::Error(reason) => Some(self.fail(reason)),
		}
	}

	fn fail(&mut self, reason: String) -> SessionNotice {
		warn!("live session failed: {reason}");
		self.shutdown(Some(reason.clone()));
		SessionNotice::Failed(reason)
	}

	/// Releases every resource. Safe to call any number of times.
	pub fn stop(&mut self) {
		self.shutdown(None);
	}

	fn shutdown(&mut self, reason: Option<String>) {
		if self.status.is_closed() {
			return;
		}
		if let Err(e) = self.capture.stop() {
			warn!("releasing microphone: {e}");
		}
		// close() already logs its own failure
		let _ = self.playback.close();
		if let Err(e) = self.transport.close() {
			warn!("closing transport: {e}");
		}
		info!("live session closed");
		self.status = SessionStatus::Closed { reason };
	}
}

/// Drives a session from its input stream until it closes.
///
/// `report` sees the snapshot after every input, plus the notice it produced.
pub async fn run_session<T, O, C, S, R>(mut session: LiveSession<T, O, C>, mut inputs: S, mut report: R)
where
	T: VoiceTransport,
	O: AudioOutput,
	C: AudioCapture,
	S: Stream<Item = SessionInput> + Unpin,
	R: FnMut(SessionSnapshot, Option<SessionNotice>),
{
	report(session.snapshot(), None);
	while let Some(input) = inputs.next().await {
		let notice = session.handle(input);
		report(session.snapshot(), notice);
		if session.status().is_closed() {
			return;
		}
	}
	// every sender is gone; nothing can stop us later
	session.stop();
	report(session.snapshot(), Some(SessionNotice::Disconnected));
}

#[cfg(test)]
mod tests {
	use std::cell::{Cell, RefCell};
	use std::rc::Rc;

	use base64::Engine as _;
	use base64::engine::general_purpose::STANDARD as BASE64;
	use futures::executor::block_on;

	use super::super::error::SessionError;
	use super::super::pcm::AudioChunk;
	use super::super::transport::frame_events;
	use super::super::playback::fake::FakeOutput;
	use super::*;

	#[derive(Clone, Default)]
	struct FakeTransport {
		sent: Rc<RefCell<Vec<AudioChunk>>>,
		fail_send: Rc<Cell<bool>>,
		closes: Rc<Cell<usize>>,
	}

	impl VoiceTransport for FakeTransport {
		fn send(&mut self, chunk: &AudioChunk) -> SessionResult<()> {
			if self.fail_send.get() {
				return Err(SessionError::Transport("socket not open".into()));
			}
			self.sent.borrow_mut().push(chunk.clone());
			Ok(())
		}

		fn close(&mut self) -> SessionResult<()> {
			self.closes.set(self.closes.get() + 1);
			Ok(())
		}
	}

	#[derive(Clone, Default)]
	struct FakeCapture {
		fail_start: bool,
		started: Rc<Cell<usize>>,
		stops: Rc<Cell<usize>>,
	}

	impl AudioCapture for FakeCapture {
		fn start(&mut self) -> SessionResult<()> {
			if self.fail_start {
				return Err(SessionError::Microphone("permission denied".into()));
			}
			self.started.set(self.started.get() + 1);
			Ok(())
		}

		fn stop(&mut self) -> SessionResult<()> {
			self.stops.set(self.stops.get() + 1);
			// a failing release must not keep the rest from closing
			Err(SessionError::Audio("already closed".into()))
		}
	}

	type TestSession = LiveSession<FakeTransport, FakeOutput, FakeCapture>;

	fn session() -> (TestSession, FakeTransport, FakeOutput, FakeCapture) {
		let (t, o, c) = (
			FakeTransport::default(),
			FakeOutput::default(),
			FakeCapture::default(),
		);
		(
			LiveSession::connecting(t.clone(), o.clone(), c.clone()),
			t,
			o,
			c,
		)
	}

	fn audio(seconds: f64) -> SessionInput {
		let samples = (seconds * 24_000.0) as usize;
		let bytes = vec![0u8; samples * 2];
		SessionInput::Transport(TransportEvent::Audio(BASE64.encode(bytes)))
	}

	#[test]
	fn opens_on_handshake_and_streams_capture() {
		let (mut s, transport, _, capture) = session();
		assert_eq!(s.handle(SessionInput::CaptureFrame(vec![0.1; 8])), None);
		assert!(transport.sent.borrow().is_empty(), "no audio before open");

		assert_eq!(
			s.handle(SessionInput::Transport(TransportEvent::Opened)),
			Some(SessionNotice::Connected)
		);
		assert_eq!(s.status(), &SessionStatus::Open);
		assert_eq!(capture.started.get(), 1);

		s.handle(SessionInput::CaptureFrame(vec![0.1; 4096]));
		s.handle(SessionInput::CaptureFrame(vec![-0.1; 4096]));
		let sent = transport.sent.borrow();
		assert_eq!(sent.len(), 2);
		assert_eq!(sent[0].mime_type, "audio/pcm;rate=16000");
	}

	#[test]
	fn gapless_playback_then_interruption() {
		let (mut s, _, output, _) = session();
		s.handle(SessionInput::Transport(TransportEvent::Opened));
		s.handle(audio(0.5));
		s.handle(audio(0.25));
		{
			let played = output.played.borrow();
			assert_eq!(played[0].1, 0.0);
			assert_eq!(played[1].1, 0.5);
		}
		assert!(s.is_speaking());

		output.clock.set(0.1);
		assert_eq!(
			s.handle(SessionInput::Transport(TransportEvent::Interrupted)),
			Some(SessionNotice::Interrupted)
		);
		assert!(!s.is_speaking());
		assert_eq!(s.playback().next_start(), 0.0);
		assert!(output.played.borrow().iter().all(|(.., v)| v.stopped.get()));

		s.handle(audio(0.5));
		assert_eq!(output.played.borrow()[2].1, 0.1);
	}

	#[test]
	fn speaking_follows_playback_completion() {
		let (mut s, _, output, _) = session();
		s.handle(SessionInput::Transport(TransportEvent::Opened));
		s.handle(audio(0.1));
		s.handle(audio(0.1));
		let ids: Vec<_> = output.played.borrow().iter().map(|p| p.0).collect();
		s.handle(SessionInput::PlaybackEnded(ids[0]));
		assert!(s.snapshot().speaking);
		s.handle(SessionInput::PlaybackEnded(ids[1]));
		assert!(!s.snapshot().speaking);
	}

	#[test]
	fn double_stop_is_idempotent() {
		let (mut s, transport, output, capture) = session();
		s.handle(SessionInput::Transport(TransportEvent::Opened));
		s.stop();
		assert_eq!(s.status(), &SessionStatus::Closed { reason: None });
		s.stop();
		assert_eq!(s.status(), &SessionStatus::Closed { reason: None });
		assert_eq!(s.handle(SessionInput::Stop), None);

		assert_eq!(capture.stops.get(), 1);
		assert_eq!(output.closes.get(), 1);
		assert_eq!(transport.closes.get(), 1);
	}

	#[test]
	fn capture_failure_never_opens() {
		let capture = FakeCapture {
			fail_start: true,
			..FakeCapture::default()
		};
		let transport = FakeTransport::default();
		let mut s = LiveSession::connecting(transport.clone(), FakeOutput::default(), capture);
		let notice = s.handle(SessionInput::Transport(TransportEvent::Opened));
		assert!(matches!(notice, Some(SessionNotice::Failed(_))));
		assert!(matches!(
			s.status(),
			SessionStatus::Closed { reason: Some(r) } if r.contains("permission denied")
		));
		assert!(s.status().can_start());
		assert_eq!(transport.closes.get(), 1);
	}

	#[test]
	fn transport_errors_close_with_reason() {
		let (mut s, transport, _, _) = session();
		s.handle(SessionInput::Transport(TransportEvent::Opened));
		transport.fail_send.set(true);
		let notice = s.handle(SessionInput::CaptureFrame(vec![0.0; 16]));
		assert!(matches!(notice, Some(SessionNotice::Failed(_))));
		assert!(s.status().is_closed());
		// frames after close are ignored, not sent
		transport.fail_send.set(false);
		s.handle(SessionInput::CaptureFrame(vec![0.0; 16]));
		assert!(transport.sent.borrow().is_empty());

		let (mut s, _, _, _) = session();
		s.handle(SessionInput::Transport(TransportEvent::Error("refused".into())));
		assert_eq!(
			s.status(),
			&SessionStatus::Closed {
				reason: Some("refused".into())
			}
		);

		let (mut s, _, _, _) = session();
		s.handle(SessionInput::Transport(TransportEvent::Opened));
		s.handle(SessionInput::Transport(TransportEvent::Audio("%%%".into())));
		assert!(s.status().is_closed());
	}

	#[test]
	fn close_before_setup_fails_with_reason() {
		let (mut s, transport, _, capture) = session();
		let notice = s.handle(SessionInput::Transport(TransportEvent::Closed(None)));
		assert_eq!(
			notice,
			Some(SessionNotice::Failed(
				"connection closed before setup completed".into()
			))
		);
		assert_eq!(
			s.status(),
			&SessionStatus::Closed {
				reason: Some("connection closed before setup completed".into())
			}
		);
		assert_eq!(capture.started.get(), 0);
		assert_eq!(transport.closes.get(), 1);

		let (mut s, _, _, _) = session();
		s.handle(SessionInput::Transport(TransportEvent::Closed(Some("bad key".into()))));
		assert_eq!(
			s.status(),
			&SessionStatus::Closed {
				reason: Some("bad key".into())
			}
		);

		// once open, a clean close is an ordinary disconnect
		let (mut s, _, _, _) = session();
		s.handle(SessionInput::Transport(TransportEvent::Opened));
		assert_eq!(
			s.handle(SessionInput::Transport(TransportEvent::Closed(None))),
			Some(SessionNotice::Disconnected)
		);
		assert_eq!(s.status(), &SessionStatus::Closed { reason: None });
	}

	#[test]
	fn unreadable_frame_closes_open_session() {
		let (mut s, _, _, _) = session();
		s.handle(SessionInput::Transport(TransportEvent::Opened));
		for event in frame_events(Some("not json")) {
			s.handle(SessionInput::Transport(event));
		}
		assert!(matches!(s.status(), SessionStatus::Closed { reason: Some(_) }));
	}

	#[test]
	fn run_session_reports_until_closed() {
		let (s, transport, _, _) = session();
		let inputs = futures::stream::iter(vec![
			SessionInput::Transport(TransportEvent::Opened),
			SessionInput::CaptureFrame(vec![0.2; 32]),
			SessionInput::Transport(TransportEvent::Closed(Some("server going away".into()))),
			SessionInput::CaptureFrame(vec![0.2; 32]),
		]);
		let mut reports = Vec::new();
		block_on(run_session(s, inputs, |snap, notice| reports.push((snap, notice))));

		assert_eq!(reports[0].0.status, SessionStatus::Connecting);
		assert_eq!(reports[1].1, Some(SessionNotice::Connected));
		let last = reports.last().unwrap();
		assert_eq!(last.1, Some(SessionNotice::Disconnected));
		assert_eq!(
			last.0.status,
			SessionStatus::Closed {
				reason: Some("server going away".into())
			}
		);
		assert_eq!(reports.len(), 4, "input after close is not consumed");
		assert_eq!(transport.sent.borrow().len(), 1);
	}

	#[test]
	fn run_session_stops_when_inputs_end() {
		let (s, transport, _, capture) = session();
		let inputs = futures::stream::iter(vec![SessionInput::Transport(TransportEvent::Opened)]);
		let mut last = None;
		block_on(run_session(s, inputs, |snap, _| last = Some(snap)));
		assert!(last.unwrap().status.is_closed());
		assert_eq!(capture.stops.get(), 1);
		assert_eq!(transport.closes.get(), 1);
	}
}
