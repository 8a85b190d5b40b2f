//! Gapless scheduling of the agent's audio.
//!
//! Each inbound chunk starts at `max(now, cursor)` and pushes the cursor forward by
//! its own length, so consecutive chunks play back to back. Interruption stops every
//! scheduled voice and resets the cursor.

use std::collections::BTreeMap;

use log::{debug, warn};

use super::error::SessionResult;
use super::pcm::output_duration;

/// Identifies one scheduled chunk for its completion callback.
pub type VoiceId = u64;

/// A chunk that has been handed to the output device.
pub trait Voice {
	/// Silences the chunk now, whether or not it has started.
	fn stop(&self);
}

/// Audio sink with its own clock, in seconds.
pub trait AudioOutput {
	type Voice: Voice;

	fn current_time(&self) -> f64;

	/// Schedules `samples` at `start_at`. The implementation reports completion of
	/// `id` back to the session.
	fn play(&mut self, samples: &[f32], start_at: f64, id: VoiceId) -> SessionResult<Self::Voice>;

	/// Releases the device. Calling it again is a no-op.
	fn close(&mut self) -> SessionResult<()>;
}

/// Where and for how long a chunk was scheduled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scheduled {
	pub id: VoiceId,
	pub start: f64,
	pub duration: f64,
}

pub struct PlaybackQueue<O: AudioOutput> {
	output: O,
	next_start: f64,
	voices: BTreeMap<VoiceId, O::Voice>,
	next_id: VoiceId,
}

impl<O: AudioOutput> PlaybackQueue<O> {
	pub fn new(output: O) -> Self {
		Self {
			output,
			next_start: 0.0,
			voices: BTreeMap::new(),
			next_id: 0,
		}
	}

	pub fn enqueue(&mut self, samples: &[f32]) -> SessionResult<Scheduled> {
		let start = self.output.current_time().max(self.next_start);
		let duration = output_duration(samples.len());
		let id = self.next_id;
		let voice = self.output.play(samples, start, id)?;

		self.next_id += 1;
		self.next_start = start + duration;
		self.voices.insert(id, voice);
		Ok(Scheduled {
			id,
			start,
			duration,
		})
	}

	/// Forgets a voice that played to the end. Returns whether audio is still queued.
	pub fn finished(&mut self, id: VoiceId) -> bool {
		self.voices.remove(&id);
		self.is_speaking()
	}

	/// Drops everything queued so the next chunk starts immediately.
	pub fn interrupt(&mut self) {
		debug!("interrupting {} queued voices", self.voices.len());
		for voice in self.voices.values() {
			voice.stop();
		}
		self.voices.clear();
		self.next_start = 0.0;
	}

	pub fn is_speaking(&self) -> bool {
		!self.voices.is_empty()
	}

	#[cfg(test)]
	pub fn queued(&self) -> usize {
		self.voices.len()
	}

	#[cfg(test)]
	pub fn next_start(&self) -> f64 {
		self.next_start
	}

	pub fn close(&mut self) -> SessionResult<()> {
		self.interrupt();
		self.output.close().inspect_err(|e| warn!("closing audio output: {e}"))
	}

	#[cfg(test)]
	pub fn output(&self) -> &O {
		&self.output
	}
}
