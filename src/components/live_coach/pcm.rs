//! 16-bit PCM framing for the live audio stream.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use super::error::SessionResult;

/// Microphone capture rate sent upstream.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
/// Rate of the agent's audio.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;
/// Samples per captured frame.
pub const CAPTURE_FRAME_SIZE: u32 = 4096;

/// One encoded chunk of audio, ready to send.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunk {
	pub mime_type: String,
	pub data: String,
}

pub fn f32_to_i16(sample: f32) -> i16 {
	(sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn i16_to_f32(sample: i16) -> f32 {
	sample as f32 / 32768.0
}

/// Little-endian 16-bit PCM, base64 encoded, tagged with the input rate.
pub fn encode_frame(samples: &[f32]) -> AudioChunk {
	let bytes: Vec<u8> = samples
		.iter()
		.flat_map(|&s| f32_to_i16(s).to_le_bytes())
		.collect();
	AudioChunk {
		mime_type: format!("audio/pcm;rate={INPUT_SAMPLE_RATE}"),
		data: BASE64.encode(bytes),
	}
}

/// Decodes base64 little-endian 16-bit PCM into float samples. A trailing odd byte is ignored.
pub fn decode_chunk(data: &str) -> SessionResult<Vec<f32>> {
	let bytes = BASE64.decode(data.trim())?;
	Ok(bytes
		.chunks_exact(2)
		.map(|pair| i16_to_f32(i16::from_le_bytes([pair[0], pair[1]])))
		.collect())
}

/// Playback length of `samples` at the output rate, in seconds.
pub fn output_duration(samples: usize) -> f64 {
	samples as f64 / OUTPUT_SAMPLE_RATE as f64
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn float_conversion_clamps_at_full_scale() {
		assert_eq!(f32_to_i16(0.0), 0);
		assert_eq!(f32_to_i16(1.0), i16::MAX);
		assert_eq!(f32_to_i16(-1.0), i16::MIN);
		assert_eq!(f32_to_i16(3.5), i16::MAX);
		assert_eq!(f32_to_i16(0.5), 16384);
	}

	#[test]
	fn frame_is_tagged_and_little_endian() {
		let chunk = encode_frame(&[0.5, -0.5]);
		assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
		let bytes = BASE64.decode(&chunk.data).unwrap();
		assert_eq!(bytes, vec![0x00, 0x40, 0x00, 0xc0]);
	}

	#[test]
	fn decodes_agent_audio() {
		let data = BASE64.encode([0x00, 0x40, 0x00, 0x80, 0x7f]);
		let samples = decode_chunk(&data).unwrap();
		assert_eq!(samples, vec![0.5, -1.0]);
		assert!(decode_chunk("not base64!").is_err());
	}

	#[test]
	fn duration_uses_output_rate() {
		assert_eq!(output_duration(24_000), 1.0);
		assert_eq!(output_duration(12_000), 0.5);
	}
}
