//! Error types for the live voice session.

use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Result type alias for live session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised while opening or running a live session
#[derive(Error, Debug)]
pub enum SessionError {
	#[error("Microphone unavailable: {0}")]
	Microphone(String),

	#[error("Audio pipeline error: {0}")]
	Audio(String),

	#[error("Transport error: {0}")]
	Transport(String),

	#[error("Protocol error: {0}")]
	Protocol(#[from] serde_json::Error),

	#[error("Invalid audio payload: {0}")]
	Decode(#[from] base64::DecodeError),
}

/// Best-effort human-readable message for a thrown JS value.
pub fn js_error_message(value: &JsValue) -> String {
	if let Some(s) = value.as_string() {
		return s;
	}
	if let Some(err) = value.dyn_ref::<js_sys::Error>() {
		return String::from(err.message());
	}
	js_sys::Reflect::get(value, &JsValue::from_str("message"))
		.ok()
		.and_then(|m| m.as_string())
		.unwrap_or_else(|| format!("{value:?}"))
}
