/// Default native-audio model for the live coach.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_VOICE: &str = "Zephyr";
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_INSTRUCTION: &str = "You are a friendly social dynamics coach. Help the user practice conversation or analyze their tone.";

/// Connection settings for a live voice session.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveConfig {
	pub api_key: String,
	pub model: String,
	pub voice: String,
	pub system_instruction: String,
	pub endpoint: String,
}

impl Default for LiveConfig {
	fn default() -> Self {
		Self {
			api_key: String::new(),
			model: DEFAULT_MODEL.into(),
			voice: DEFAULT_VOICE.into(),
			system_instruction: DEFAULT_INSTRUCTION.into(),
			endpoint: DEFAULT_ENDPOINT.into(),
		}
	}
}

impl LiveConfig {
	/// Defaults plus an API key baked in at build time from `GEMINI_API_KEY` or `API_KEY`.
	pub fn from_build_env() -> Self {
		let api_key = option_env!("GEMINI_API_KEY")
			.or(option_env!("API_KEY"))
			.unwrap_or_default();
		Self {
			api_key: api_key.trim().to_string(),
			..Self::default()
		}
	}

	/// Model path in the form the setup message expects.
	pub fn model_path(&self) -> String {
		if self.model.starts_with("models/") {
			self.model.clone()
		} else {
			format!("models/{}", self.model)
		}
	}

	/// Endpoint with the API key as a percent-encoded `key` query parameter.
	pub fn socket_url(&self) -> String {
		format!("{}?key={}", self.endpoint, urlencoding::encode(&self.api_key))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn model_path_is_prefixed_once() {
		let mut config = LiveConfig::default();
		assert_eq!(config.model_path(), format!("models/{DEFAULT_MODEL}"));
		config.model = "models/custom".into();
		assert_eq!(config.model_path(), "models/custom");
	}

	#[test]
	fn socket_url_carries_key() {
		let config = LiveConfig {
			api_key: "k123".into(),
			..LiveConfig::default()
		};
		assert!(config.socket_url().ends_with("BidiGenerateContent?key=k123"));
	}

	#[test]
	fn socket_url_encodes_key() {
		let config = LiveConfig {
			api_key: "a b&c=d/+".into(),
			..LiveConfig::default()
		};
		assert!(config.socket_url().ends_with("?key=a%20b%26c%3Dd%2F%2B"));
	}
}
