//! Sentiment color handling. Influential entities get a more saturated, brighter
//! version of their base hue.

use super::types::DEFAULT_SENTIMENT_COLOR;

const SATURATION_FLOOR: f64 = 0.3;
const SATURATION_SCALE: f64 = 0.8;
const LIGHTNESS_SCALE: f64 = 0.4;
const SATURATION_CLAMP: (f64, f64) = (0.1, 1.0);
const LIGHTNESS_CLAMP: (f64, f64) = (0.25, 0.75);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

/// Hue in degrees, saturation and lightness in `0..=1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
	pub h: f64,
	pub s: f64,
	pub l: f64,
}

impl Rgb {
	/// Parses `#rgb` or `#rrggbb` (leading `#` optional).
	pub fn parse_hex(hex: &str) -> Option<Self> {
		let digits = hex.trim().trim_start_matches('#');
		let channel = |s: &str| u8::from_str_radix(s, 16).ok();
		match digits.len() {
			3 => {
				let mut it = digits.chars().map(|c| channel(&format!("{c}{c}")));
				Some(Rgb {
					r: it.next()??,
					g: it.next()??,
					b: it.next()??,
				})
			}
			6 if digits.is_ascii() => Some(Rgb {
				r: channel(&digits[0..2])?,
				g: channel(&digits[2..4])?,
				b: channel(&digits[4..6])?,
			}),
			_ => None,
		}
	}

	pub fn css(&self) -> String {
		format!("rgb({}, {}, {})", self.r, self.g, self.b)
	}

	pub fn css_alpha(&self, alpha: f64) -> String {
		format!("rgba({}, {}, {}, {:.3})", self.r, self.g, self.b, alpha.clamp(0.0, 1.0))
	}

	pub fn to_hsl(self) -> Hsl {
		let (r, g, b) = (
			self.r as f64 / 255.0,
			self.g as f64 / 255.0,
			self.b as f64 / 255.0,
		);
		let (max, min) = (r.max(g).max(b), r.min(g).min(b));
		let l = (max + min) / 2.0;
		let d = max - min;
		if d == 0.0 {
			return Hsl { h: 0.0, s: 0.0, l };
		}
		let s = if l < 0.5 {
			d / (max + min)
		} else {
			d / (2.0 - max - min)
		};
		let h = if max == r {
			(g - b) / d + if g < b { 6.0 } else { 0.0 }
		} else if max == g {
			(b - r) / d + 2.0
		} else {
			(r - g) / d + 4.0
		};
		Hsl { h: h * 60.0, s, l }
	}
}

impl Hsl {
	pub fn to_rgb(self) -> Rgb {
		let h = self.h.rem_euclid(360.0) / 360.0;
		let (s, l) = (self.s.clamp(0.0, 1.0), self.l.clamp(0.0, 1.0));
		if s == 0.0 {
			let v = to_byte(l);
			return Rgb { r: v, g: v, b: v };
		}
		let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
		let p = 2.0 * l - q;
		Rgb {
			r: to_byte(hue_to_channel(p, q, h + 1.0 / 3.0)),
			g: to_byte(hue_to_channel(p, q, h)),
			b: to_byte(hue_to_channel(p, q, h - 1.0 / 3.0)),
		}
	}
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
	if t < 0.0 {
		t += 1.0;
	}
	if t > 1.0 {
		t -= 1.0;
	}
	if t < 1.0 / 6.0 {
		p + (q - p) * 6.0 * t
	} else if t < 0.5 {
		q
	} else if t < 2.0 / 3.0 {
		p + (q - p) * (2.0 / 3.0 - t) * 6.0
	} else {
		p
	}
}

fn to_byte(v: f64) -> u8 {
	(v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// HSL of the entity's render color for a sentiment hex and an influence in `1..=10`.
pub fn influence_hsl(hex: &str, influence: u8) -> Hsl {
	let base = Rgb::parse_hex(hex)
		.or_else(|| Rgb::parse_hex(DEFAULT_SENTIMENT_COLOR))
		.unwrap_or(Rgb {
			r: 203,
			g: 213,
			b: 225,
		});
	let mut c = base.to_hsl();
	let intensity = influence.clamp(1, 10) as f64 / 10.0;

	c.s = c.s.max(SATURATION_FLOOR) + (intensity - 0.5) * SATURATION_SCALE;
	c.s = c.s.clamp(SATURATION_CLAMP.0, SATURATION_CLAMP.1);

	c.l += (intensity - 0.5) * LIGHTNESS_SCALE;
	c.l = c.l.clamp(LIGHTNESS_CLAMP.0, LIGHTNESS_CLAMP.1);
	c
}

pub fn adjust_for_influence(hex: &str, influence: u8) -> Rgb {
	influence_hsl(hex, influence).to_rgb()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_short_and_long_hex() {
		assert_eq!(
			Rgb::parse_hex("#fff"),
			Some(Rgb {
				r: 255,
				g: 255,
				b: 255
			})
		);
		assert_eq!(
			Rgb::parse_hex("ef4444"),
			Some(Rgb {
				r: 0xef,
				g: 0x44,
				b: 0x44
			})
		);
		assert_eq!(Rgb::parse_hex("#12345"), None);
		assert_eq!(Rgb::parse_hex("#zzzzzz"), None);
	}

	#[test]
	fn hsl_round_trips_primary_colors() {
		for hex in ["#ff0000", "#00ff00", "#0000ff", "#808080"] {
			let rgb = Rgb::parse_hex(hex).unwrap();
			assert_eq!(rgb.to_hsl().to_rgb(), rgb, "{hex}");
		}
	}

	#[test]
	fn higher_influence_is_more_saturated() {
		for hex in ["#3b82f6", "#ef4444", "#cbd5e1", "#22c55e"] {
			let low = influence_hsl(hex, 2);
			let high = influence_hsl(hex, 9);
			assert!(high.s > low.s, "{hex}: {} <= {}", high.s, low.s);
		}
	}

	#[test]
	fn adjusted_values_stay_in_range() {
		for influence in 1..=10 {
			for hex in ["#000000", "#ffffff", "#8b5cf6", "not a color"] {
				let c = influence_hsl(hex, influence);
				assert!((0.1..=1.0).contains(&c.s));
				assert!((0.25..=0.75).contains(&c.l));
			}
		}
	}
}
