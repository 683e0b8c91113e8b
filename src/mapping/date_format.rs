//! ES date-format-string -> engine date-parser-grammar translation.
//!
//! ES format strings use Joda/`java.time`-style tokens (`yyyy`, `MM`, `HH`, ...).
//! The embedded engine's date parser uses Go's reference-time layout instead
//! (`2006`, `01`, `15`, ...). Token lookup is ordered longest-first so that,
//! e.g., `yyyy` is matched before a stray `yy` substring could be.

const TOKEN_TABLE: &[(&str, &str)] = &[
	("yyyy", "2006"),
	("YYYY", "2006"),
	("SSS", "000"),
	("HH", "15"),
	("hh", "03"),
	("MM", "01"),
	("dd", "02"),
	("DD", "02"),
	("mm", "04"),
	("ss", "05"),
	("Z", "Z07:00"),
	("z", "MST"),
];

/// Translates a single ES date format string into the engine's layout
/// grammar, token by token, left to right.
pub fn translate_format(es_format: &str) -> String {
	let mut out = String::with_capacity(es_format.len());
	let chars: Vec<char> = es_format.chars().collect();
	let mut i = 0;
	'outer: while i < chars.len() {
		for (token, replacement) in TOKEN_TABLE {
			let token_chars: Vec<char> = token.chars().collect();
			if chars[i..].starts_with(token_chars.as_slice()) {
				out.push_str(replacement);
				i += token_chars.len();
				continue 'outer;
			}
		}
		out.push(chars[i]);
		i += 1;
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn translates_common_iso_format() {
		assert_eq!(translate_format("yyyy-MM-dd"), "2006-01-02");
	}

	#[test]
	fn translates_full_datetime_with_millis_and_zone() {
		assert_eq!(
			translate_format("yyyy-MM-dd'T'HH:mm:ss.SSSZ"),
			"2006-01-02'T'15:04:05.000Z07:00"
		);
	}

	#[test]
	fn passes_through_literal_separators() {
		assert_eq!(translate_format("dd/MM/yyyy"), "02/01/2006");
	}

	#[test]
	fn prefers_longest_token_over_shorter_prefix() {
		// yyyy must not be parsed as yy+yy, and must win over a bare y token
		// (which does not exist in the table at all, so any match is yyyy's).
		assert_eq!(translate_format("yyyy"), "2006");
	}

	#[test]
	fn twelve_hour_clock_token() {
		assert_eq!(translate_format("hh:mm a"), "03:04 a");
	}

	#[test]
	fn empty_format_translates_to_empty() {
		assert_eq!(translate_format(""), "");
	}
}
