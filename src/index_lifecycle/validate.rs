use crate::EsError;

const FORBIDDEN_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#'];
const MAX_NAME_BYTES: usize = 255;

/// Validates an index name per ES's own rules: non-empty, none of
/// `\ / * ? " < > | , #` (a literal space is also rejected, matching ES),
/// not starting with `_ - +`, all lowercase, at most 255 bytes.
pub fn validate_index_name(name: &str) -> Result<(), EsError> {
	let fail = |reason: &str| EsError::InvalidIndexName {
		name: name.to_string(),
		reason: reason.to_string(),
	};

	if name.is_empty() {
		return Err(fail("index name must not be empty"));
	}
	if name.len() > MAX_NAME_BYTES {
		return Err(fail("index name must be at most 255 bytes"));
	}
	if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
		return Err(fail(&format!("index name must not contain '{c}'")));
	}
	if let Some(first) = name.chars().next() {
		if first == '_' || first == '-' || first == '+' {
			return Err(fail("index name must not start with '_', '-', or '+'"));
		}
	}
	if name.chars().any(|c| c.is_ascii_uppercase()) {
		return Err(fail("index name must be lowercase"));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_a_plain_lowercase_name() {
		assert!(validate_index_name("my-index-1").is_ok());
	}

	#[test]
	fn rejects_empty_name() {
		assert!(validate_index_name("").is_err());
	}

	#[test]
	fn rejects_uppercase_name() {
		assert!(validate_index_name("MyIndex").is_err());
	}

	#[test]
	fn rejects_name_starting_with_underscore() {
		assert!(validate_index_name("_reserved").is_err());
	}

	#[test]
	fn rejects_name_starting_with_hyphen() {
		assert!(validate_index_name("-bad").is_err());
	}

	#[test]
	fn rejects_name_starting_with_plus() {
		assert!(validate_index_name("+bad").is_err());
	}

	#[test]
	fn rejects_forbidden_characters() {
		for c in ['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#'] {
			let name = format!("bad{c}name");
			assert!(validate_index_name(&name).is_err(), "expected {c:?} to be rejected");
		}
	}

	#[test]
	fn rejects_name_over_255_bytes() {
		let name = "a".repeat(256);
		assert!(validate_index_name(&name).is_err());
	}

	#[test]
	fn accepts_name_at_exactly_255_bytes() {
		let name = "a".repeat(255);
		assert!(validate_index_name(&name).is_ok());
	}
}
