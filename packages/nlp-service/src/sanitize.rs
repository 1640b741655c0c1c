use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static EXCESS_NEWLINES: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\n{3,}").expect("Newline pattern must compile."));

/// Normalises document text before it is returned or fed to tokenizers.
pub fn sanitize(input: &str) -> String {
	let normalized: String = input.nfkc().collect();
	let unified = normalized.replace("\r\n", "\n").replace('\r', "\n");
	let kept: String = unified.chars().filter(|ch| !is_dropped(*ch)).collect();

	EXCESS_NEWLINES.replace_all(&kept, "\n\n").trim().to_string()
}

fn is_dropped(ch: char) -> bool {
	if matches!(ch, '\n' | '\t') {
		return false;
	}

	ch.is_control() || is_zero_width(ch)
}

fn is_zero_width(ch: char) -> bool {
	matches!(
		ch,
		'\u{00AD}' // soft hyphen
			| '\u{034F}' // combining grapheme joiner
			| '\u{061C}' // arabic letter mark
			| '\u{180E}' // mongolian vowel separator
			| '\u{200B}' // zero width space
			| '\u{200C}' // zero width non-joiner
			| '\u{200D}' // zero width joiner
			| '\u{2060}' // word joiner
			| '\u{FEFF}' // zero width no-break space
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn collapses_blank_runs_and_line_endings() {
		assert_eq!(sanitize("a\r\n\r\n\r\n\r\nb\rc"), "a\n\nb\nc");
	}

	#[test]
	fn drops_controls_and_zero_width() {
		assert_eq!(sanitize("  in\u{200B}no\u{0007}vation\tlab \n"), "innovation\tlab");
	}

	#[test]
	fn applies_compatibility_normalization() {
		assert_eq!(sanitize("ＵＮＤＰ ﬁle"), "UNDP file");
	}
}
