use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

static WIFI: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\bwi\s*[-\s]?\s*fi\b").ok());
static NON_WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[^a-z0-9\-\s]").ok());

/// Lowercase, ASCII-folded form used for keyword matching.
pub fn normalize_text(raw: &str) -> String {
	let lowered = raw
		.to_lowercase()
		.chars()
		.map(|ch| match ch {
			'\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{00AD}' => '-',
			_ => ch,
		})
		.collect::<String>();
	let folded = lowered
		.nfkd()
		.filter(|ch| !is_combining_mark(*ch))
		.filter(char::is_ascii)
		.collect::<String>();
	let folded = replace_all(&WIFI, folded, "wifi");
	let folded = replace_all(&NON_WORD, folded, " ");

	folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits free-form keyword entries on `,`, `/` and `|`, dropping empty parts.
pub fn split_terms<S>(terms: &[S]) -> Vec<String>
where
	S: AsRef<str>,
{
	let mut out = Vec::new();

	for term in terms {
		for part in term.as_ref().split([',', '/', '|']) {
			let part = part.trim();

			if !part.is_empty() {
				out.push(part.to_string());
			}
		}
	}

	out
}

fn replace_all(regex: &LazyLock<Option<Regex>>, text: String, with: &str) -> String {
	match regex.as_ref() {
		Some(regex) => regex.replace_all(&text, with).into_owned(),
		None => text,
	}
}
