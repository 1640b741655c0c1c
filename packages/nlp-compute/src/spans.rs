use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, Tensor};

pub const RANGES_FIELD: &str = "ranges";
pub const TEXT_FIELD: &str = "text";

/// Text spans found in one input: `ranges[i]` is the `(start, end)` of `text[i]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanExtraction {
	pub ranges: Vec<(i64, i64)>,
	pub text: Vec<String>,
}
impl SpanExtraction {
	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty() && self.text.is_empty()
	}

	/// The backend reports "nothing found" as a single empty range paired with one empty span.
	fn is_sentinel(&self) -> bool {
		matches!(self.ranges.as_slice(), [(0, 0)])
			&& matches!(self.text.as_slice(), [only] if only.is_empty())
	}
}

pub(crate) fn decode_spans(result: &BTreeMap<String, Tensor>) -> Result<SpanExtraction> {
	let ranges = decode_ranges(field(result, RANGES_FIELD)?)?;
	let text = decode_texts(field(result, TEXT_FIELD)?)?;
	let spans = SpanExtraction { ranges, text };

	if spans.is_sentinel() {
		return Ok(SpanExtraction::default());
	}

	Ok(spans)
}

fn field<'a>(result: &'a BTreeMap<String, Tensor>, name: &str) -> Result<&'a Tensor> {
	result.get(name).ok_or_else(|| Error::MissingField { field: name.to_string() })
}

// Ranges arrive as a 2 x N matrix: starts in the first row, ends in the second.
fn decode_ranges(value: &Tensor) -> Result<Vec<(i64, i64)>> {
	let Tensor::IntMatrix(rows) = value else {
		return Err(Error::OutputShapeMismatch {
			field: RANGES_FIELD.to_string(),
			expected: "int matrix",
			found: value.kind(),
		});
	};
	let [starts, ends] = rows.as_slice() else {
		return Err(Error::Decode {
			field: RANGES_FIELD.to_string(),
			message: format!("expected 2 rows, found {}", rows.len()),
		});
	};

	if starts.len() != ends.len() {
		return Err(Error::Decode {
			field: RANGES_FIELD.to_string(),
			message: format!("{} starts but {} ends", starts.len(), ends.len()),
		});
	}

	Ok(starts.iter().copied().zip(ends.iter().copied()).collect())
}

fn decode_texts(value: &Tensor) -> Result<Vec<String>> {
	let Tensor::ByteMatrix(rows) = value else {
		return Err(Error::OutputShapeMismatch {
			field: TEXT_FIELD.to_string(),
			expected: "byte matrix",
			found: value.kind(),
		});
	};

	rows.iter()
		.map(|row| {
			decode_utf8(row).map_err(|message| Error::Decode {
				field: TEXT_FIELD.to_string(),
				message,
			})
		})
		.collect()
}

/// Strips trailing NUL padding and decodes the remainder as UTF-8.
pub(crate) fn decode_utf8(bytes: &[u8]) -> std::result::Result<String, String> {
	let end = bytes.iter().rposition(|byte| *byte != 0).map(|idx| idx + 1).unwrap_or(0);

	String::from_utf8(bytes[..end].to_vec()).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(ranges: Vec<Vec<i64>>, text: Vec<&str>) -> BTreeMap<String, Tensor> {
		BTreeMap::from([
			(RANGES_FIELD.to_string(), Tensor::IntMatrix(ranges)),
			(
				TEXT_FIELD.to_string(),
				Tensor::ByteMatrix(text.into_iter().map(|row| row.as_bytes().to_vec()).collect()),
			),
		])
	}

	#[test]
	fn transposes_ranges_and_strips_padding() {
		let decoded =
			decode_spans(&result(vec![vec![0, 10], vec![4, 15]], vec!["UNDP\0\0", "Accra"]))
				.expect("decode failed");

		assert_eq!(decoded.ranges, vec![(0, 4), (10, 15)]);
		assert_eq!(decoded.text, vec!["UNDP".to_string(), "Accra".to_string()]);
	}

	#[test]
	fn sentinel_collapses_to_empty() {
		let decoded =
			decode_spans(&result(vec![vec![0], vec![0]], vec!["\0\0\0"])).expect("decode failed");

		assert!(decoded.is_empty());
		assert_eq!(decoded, SpanExtraction::default());
	}

	#[test]
	fn single_real_span_at_origin_is_kept() {
		let decoded =
			decode_spans(&result(vec![vec![0], vec![3]], vec!["Oslo"])).expect("decode failed");

		assert_eq!(decoded.ranges, vec![(0, 3)]);
	}

	#[test]
	fn rejects_ragged_ranges() {
		let err = decode_spans(&result(vec![vec![0, 1], vec![2]], vec!["a", "b"]))
			.expect_err("expected decode error");

		assert!(matches!(err, Error::Decode { .. }), "unexpected error: {err}");
	}

	#[test]
	fn missing_text_field_is_reported() {
		let mut value = result(vec![vec![0], vec![1]], vec!["a"]);

		value.remove(TEXT_FIELD);

		let err = decode_spans(&value).expect_err("expected missing field");

		assert!(matches!(err, Error::MissingField { field } if field == TEXT_FIELD));
	}
}
