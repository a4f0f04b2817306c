use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{Error, PatentRecord, Result};

pub const REPORT_HEADER: [&str; 6] =
	["Risk Score", "Risk Level", "Title", "Abstract", "Filing Date", "Reasoning"];
pub const FAILED_REASON: &str = "Failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
	High,
	Medium,
	Low,
	Unknown,
}
impl RiskLevel {
	/// Case-insensitive; anything unrecognized is `Unknown`.
	pub fn parse_lenient(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"high" => Self::High,
			"medium" | "moderate" => Self::Medium,
			"low" => Self::Low,
			_ => Self::Unknown,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::High => "High",
			Self::Medium => "Medium",
			Self::Low => "Low",
			Self::Unknown => "Unknown",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
	pub id: String,
	pub title: String,
	pub r#abstract: String,
	pub filing_date: String,
	pub score: Option<f64>,
	pub level: RiskLevel,
	pub reason: String,
}
impl ScoredCandidate {
	pub fn scored(record: PatentRecord, score: f64, level: RiskLevel, reason: String) -> Self {
		Self {
			id: record.id,
			title: record.title,
			r#abstract: record.r#abstract,
			filing_date: record.filing_date,
			score: Some(score),
			level,
			reason,
		}
	}

	/// Terminal state for a candidate whose scorer call failed.
	pub fn failed(record: PatentRecord) -> Self {
		Self {
			id: record.id,
			title: record.title,
			r#abstract: record.r#abstract,
			filing_date: record.filing_date,
			score: None,
			level: RiskLevel::Unknown,
			reason: FAILED_REASON.to_string(),
		}
	}
}

/// One parsed report row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
	pub score: Option<f64>,
	pub level: RiskLevel,
	pub title: String,
	pub r#abstract: String,
	pub filing_date: String,
	pub reason: String,
}
impl From<&ScoredCandidate> for ReportRow {
	fn from(candidate: &ScoredCandidate) -> Self {
		Self {
			score: candidate.score,
			level: candidate.level,
			title: candidate.title.clone(),
			r#abstract: candidate.r#abstract.clone(),
			filing_date: candidate.filing_date.clone(),
			reason: candidate.reason.clone(),
		}
	}
}

/// Stable sort by score, highest first; unscored candidates go last.
pub fn sort_by_score(candidates: &mut [ScoredCandidate]) {
	candidates.sort_by(|a, b| match (a.score, b.score) {
		(Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	});
}

pub fn to_csv(candidates: &[ScoredCandidate]) -> String {
	let mut out = REPORT_HEADER.join(",");

	out.push('\n');

	for candidate in candidates {
		let score = candidate.score.map(|score| score.to_string()).unwrap_or_default();
		let fields = [
			score.as_str(),
			candidate.level.as_str(),
			candidate.title.as_str(),
			candidate.r#abstract.as_str(),
			candidate.filing_date.as_str(),
			candidate.reason.as_str(),
		];
		let quoted: Vec<String> = fields.iter().map(|field| quote(field)).collect();

		out.push_str(&quoted.join(","));
		out.push('\n');
	}

	out
}

pub fn parse_report(csv: &str) -> Result<Vec<ReportRow>> {
	let mut rows = parse_csv(csv)?.into_iter();
	let header = rows.next().ok_or(Error::Csv { line: 1, message: "missing header".to_string() })?;

	if header != REPORT_HEADER {
		return Err(Error::Csv { line: 1, message: format!("unexpected header {header:?}") });
	}

	let mut out = Vec::new();

	for (idx, fields) in rows.enumerate() {
		let line = idx + 2;
		let [score, level, title, r#abstract, filing_date, reason]: [String; 6] =
			fields.try_into().map_err(|fields: Vec<String>| Error::Csv {
				line,
				message: format!("expected 6 fields, found {}", fields.len()),
			})?;
		let score = if score.is_empty() {
			None
		} else {
			Some(score.parse::<f64>().map_err(|err| Error::Csv {
				line,
				message: format!("invalid score {score:?}: {err}"),
			})?)
		};

		out.push(ReportRow {
			score,
			level: RiskLevel::parse_lenient(&level),
			title,
			r#abstract,
			filing_date,
			reason,
		});
	}

	Ok(out)
}

/// RFC 4180 style reader: quoted fields may hold commas, doubled quotes, and newlines.
pub fn parse_csv(input: &str) -> Result<Vec<Vec<String>>> {
	let mut rows = Vec::new();
	let mut row = Vec::new();
	let mut field = String::new();
	let mut in_quotes = false;
	let mut field_started = false;
	let mut line = 1_usize;
	let mut chars = input.chars().peekable();

	while let Some(ch) = chars.next() {
		if in_quotes {
			match ch {
				'"' if chars.peek() == Some(&'"') => {
					chars.next();
					field.push('"');
				},
				'"' => in_quotes = false,
				'\n' => {
					line += 1;
					field.push(ch);
				},
				_ => field.push(ch),
			}

			continue;
		}

		match ch {
			'"' if !field_started => {
				in_quotes = true;
				field_started = true;
			},
			'"' => {
				return Err(Error::Csv { line, message: "stray quote in unquoted field".to_string() });
			},
			',' => {
				row.push(std::mem::take(&mut field));
				field_started = false;
			},
			'\r' if chars.peek() == Some(&'\n') => {},
			'\n' => {
				row.push(std::mem::take(&mut field));
				rows.push(std::mem::take(&mut row));
				field_started = false;
				line += 1;
			},
			_ => {
				field.push(ch);
				field_started = true;
			},
		}
	}

	if in_quotes {
		return Err(Error::Csv { line, message: "unterminated quoted field".to_string() });
	}
	if field_started || !row.is_empty() {
		row.push(field);
		rows.push(row);
	}

	Ok(rows)
}

fn quote(field: &str) -> String {
	format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(id: &str, score: Option<f64>) -> ScoredCandidate {
		ScoredCandidate {
			id: id.to_string(),
			title: format!("Title {id}"),
			r#abstract: String::new(),
			filing_date: String::new(),
			score,
			level: RiskLevel::Unknown,
			reason: String::new(),
		}
	}

	#[test]
	fn parses_levels_leniently() {
		assert_eq!(RiskLevel::parse_lenient(" HIGH "), RiskLevel::High);
		assert_eq!(RiskLevel::parse_lenient("medium"), RiskLevel::Medium);
		assert_eq!(RiskLevel::parse_lenient("Low"), RiskLevel::Low);
		assert_eq!(RiskLevel::parse_lenient("severe"), RiskLevel::Unknown);
	}

	#[test]
	fn sorts_scores_descending_with_nulls_last() {
		let mut items = vec![
			candidate("a", None),
			candidate("b", Some(10.0)),
			candidate("c", Some(90.0)),
			candidate("d", None),
			candidate("e", Some(10.0)),
		];

		sort_by_score(&mut items);

		let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();

		assert_eq!(ids, vec!["c", "b", "e", "a", "d"]);
	}

	#[test]
	fn writes_quoted_rows_with_doubled_quotes() {
		let mut item = candidate("a", Some(42.0));

		item.title = "Say \"hi\", world".to_string();

		let csv = to_csv(&[item]);
		let mut lines = csv.lines();

		assert_eq!(lines.next(), Some("Risk Score,Risk Level,Title,Abstract,Filing Date,Reasoning"));
		assert_eq!(lines.next(), Some("\"42\",\"Unknown\",\"Say \"\"hi\"\", world\",\"\",\"\",\"\""));
	}

	#[test]
	fn rejects_unterminated_quotes() {
		let err = parse_csv("\"abc").expect_err("expected error");

		assert!(err.to_string().contains("unterminated"));
	}

	#[test]
	fn handles_crlf_line_endings() {
		let rows = parse_csv("a,b\r\n\"c\",d\r\n").expect("parse failed");

		assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
	}
}
