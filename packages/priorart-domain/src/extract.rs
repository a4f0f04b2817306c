//! USPTO grant/application XML to [`PatentRecord`].

use roxmltree::{Document, Node, ParsingOptions};

use crate::{Error, PatentRecord, Result, claims::ClaimNode, text};

const RECORD_ROOTS: [&str; 2] = ["us-patent-grant", "us-patent-application"];
const XML_DECLARATION: &str = "<?xml";

#[derive(Debug, Default)]
pub struct Extraction {
	pub records: Vec<PatentRecord>,
	/// Documents or records dropped because they could not be parsed.
	pub skipped: usize,
}

/// Extracts every patent in `content`.
///
/// Bulk files concatenate many XML documents, each with its own declaration. Each document is
/// parsed on its own so a malformed one only costs that document.
pub fn extract_records(content: &str) -> Extraction {
	let mut out = Extraction::default();

	for (doc_index, segment) in split_documents(content).into_iter().enumerate() {
		let doc = match parse_document(segment) {
			Ok(doc) => doc,
			Err(err) => {
				tracing::warn!(error = %err, doc_index, "Skipping malformed XML document.");

				out.skipped += 1;

				continue;
			},
		};

		for node in doc.descendants().filter(is_record_root) {
			match parse_record(node) {
				Ok(record) => out.records.push(record),
				Err(err) => {
					tracing::warn!(error = %err, doc_index, "Skipping unparseable patent record.");

					out.skipped += 1;
				},
			}
		}
	}

	out
}

pub fn parse_record(node: Node<'_, '_>) -> Result<PatentRecord> {
	let id = path_text(node, &["application-reference", "document-id", "doc-number"])
		.or_else(|| path_text(node, &["publication-reference", "document-id", "doc-number"]))
		.ok_or(Error::MissingId)?;
	let title = path_node(node, &["invention-title"]).map(node_text).unwrap_or_default();
	let r#abstract = path_node(node, &["abstract"]).map(node_text).unwrap_or_default();
	let claims = path_node(node, &["claims"])
		.map(|claims| ClaimNode::from_xml(claims).flatten())
		.unwrap_or_default();
	let filing_date =
		path_text(node, &["application-reference", "document-id", "date"]).unwrap_or_default();

	Ok(PatentRecord { id, title, r#abstract, claims, filing_date })
}

/// Parses one XML document. USPTO files carry a DOCTYPE, so DTDs are allowed.
pub fn parse_document(segment: &str) -> Result<Document<'_>> {
	let options = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };

	Ok(Document::parse_with_options(segment, options)?)
}

fn split_documents(content: &str) -> Vec<&str> {
	let starts: Vec<usize> = content.match_indices(XML_DECLARATION).map(|(idx, _)| idx).collect();

	if starts.len() <= 1 {
		let trimmed = content.trim();

		return if trimmed.is_empty() { Vec::new() } else { vec![trimmed] };
	}

	let mut segments = Vec::with_capacity(starts.len());

	for (i, start) in starts.iter().enumerate() {
		let end = starts.get(i + 1).copied().unwrap_or(content.len());
		let segment = content[*start..end].trim();

		if !segment.is_empty() {
			segments.push(segment);
		}
	}

	segments
}

fn is_record_root(node: &Node<'_, '_>) -> bool {
	node.is_element() && RECORD_ROOTS.contains(&node.tag_name().name())
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
	node.children().find(|child| child.is_element() && child.tag_name().name() == name)
}

/// Follows direct children first, then falls back to the first matching descendant for the head
/// segment. Grants nest the references under `us-bibliographic-data-grant`.
fn path_node<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Option<Node<'a, 'input>> {
	let (head, rest) = path.split_first()?;
	let start = child_element(node, head).or_else(|| {
		node.descendants().find(|child| child.is_element() && child.tag_name().name() == *head)
	})?;

	rest.iter().try_fold(start, |current, name| child_element(current, name))
}

fn path_text(node: Node<'_, '_>, path: &[&str]) -> Option<String> {
	let text = path_node(node, path).map(node_text)?;

	if text.is_empty() { None } else { Some(text) }
}

fn node_text(node: Node<'_, '_>) -> String {
	let fragments: Vec<&str> = node
		.descendants()
		.filter(|child| child.is_text())
		.filter_map(|child| child.text())
		.collect();

	text::collapse_whitespace(&fragments.join(" "))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_concatenated_documents() {
		let content = "<?xml version=\"1.0\"?><a/>\n<?xml version=\"1.0\"?><b/>\n";

		assert_eq!(
			split_documents(content),
			vec!["<?xml version=\"1.0\"?><a/>", "<?xml version=\"1.0\"?><b/>"]
		);
	}

	#[test]
	fn malformed_document_is_an_xml_error() {
		assert!(matches!(parse_document("<a><b></a>"), Err(Error::Xml(_))));
		assert!(parse_document("<!DOCTYPE a [ ]><a/>").is_ok());
	}

	#[test]
	fn single_document_without_declaration_is_kept() {
		assert_eq!(split_documents("  <a/> "), vec!["<a/>"]);
		assert!(split_documents(" \n").is_empty());
	}
}
