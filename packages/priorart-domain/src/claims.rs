//! Claim text arrives as arbitrarily nested markup (claim, claim-text, nested claim-text,
//! claim-ref, emphasis). It is modeled as a tree and flattened in document order.

use roxmltree::Node;

use crate::text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimNode {
	Text(String),
	Node(Vec<ClaimNode>),
}
impl ClaimNode {
	/// Builds the tree under `node`. Comments and processing instructions are dropped.
	pub fn from_xml(node: Node<'_, '_>) -> Self {
		if node.is_text() {
			return Self::Text(node.text().unwrap_or_default().to_string());
		}

		let children = node
			.children()
			.filter(|child| child.is_element() || child.is_text())
			.map(Self::from_xml)
			.collect();

		Self::Node(children)
	}

	/// Concatenates every text leaf with single spaces and collapses repeated whitespace.
	pub fn flatten(&self) -> String {
		let mut fragments = Vec::new();

		collect_fragments(self, &mut fragments);

		text::collapse_whitespace(&fragments.join(" "))
	}
}

fn collect_fragments<'a>(node: &'a ClaimNode, acc: &mut Vec<&'a str>) {
	match node {
		ClaimNode::Text(text) => {
			let trimmed = text.trim();

			if !trimmed.is_empty() {
				acc.push(trimmed);
			}
		},
		ClaimNode::Node(children) =>
			for child in children {
				collect_fragments(child, acc);
			},
	}
}
