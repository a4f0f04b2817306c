use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// One normalized patent. `id` is the patent or publication number and keys the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatentRecord {
	pub id: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub r#abstract: String,
	#[serde(default)]
	pub claims: String,
	#[serde(default)]
	pub filing_date: String,
}
impl PatentRecord {
	/// Text fed to the embedder; callers truncate it to the embedding budget.
	pub fn embedding_text(&self) -> String {
		format!("{} {} {}", self.title, self.r#abstract, self.claims)
	}

	pub fn to_payload(&self) -> Result<Map<String, Value>> {
		match serde_json::to_value(self) {
			Ok(Value::Object(map)) => Ok(map),
			Ok(_) => Err(Error::Payload {
				message: "Record did not encode as an object.".to_string(),
			}),
			Err(err) => Err(Error::Payload { message: err.to_string() }),
		}
	}

	pub fn from_payload(payload: Map<String, Value>) -> Result<Self> {
		let record: Self = serde_json::from_value(Value::Object(payload))
			.map_err(|err| Error::Payload { message: err.to_string() })?;

		if record.id.trim().is_empty() {
			return Err(Error::Payload { message: "Payload id is empty.".to_string() });
		}

		Ok(record)
	}
}
