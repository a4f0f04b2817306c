//! Contract for the external nearest-neighbour store.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{BoxFuture, Result};

/// Namespace for deriving stable point ids from record keys.
const POINT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b8f_31d2_4c1e_4f0a_9a57_2d0c_e1b3_a4f9);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
	Cosine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
	/// Caller-side identity; upserting the same key overwrites the previous point.
	pub key: String,
	pub vector: Vec<f32>,
	pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPayload {
	pub payload: Map<String, Value>,
	pub score: f32,
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn collection_exists<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<bool>>;

	fn create_collection<'a>(
		&'a self,
		collection: &'a str,
		dim: u32,
		metric: Metric,
	) -> BoxFuture<'a, Result<()>>;

	/// Dropping a collection that does not exist is not an error.
	fn delete_collection<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<()>>;

	fn upsert<'a>(
		&'a self,
		collection: &'a str,
		points: Vec<IndexPoint>,
	) -> BoxFuture<'a, Result<()>>;

	/// Payload-only nearest neighbours, best first.
	fn search<'a>(
		&'a self,
		collection: &'a str,
		vector: Vec<f32>,
		limit: u64,
	) -> BoxFuture<'a, Result<Vec<ScoredPayload>>>;
}

pub fn point_id_for(key: &str) -> Uuid {
	Uuid::new_v5(&POINT_ID_NAMESPACE, key.as_bytes())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn point_ids_are_stable_per_key() {
		assert_eq!(point_id_for("US001"), point_id_for("US001"));
		assert_ne!(point_id_for("US001"), point_id_for("US002"));
	}
}
