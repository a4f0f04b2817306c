use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		CollectionExistsRequest, CreateCollectionBuilder, Distance, PointStruct, Query,
		QueryPointsBuilder, ScoredPoint, UpsertPointsBuilder, Value, VectorParamsBuilder,
		value::Kind,
	},
};
use serde_json::{Map, Number, Value as JsonValue};

use crate::{
	BoxFuture, Result,
	index::{self, IndexPoint, Metric, ScoredPayload, VectorIndex},
};

/// Collection names are passed per call; one client serves every collection.
pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
}
impl QdrantStore {
	pub fn new(cfg: &priorart_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client })
	}

	async fn exists(&self, collection: &str) -> Result<bool> {
		let request = CollectionExistsRequest { collection_name: collection.to_string() };

		Ok(self.client.collection_exists(request).await?)
	}

	async fn create(&self, collection: &str, dim: u32, metric: Metric) -> Result<()> {
		let distance = match metric {
			Metric::Cosine => Distance::Cosine,
		};
		let builder = CreateCollectionBuilder::new(collection)
			.vectors_config(VectorParamsBuilder::new(u64::from(dim), distance));

		self.client.create_collection(builder).await?;

		tracing::info!(collection, dim, "Qdrant collection created.");

		Ok(())
	}

	async fn delete(&self, collection: &str) -> Result<()> {
		if !self.exists(collection).await? {
			return Ok(());
		}

		self.client.delete_collection(collection.to_string()).await?;

		tracing::info!(collection, "Qdrant collection deleted.");

		Ok(())
	}

	async fn upsert_points(&self, collection: &str, points: Vec<IndexPoint>) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}

		let points: Vec<PointStruct> = points.into_iter().map(to_point_struct).collect();
		let upsert = UpsertPointsBuilder::new(collection, points).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	async fn query(
		&self,
		collection: &str,
		vector: Vec<f32>,
		limit: u64,
	) -> Result<Vec<ScoredPayload>> {
		let search = QueryPointsBuilder::new(collection)
			.query(Query::new_nearest(vector))
			.limit(limit)
			.with_payload(true);
		let response = self.client.query(search).await?;

		Ok(response.result.into_iter().map(to_scored_payload).collect())
	}
}
impl VectorIndex for QdrantStore {
	fn collection_exists<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.exists(collection))
	}

	fn create_collection<'a>(
		&'a self,
		collection: &'a str,
		dim: u32,
		metric: Metric,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.create(collection, dim, metric))
	}

	fn delete_collection<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete(collection))
	}

	fn upsert<'a>(
		&'a self,
		collection: &'a str,
		points: Vec<IndexPoint>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_points(collection, points))
	}

	fn search<'a>(
		&'a self,
		collection: &'a str,
		vector: Vec<f32>,
		limit: u64,
	) -> BoxFuture<'a, Result<Vec<ScoredPayload>>> {
		Box::pin(self.query(collection, vector, limit))
	}
}

fn to_point_struct(point: IndexPoint) -> PointStruct {
	let mut payload_map = HashMap::with_capacity(point.payload.len());

	for (key, value) in point.payload {
		payload_map.insert(key, Value::from(value));
	}

	PointStruct::new(
		index::point_id_for(&point.key).to_string(),
		point.vector,
		Payload::from(payload_map),
	)
}

fn to_scored_payload(point: ScoredPoint) -> ScoredPayload {
	let payload: Map<String, JsonValue> =
		point.payload.into_iter().map(|(key, value)| (key, to_json(value))).collect();

	ScoredPayload { payload, score: point.score }
}

fn to_json(value: Value) -> JsonValue {
	match value.kind {
		None | Some(Kind::NullValue(_)) => JsonValue::Null,
		Some(Kind::BoolValue(flag)) => JsonValue::Bool(flag),
		Some(Kind::IntegerValue(number)) => JsonValue::from(number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(number).map(JsonValue::Number).unwrap_or(JsonValue::Null),
		Some(Kind::StringValue(text)) => JsonValue::String(text),
		Some(Kind::ListValue(list)) =>
			JsonValue::Array(list.values.into_iter().map(to_json).collect()),
		Some(Kind::StructValue(fields)) => JsonValue::Object(
			fields.fields.into_iter().map(|(key, value)| (key, to_json(value))).collect(),
		),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn converts_nested_payload_values_to_json() {
		let json = serde_json::json!({ "id": "US001", "tags": ["a", true], "x": null });
		let JsonValue::Object(map) = json.clone() else { unreachable!() };
		let point = to_point_struct(IndexPoint {
			key: "US001".to_string(),
			vector: vec![1.0, 0.0],
			payload: map,
		});
		let back: Map<String, JsonValue> =
			point.payload.into_iter().map(|(key, value)| (key, to_json(value))).collect();

		assert_eq!(JsonValue::Object(back), json);
	}
}
