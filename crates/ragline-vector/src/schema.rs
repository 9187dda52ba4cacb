use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const DOCUMENTS_TABLE: &str = "documents";
pub const META_TABLE: &str = "index_meta";

/// One row per document. `ordinal` preserves insertion order across a reload.
pub fn build_documents_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("ordinal", DataType::Int32, false),
		Field::new("id", DataType::Utf8, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("content_hash", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

// key/value facts about the saved index (model id, dim, counts)
pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}
