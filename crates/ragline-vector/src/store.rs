//! LanceDB persistence for a built index.
//!
//! A saved index is a LanceDB database under `<storage>/lancedb` holding the
//! `documents` table and a small key/value `index_meta` table. Saving writes a
//! fresh database beside the current one and swaps it in once complete.
use anyhow::{anyhow, Context, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::ArrowError;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragline_core::{Document, Metadata};

use crate::schema::{build_documents_schema, build_meta_schema, DOCUMENTS_TABLE, META_TABLE};

pub const DB_DIR: &str = "lancedb";
const STAGING_DIR: &str = "lancedb.staging";
const PREVIOUS_DIR: &str = "lancedb.previous";
const MAX_META_ROWS: usize = 64;

/// Facts recorded next to the documents of a saved index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMeta {
	pub model_id: String,
	pub dim: usize,
	pub doc_count: usize,
	pub saved_at: Option<String>,
}

pub fn content_hash(text: &str) -> String { blake3::hash(text.as_bytes()).to_hex().to_string() }

pub struct LanceStore { root: PathBuf }

impl LanceStore {
	pub fn new(root: &Path) -> Self { Self { root: root.to_path_buf() } }

	pub fn db_path(&self) -> PathBuf { self.root.join(DB_DIR) }

	pub fn exists(&self) -> bool { self.db_path().is_dir() || self.root.join(PREVIOUS_DIR).is_dir() }

	/// Replaces whatever index was saved under the root.
	pub fn write(&self, documents: &[Document], meta: &IndexMeta) -> Result<()> {
		fs::create_dir_all(&self.root).with_context(|| format!("Failed to create {}", self.root.display()))?;
		let staging = self.root.join(STAGING_DIR);
		if staging.exists() { fs::remove_dir_all(&staging)?; }

		let rt = tokio::runtime::Runtime::new()?;
		rt.block_on(async {
			let conn = connect(&staging.to_string_lossy()).execute().await?;
			write_documents(&conn, documents, meta.dim).await?;
			write_meta(&conn, meta).await
		})?;

		// the old database is only deleted once the new one is in place
		let target = self.db_path();
		let previous = self.root.join(PREVIOUS_DIR);
		if previous.exists() { fs::remove_dir_all(&previous)?; }
		if target.exists() { fs::rename(&target, &previous)?; }
		if let Err(e) = fs::rename(&staging, &target) {
			if previous.exists() { fs::rename(&previous, &target)?; }
			return Err(e).with_context(|| format!("Failed to move new index into {}", target.display()));
		}
		if previous.exists() { fs::remove_dir_all(&previous)?; }
		tracing::info!(path = %target.display(), docs = documents.len(), "index written");
		Ok(())
	}

	/// Puts back a database left aside by a write that never completed.
	fn recover_previous(&self) -> Result<()> {
		let (target, previous) = (self.db_path(), self.root.join(PREVIOUS_DIR));
		if !target.exists() && previous.is_dir() {
			tracing::warn!(path = %previous.display(), "restoring index from an interrupted save");
			fs::rename(&previous, &target)?;
		}
		Ok(())
	}

	/// Meta facts only, without loading documents.
	pub fn meta(&self) -> Result<IndexMeta> {
		self.recover_previous()?;
		let path = self.db_path();
		if !path.is_dir() { return Err(anyhow!("no saved index at {}", path.display())); }
		let rt = tokio::runtime::Runtime::new()?;
		rt.block_on(async {
			let conn = connect(&path.to_string_lossy()).execute().await?;
			read_meta(&conn).await
		})
	}

	/// Documents in their saved order, plus the saved meta facts.
	pub fn read(&self) -> Result<(Vec<Document>, IndexMeta)> {
		self.recover_previous()?;
		let path = self.db_path();
		if !path.is_dir() { return Err(anyhow!("no saved index at {}", path.display())); }
		let rt = tokio::runtime::Runtime::new()?;
		rt.block_on(async {
			let conn = connect(&path.to_string_lossy()).execute().await?;
			let meta = read_meta(&conn).await?;
			let documents = read_documents(&conn, &meta).await?;
			Ok((documents, meta))
		})
	}
}

async fn write_documents(conn: &Connection, documents: &[Document], dim: usize) -> Result<()> {
	let schema = build_documents_schema(i32::try_from(dim)?);
	let batches: Vec<Result<RecordBatch, ArrowError>> = if documents.is_empty() {
		vec![]
	} else {
		vec![Ok(documents_to_record_batch(documents, dim, schema.clone())?)]
	};
	let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
	conn.create_table(DOCUMENTS_TABLE, reader).execute().await?;
	Ok(())
}

fn documents_to_record_batch(documents: &[Document], dim: usize, schema: Arc<arrow_schema::Schema>) -> Result<RecordBatch> {
	let mut ordinals = Vec::new(); let mut ids = Vec::new(); let mut texts = Vec::new(); let mut hashes = Vec::new(); let mut metadata = Vec::new();
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
	for (ordinal, doc) in documents.iter().enumerate() {
		let id = doc.id().ok_or_else(|| anyhow!("document at position {ordinal} has no id"))?;
		let embedding = doc.embedding().ok_or_else(|| anyhow!("document {id} has no embedding"))?;
		anyhow::ensure!(embedding.len() == dim, "document {id} has {} dims, expected {dim}", embedding.len());
		ordinals.push(i32::try_from(ordinal)?);
		ids.push(id.to_string());
		texts.push(doc.text().to_string());
		hashes.push(content_hash(doc.text()));
		metadata.push(serde_json::to_string(doc.metadata())?);
		vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
	}
	let record_batch = RecordBatch::try_new(schema, vec![
		Arc::new(Int32Array::from(ordinals)),
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(texts)),
		Arc::new(StringArray::from(hashes)),
		Arc::new(StringArray::from(metadata)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), i32::try_from(dim)?)),
	])?;
	Ok(record_batch)
}

async fn write_meta(conn: &Connection, meta: &IndexMeta) -> Result<()> {
	let saved_at = meta.saved_at.clone().unwrap_or_else(|| Utc::now().to_rfc3339());
	let rows = [
		("model_id", meta.model_id.clone()),
		("dim", meta.dim.to_string()),
		("doc_count", meta.doc_count.to_string()),
		("saved_at", saved_at),
	];
	let now = Utc::now().timestamp_millis();
	let rb = RecordBatch::try_new(
		build_meta_schema(),
		vec![
			Arc::new(StringArray::from(rows.iter().map(|(k, _)| k.to_string()).collect::<Vec<_>>())),
			Arc::new(StringArray::from(rows.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>())),
			Arc::new(TimestampMillisecondArray::from(vec![now; rows.len()])),
		],
	)?;
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
	conn.create_table(META_TABLE, reader).execute().await?;
	Ok(())
}

async fn read_meta(conn: &Connection) -> Result<IndexMeta> {
	let names = conn.table_names().execute().await?;
	if !names.contains(&META_TABLE.to_string()) { return Err(anyhow!("saved index has no {META_TABLE} table")); }
	let t = conn.open_table(META_TABLE).execute().await?;
	let mut stream = t.query().limit(MAX_META_ROWS).execute().await?;
	let (mut model_id, mut dim, mut doc_count, mut saved_at) = (None, None, None, None);
	while let Some(batch) = stream.try_next().await? {
		let keys = string_column(&batch, "key")?;
		let values = string_column(&batch, "value")?;
		for i in 0..batch.num_rows() {
			let value = values.value(i).to_string();
			match keys.value(i) {
				"model_id" => model_id = Some(value),
				"dim" => dim = Some(value.parse::<usize>().context("meta.dim is not a number")?),
				"doc_count" => doc_count = Some(value.parse::<usize>().context("meta.doc_count is not a number")?),
				"saved_at" => saved_at = Some(value),
				other => tracing::debug!(key = other, "ignoring unknown meta key"),
			}
		}
	}
	Ok(IndexMeta {
		model_id: model_id.ok_or_else(|| anyhow!("meta.model_id missing"))?,
		dim: dim.ok_or_else(|| anyhow!("meta.dim missing"))?,
		doc_count: doc_count.ok_or_else(|| anyhow!("meta.doc_count missing"))?,
		saved_at,
	})
}

async fn read_documents(conn: &Connection, meta: &IndexMeta) -> Result<Vec<Document>> {
	let t = conn.open_table(DOCUMENTS_TABLE).execute().await?;
	if meta.doc_count == 0 { return Ok(vec![]); }
	let mut stream = t.query().limit(meta.doc_count).execute().await?;
	let mut rows: Vec<(i32, Document)> = Vec::with_capacity(meta.doc_count);
	while let Some(batch) = stream.try_next().await? {
		let ordinals = batch
			.column_by_name("ordinal")
			.and_then(|c| c.as_any().downcast_ref::<Int32Array>())
			.ok_or_else(|| anyhow!("documents.ordinal column missing"))?;
		let ids = string_column(&batch, "id")?;
		let texts = string_column(&batch, "text")?;
		let hashes = string_column(&batch, "content_hash")?;
		let metadata = string_column(&batch, "metadata")?;
		let vec_col = batch
			.column_by_name("vector")
			.and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
			.ok_or_else(|| anyhow!("documents.vector column missing"))?;
		for i in 0..batch.num_rows() {
			let id = ids.value(i);
			let text = texts.value(i);
			if content_hash(text) != hashes.value(i) {
				return Err(anyhow!("content hash mismatch for document {id}"));
			}
			if vec_col.is_null(i) { return Err(anyhow!("document {id} has no stored vector")); }
			let vector = vec_col.value(i).as_primitive::<Float32Type>().values().iter().copied().collect::<Vec<f32>>();
			let meta_map: Metadata = serde_json::from_str(metadata.value(i))?;
			let doc = Document::new(text).with_id(id).with_embedding(vector).with_metadata(meta_map);
			rows.push((ordinals.value(i), doc));
		}
	}
	if rows.len() != meta.doc_count {
		return Err(anyhow!("expected {} documents, found {}", meta.doc_count, rows.len()));
	}
	rows.sort_by_key(|(ordinal, _)| *ordinal);
	Ok(rows.into_iter().map(|(_, doc)| doc).collect())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("{name} column missing"))
}
