use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use ragline_core::text::STOP_WORDS;

pub const TOKENIZER_NAME: &str = "text_with_stopwords";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("id", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}
