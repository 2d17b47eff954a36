//! Tantivy schema for chunk search.
//!
//! One Tantivy document per chunk. Only `text` is tokenized; the other
//! fields are stored so a hit can be reported without a chunk store lookup.

use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};

use crate::SearchError;

/// Schema field handles
#[derive(Debug, Clone)]
pub struct ChunkSchema {
    schema: Schema,
    /// Vector id of the chunk, decimal (STRING | STORED)
    pub chunk_id: Field,
    /// Source file name (STRING | STORED)
    pub file_name: Field,
    /// 1-based page number, decimal (STRING | STORED)
    pub page_number: Field,
    /// Chunk text (TEXT | STORED)
    pub text: Field,
}

impl ChunkSchema {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Recover field handles from an index opened from disk.
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {name} field")))
        };
        let chunk_id = field("chunk_id")?;
        let file_name = field("file_name")?;
        let page_number = field("page_number")?;
        let text = field("text")?;

        Ok(Self {
            schema,
            chunk_id,
            file_name,
            page_number,
            text,
        })
    }
}

pub fn build_chunk_schema() -> ChunkSchema {
    let mut builder = Schema::builder();

    // Primary key, used to replace or delete a chunk
    let chunk_id = builder.add_text_field("chunk_id", STRING | STORED);
    let file_name = builder.add_text_field("file_name", STRING | STORED);
    let page_number = builder.add_text_field("page_number", STRING | STORED);
    let text = builder.add_text_field("text", TEXT | STORED);

    ChunkSchema {
        schema: builder.build(),
        chunk_id,
        file_name,
        page_number,
        text,
    }
}
