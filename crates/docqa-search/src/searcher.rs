//! BM25 keyword search over chunks.

use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{IndexReader, TantivyDocument};
use tracing::debug;

use crate::error::SearchError;
use crate::index::SearchIndex;
use crate::schema::ChunkSchema;

/// A keyword hit with its BM25 score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordHit {
    pub chunk_id: u64,
    pub file_name: String,
    pub page_number: u32,
    pub score: f32,
}

pub struct ChunkSearcher {
    reader: IndexReader,
    schema: ChunkSchema,
    query_parser: QueryParser,
}

impl ChunkSearcher {
    pub fn new(index: &SearchIndex) -> Result<Self, SearchError> {
        let reader = index.reader()?;
        let schema = index.schema().clone();
        let query_parser = QueryParser::for_index(index.index(), vec![schema.text]);

        Ok(Self {
            reader,
            schema,
            query_parser,
        })
    }

    /// Reload the reader to see recent commits.
    pub fn reload(&self) -> Result<(), SearchError> {
        self.reader.reload()?;
        debug!("Reloaded search reader");
        Ok(())
    }

    /// Top `limit` chunks for a free-text query, best first.
    ///
    /// Parsing is lenient: stray query syntax in user questions (`?`, `:`,
    /// unbalanced quotes) is ignored rather than reported.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<KeywordHit>, SearchError> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let (query, errors) = self.query_parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            debug!(query = query_str, errors = errors.len(), "Lenient query parse");
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let text_of = |field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };

            let Ok(chunk_id) = text_of(self.schema.chunk_id).parse::<u64>() else {
                continue;
            };
            hits.push(KeywordHit {
                chunk_id,
                file_name: text_of(self.schema.file_name),
                page_number: text_of(self.schema.page_number).parse().unwrap_or(1),
                score,
            });
        }

        debug!(query = query_str, results = hits.len(), "Keyword search complete");
        Ok(hits)
    }

    /// Number of committed, visible documents.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}
