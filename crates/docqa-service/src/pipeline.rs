//! Blocking ingestion: documents directory to page chunks to index.

use std::io::Write;
use std::path::{Path, PathBuf};

use docqa_extract::{
    chunk_pages, extract_directory, extract_file, ExtractOptions, ExtractorRegistry,
    RecursiveSplitter,
};
use docqa_indexing::{DocumentIndex, LoggingProgressCallback};
use docqa_types::Settings;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ServiceError;

/// Outcome of a full directory sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub files: usize,
    pub pages: usize,
    pub chunks: usize,
    /// Files with an unsupported extension
    pub skipped: usize,
    /// Files that failed to parse
    pub failed: usize,
}

/// Outcome of ingesting one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub file_name: String,
    pub pages: usize,
    pub chunks: usize,
}

/// Reject anything but a plain file name: no separators, no parent
/// references, no hidden files.
pub fn validate_file_name(name: &str) -> Result<(), ServiceError> {
    let invalid = name.trim().is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
        || name.contains('\0');
    if invalid {
        return Err(ServiceError::InvalidInput(format!(
            "invalid file name: {name:?}"
        )));
    }
    Ok(())
}

pub struct DocumentPipeline {
    documents_dir: PathBuf,
    registry: ExtractorRegistry,
    splitter: RecursiveSplitter,
    options: ExtractOptions,
}

impl DocumentPipeline {
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Ok(Self {
            documents_dir: settings.expanded_documents_dir(),
            registry: ExtractorRegistry::with_defaults(),
            splitter: RecursiveSplitter::from_settings(&settings.chunking)?,
            options: ExtractOptions::from(&settings.extraction),
        })
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Path of a stored document, after validating its name.
    pub fn document_path(&self, file_name: &str) -> Result<PathBuf, ServiceError> {
        validate_file_name(file_name)?;
        Ok(self.documents_dir.join(file_name))
    }

    /// Re-extract the whole documents directory and rebuild the index.
    /// A missing directory is created and yields an empty index.
    pub fn sync(&self, index: &DocumentIndex) -> Result<SyncReport, ServiceError> {
        std::fs::create_dir_all(&self.documents_dir)?;
        let extraction = extract_directory(&self.documents_dir, &self.registry, self.options)?;
        let chunks = chunk_pages(&extraction.pages, &self.splitter);
        let stats = index.rebuild(&chunks, &LoggingProgressCallback::new(10))?;

        let report = SyncReport {
            files: extraction.files_processed,
            pages: extraction.pages.len(),
            chunks: stats.chunks,
            skipped: extraction.skipped_unsupported.len(),
            failed: extraction.failed.len(),
        };
        info!(
            files = report.files,
            pages = report.pages,
            chunks = report.chunks,
            skipped = report.skipped,
            failed = report.failed,
            "Documents synced"
        );
        Ok(report)
    }

    /// Store `bytes` as `file_name` in the documents directory and index
    /// it, replacing any chunks a previous file of that name left behind.
    ///
    /// The upload is staged under a hidden name and only moved over the
    /// stored file once it extracts, so a corrupt upload leaves the previous
    /// version and its chunks untouched.
    pub fn ingest(
        &self,
        index: &DocumentIndex,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, ServiceError> {
        let path = self.document_path(file_name)?;
        if !self.registry.is_supported(&path) {
            return Err(ServiceError::UnsupportedType(file_name.to_string()));
        }

        std::fs::create_dir_all(&self.documents_dir)?;
        let suffix = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut staged = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(&suffix)
            .tempfile_in(&self.documents_dir)?;
        staged.write_all(bytes)?;
        staged.flush()?;

        let mut pages = extract_file(staged.path(), &self.registry, self.options)?;
        for page in &mut pages {
            page.file_name = file_name.to_string();
            page.path = path.clone();
        }
        let chunks = chunk_pages(&pages, &self.splitter);

        staged.persist(&path).map_err(|e| ServiceError::Io(e.error))?;
        index.replace_file(file_name, &chunks, &LoggingProgressCallback::new(10))?;

        info!(file = file_name, pages = pages.len(), chunks = chunks.len(), "Ingested upload");
        Ok(IngestReport {
            file_name: file_name.to_string(),
            pages: pages.len(),
            chunks: chunks.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_embeddings::{EmbeddingModel, HashEmbedder};
    use docqa_indexing::IndexingConfig;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> (DocumentPipeline, DocumentIndex) {
        let mut settings = Settings::default();
        settings.documents_dir = temp.path().join("docs").to_string_lossy().to_string();
        settings.data_dir = temp.path().join("data").to_string_lossy().to_string();
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashEmbedder::new(64).unwrap());
        let index =
            DocumentIndex::open(IndexingConfig::from_settings(&settings), embedder).unwrap();
        (DocumentPipeline::from_settings(&settings).unwrap(), index)
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("report.pdf").is_ok());
        assert!(validate_file_name("notes v2.txt").is_ok());
        for bad in ["", "  ", "../etc/passwd", "a/b.txt", "a\\b.txt", ".env", "x..txt"] {
            assert!(
                matches!(validate_file_name(bad), Err(ServiceError::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_sync_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let (pipeline, index) = setup(&temp);

        let report = pipeline.sync(&index).unwrap();
        assert_eq!(report, SyncReport::default());
        assert!(pipeline.documents_dir().is_dir());
        assert!(!index.needs_rebuild().unwrap());
    }

    #[test]
    fn test_sync_counts_skipped_files() {
        let temp = TempDir::new().unwrap();
        let (pipeline, index) = setup(&temp);
        std::fs::create_dir_all(pipeline.documents_dir()).unwrap();
        std::fs::write(pipeline.documents_dir().join("a.txt"), "Alpha text.").unwrap();
        std::fs::write(pipeline.documents_dir().join("b.md"), "Beta text.").unwrap();
        std::fs::write(pipeline.documents_dir().join("c.bin"), [0u8, 1, 2]).unwrap();

        let report = pipeline.sync(&index).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.pages, 2);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_ingest_writes_and_indexes() {
        let temp = TempDir::new().unwrap();
        let (pipeline, index) = setup(&temp);

        let report = pipeline
            .ingest(&index, "faq.txt", b"Support is open on weekdays.")
            .unwrap();
        assert_eq!(report.chunks, 1);
        assert!(pipeline.documents_dir().join("faq.txt").is_file());

        // Re-uploading replaces rather than duplicates
        pipeline
            .ingest(&index, "faq.txt", b"Support is open every day.")
            .unwrap();
        let docs = index.documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].chunks, 1);
    }

    fn docx(text: &str) -> Vec<u8> {
        use std::io::Write;
        let xml = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:body></w:document>"#
        );
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_corrupt_reupload_keeps_previous_version() {
        let temp = TempDir::new().unwrap();
        let (pipeline, index) = setup(&temp);
        let stored = pipeline.documents_dir().join("policy.docx");
        let original = docx("The canteen closes at three.");

        pipeline.ingest(&index, "policy.docx", &original).unwrap();

        let err = pipeline
            .ingest(&index, "policy.docx", b"not a zip archive")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Extract(_)), "{err:?}");
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        assert_eq!(std::fs::read(&stored).unwrap(), original);
        let docs = index.documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_name, "policy.docx");
        assert_eq!(docs[0].chunks, 1);

        // Nothing staged is left behind
        let names: Vec<String> = std::fs::read_dir(pipeline.documents_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["policy.docx".to_string()]);
    }

    #[test]
    fn test_ingest_rejects_unsupported_and_traversal() {
        let temp = TempDir::new().unwrap();
        let (pipeline, index) = setup(&temp);

        assert!(matches!(
            pipeline.ingest(&index, "tool.exe", b"MZ"),
            Err(ServiceError::UnsupportedType(_))
        ));
        assert!(matches!(
            pipeline.ingest(&index, "../escape.txt", b"x"),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(!temp.path().join("escape.txt").exists());
    }
}
