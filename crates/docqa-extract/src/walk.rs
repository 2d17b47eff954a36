//! Directory scanning.

use docqa_types::{DocumentPage, ExtractionSettings};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::clean::clean_text;
use crate::error::ExtractError;
use crate::registry::ExtractorRegistry;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub recursive: bool,
    pub clean_text: bool,
}

impl From<&ExtractionSettings> for ExtractOptions {
    fn from(settings: &ExtractionSettings) -> Self {
        Self {
            recursive: settings.recursive,
            clean_text: settings.clean_text,
        }
    }
}

/// Outcome of scanning a documents directory.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub pages: Vec<DocumentPage>,
    pub files_processed: usize,
    pub skipped_unsupported: Vec<PathBuf>,
    /// Files that failed to parse, with the error message
    pub failed: Vec<(PathBuf, String)>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Extract every supported file under `dir`.
///
/// Files are visited in file-name order so repeated runs assign chunk ids
/// the same way. A file that fails to parse is logged and recorded in the
/// report; it does not abort the scan.
pub fn extract_directory(
    dir: &Path,
    registry: &ExtractorRegistry,
    options: ExtractOptions,
) -> Result<ExtractionReport, ExtractError> {
    if !dir.is_dir() {
        return Err(ExtractError::DirectoryNotFound(dir.to_path_buf()));
    }

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut report = ExtractionReport::default();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !registry.is_supported(path) {
            debug!(path = %path.display(), "Skipping unsupported file");
            report.skipped_unsupported.push(path.to_path_buf());
            continue;
        }

        match extract_file(path, registry, options) {
            Ok(pages) => {
                debug!(path = %path.display(), pages = pages.len(), "Extracted file");
                report.files_processed += 1;
                report.pages.extend(pages);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to extract file, skipping");
                report.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    info!(
        dir = %dir.display(),
        files = report.files_processed,
        pages = report.pages.len(),
        skipped = report.skipped_unsupported.len(),
        failed = report.failed.len(),
        "Extracted documents directory"
    );
    Ok(report)
}

/// Extract one file, applying text cleaning when enabled. Pages that are
/// empty after cleaning are dropped.
pub fn extract_file(
    path: &Path,
    registry: &ExtractorRegistry,
    options: ExtractOptions,
) -> Result<Vec<DocumentPage>, ExtractError> {
    let pages = registry.extract(path)?;
    if !options.clean_text {
        return Ok(pages);
    }
    Ok(pages
        .into_iter()
        .filter_map(|mut page| {
            page.text = clean_text(&page.text);
            (!page.text.is_empty()).then_some(page)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::tests::write_docx;
    use crate::pdf::tests::write_pdf;
    use tempfile::TempDir;

    fn options() -> ExtractOptions {
        ExtractOptions {
            recursive: false,
            clean_text: false,
        }
    }

    #[test]
    fn test_missing_directory_is_error() {
        let result = extract_directory(
            Path::new("/nonexistent/docqa/docs"),
            &ExtractorRegistry::with_defaults(),
            options(),
        );
        assert!(matches!(result, Err(ExtractError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_mixed_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Alpha text").unwrap();
        write_pdf(&dir.path().join("b.pdf"), &["Bravo page one", "Bravo page two"]);
        write_docx(&dir.path().join("c.docx"), &["Charlie paragraph"]);
        std::fs::write(dir.path().join("d.csv"), "x,y").unwrap();
        std::fs::write(dir.path().join("e.pdf"), "garbage").unwrap();
        std::fs::write(dir.path().join(".hidden.txt"), "secret").unwrap();

        let report =
            extract_directory(dir.path(), &ExtractorRegistry::with_defaults(), options()).unwrap();

        assert_eq!(report.files_processed, 3);
        assert_eq!(report.skipped_unsupported.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("e.pdf"));

        let names: Vec<(&str, u32)> = report
            .pages
            .iter()
            .map(|p| (p.file_name.as_str(), p.page_number))
            .collect();
        assert_eq!(
            names,
            vec![("a.txt", 1), ("b.pdf", 1), ("b.pdf", 2), ("c.docx", 1)]
        );
    }

    #[test]
    fn test_recursive_option() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("top.txt"), "top").unwrap();
        std::fs::write(dir.path().join("nested/inner.txt"), "inner").unwrap();
        let registry = ExtractorRegistry::with_defaults();

        let flat = extract_directory(dir.path(), &registry, options()).unwrap();
        assert_eq!(flat.files_processed, 1);

        let deep = extract_directory(
            dir.path(),
            &registry,
            ExtractOptions {
                recursive: true,
                ..options()
            },
        )
        .unwrap();
        assert_eq!(deep.files_processed, 2);
    }

    #[test]
    fn test_extract_file_cleans_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noisy.txt");
        std::fs::write(&path, "Total:   $5\n\n***").unwrap();

        let pages = extract_file(
            &path,
            &ExtractorRegistry::with_defaults(),
            ExtractOptions {
                recursive: false,
                clean_text: true,
            },
        )
        .unwrap();
        assert_eq!(pages[0].text, "Total: 5");
    }
}
