//! Document Loader: stages an upload in a scoped temp file, extracts page
//! text, and splits it into chunks.
//!
//! The temp file lives only for the duration of the extraction task and is
//! removed on success, on error, and if the extractor panics.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};
use uuid::Uuid;

use crate::document::splitter::{Chunk, PageText, TextSplitter};
use crate::pipeline::error::PipelineError;

/// An uploaded document. Read once by the loader, then dropped.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub file_name: String,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Raw page text pulled from a file.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPages {
    pub pages: Vec<String>,
    /// Page count reported by the file itself; may exceed `pages.len()` when
    /// the extractor cannot separate pages.
    pub page_count: usize,
}

impl ExtractedPages {
    fn into_page_texts(self) -> Vec<PageText> {
        let paged = self.pages.len() == self.page_count;
        let total_pages = self.page_count.max(self.pages.len());
        self.pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page: paged.then_some(i),
                total_pages,
                text,
            })
            .collect()
    }
}

/// Pulls per-page text out of a file on disk. Implementations must finish
/// reading before returning and must not keep the path.
pub trait PageExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, path: &Path) -> Result<ExtractedPages, PipelineError>;
}

/// PDF extractor backed by `pdf-extract`, one text per page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfPageExtractor;

impl PageExtractor for PdfPageExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extract(&self, path: &Path) -> Result<ExtractedPages, PipelineError> {
        let mut header = [0u8; 4];
        let is_pdf = File::open(path)
            .and_then(|mut file| file.read_exact(&mut header))
            .is_ok()
            && &header == b"%PDF";
        if !is_pdf {
            return Err(PipelineError::UnreadableDocument(
                "File is not a PDF (missing %PDF header)".to_string(),
            ));
        }

        let pages = pdf_extract::extract_text_by_pages(path)
            .map_err(|e| PipelineError::UnreadableDocument(format!("PDF extraction failed: {e}")))?;

        Ok(ExtractedPages {
            page_count: pages.len(),
            pages,
        })
    }
}

pub struct DocumentLoader {
    extractor: Arc<dyn PageExtractor>,
    splitter: TextSplitter,
}

impl DocumentLoader {
    pub fn new(extractor: Arc<dyn PageExtractor>, splitter: TextSplitter) -> Self {
        Self {
            extractor,
            splitter,
        }
    }

    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    /// Extracts and splits `document` into an ordered, non-empty chunk list.
    pub async fn load_and_split(&self, document: &Document) -> Result<Vec<Chunk>, PipelineError> {
        if document.bytes.is_empty() {
            return Err(PipelineError::UnreadableDocument(format!(
                "'{}' is empty",
                document.file_name
            )));
        }

        let extractor = Arc::clone(&self.extractor);
        let bytes = document.bytes.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extract_via_temp_file(extractor.as_ref(), &bytes))
                .await
                .map_err(|e| {
                    PipelineError::UnreadableDocument(format!("Extraction task failed: {e}"))
                })??;

        if extracted.pages.iter().all(|p| p.trim().is_empty()) {
            return Err(PipelineError::UnreadableDocument(format!(
                "'{}' contains no extractable text",
                document.file_name
            )));
        }

        let page_count = extracted.page_count;
        let chunks = self.splitter.split_pages(&extracted.into_page_texts())?;
        if chunks.is_empty() {
            return Err(PipelineError::UnreadableDocument(format!(
                "'{}' produced no chunks",
                document.file_name
            )));
        }

        info!(
            "Loaded '{}' ({}): {} pages, {} chunks",
            document.file_name,
            document.id,
            page_count,
            chunks.len()
        );
        Ok(chunks)
    }
}

/// Stages `bytes` in a named temp file and runs the extractor against it.
/// The `NamedTempFile` guard deletes the file when it drops.
fn extract_via_temp_file(
    extractor: &dyn PageExtractor,
    bytes: &[u8],
) -> Result<ExtractedPages, PipelineError> {
    let mut staged = tempfile::Builder::new()
        .prefix("coverme-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| PipelineError::UnreadableDocument(format!("Failed to stage upload: {e}")))?;

    staged
        .write_all(bytes)
        .and_then(|_| staged.flush())
        .map_err(|e| PipelineError::UnreadableDocument(format!("Failed to stage upload: {e}")))?;

    debug!(
        "Staged upload at {} for {} extraction",
        staged.path().display(),
        extractor.name()
    );
    extractor.extract(staged.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::document::splitter::ChunkPolicy;
    use crate::document::tokenizer::WordCounter;

    enum Behaviour {
        Pages(Vec<&'static str>),
        Fail,
        Panic,
    }

    /// Records the staged path and whether it existed while extracting.
    struct RecordingExtractor {
        behaviour: Behaviour,
        seen: Mutex<Option<(PathBuf, bool)>>,
    }

    impl RecordingExtractor {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                seen: Mutex::new(None),
            })
        }

        fn seen(&self) -> (PathBuf, bool) {
            self.seen.lock().unwrap().clone().expect("extractor was not called")
        }
    }

    impl PageExtractor for RecordingExtractor {
        fn name(&self) -> &str {
            "recording"
        }

        fn extract(&self, path: &Path) -> Result<ExtractedPages, PipelineError> {
            *self.seen.lock().unwrap() = Some((path.to_path_buf(), path.exists()));
            match &self.behaviour {
                Behaviour::Pages(pages) => Ok(ExtractedPages {
                    pages: pages.iter().map(|p| p.to_string()).collect(),
                    page_count: pages.len(),
                }),
                Behaviour::Fail => Err(PipelineError::UnreadableDocument("corrupt".to_string())),
                Behaviour::Panic => panic!("extractor blew up"),
            }
        }
    }

    fn loader(extractor: Arc<dyn PageExtractor>) -> DocumentLoader {
        let splitter = TextSplitter::new(ChunkPolicy::default(), Arc::new(WordCounter)).unwrap();
        DocumentLoader::new(extractor, splitter)
    }

    fn resume() -> Document {
        Document::new("resume.pdf", Bytes::from_static(b"%PDF-1.4 stub"))
    }

    #[tokio::test]
    async fn test_load_and_split_returns_chunks_and_removes_temp_file() {
        let extractor = RecordingExtractor::new(Behaviour::Pages(vec![
            "Jane Doe\n\nBackend engineer, Python, 5 years.",
        ]));
        let chunks = loader(extractor.clone()).load_and_split(&resume()).await.unwrap();

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Python"));
        assert_eq!(chunks[0].page, Some(0));

        let (path, existed_during_call) = extractor.seen();
        assert!(existed_during_call);
        assert!(!path.exists(), "temp file {} outlived the call", path.display());
    }

    #[tokio::test]
    async fn test_failed_extraction_still_removes_temp_file() {
        let extractor = RecordingExtractor::new(Behaviour::Fail);
        let result = loader(extractor.clone()).load_and_split(&resume()).await;

        assert!(matches!(result, Err(PipelineError::UnreadableDocument(_))));
        let (path, _) = extractor.seen();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_panicking_extractor_is_unreadable_and_cleans_up() {
        let extractor = RecordingExtractor::new(Behaviour::Panic);
        let result = loader(extractor.clone()).load_and_split(&resume()).await;

        assert!(matches!(result, Err(PipelineError::UnreadableDocument(_))));
        let (path, _) = extractor.seen();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_document_without_text_is_unreadable() {
        let extractor = RecordingExtractor::new(Behaviour::Pages(vec!["  ", "\n\n"]));
        let result = loader(extractor).load_and_split(&resume()).await;
        assert!(matches!(result, Err(PipelineError::UnreadableDocument(_))));
    }

    #[tokio::test]
    async fn test_empty_upload_is_unreadable_without_staging() {
        let extractor = RecordingExtractor::new(Behaviour::Pages(vec!["text"]));
        let document = Document::new("empty.pdf", Bytes::new());
        let result = loader(extractor.clone()).load_and_split(&document).await;

        assert!(matches!(result, Err(PipelineError::UnreadableDocument(_))));
        assert!(extractor.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pdf_extractor_rejects_non_pdf_bytes() {
        let document = Document::new("notes.pdf", Bytes::from_static(b"plain text, not a pdf"));
        let result = loader(Arc::new(PdfPageExtractor)).load_and_split(&document).await;
        assert!(matches!(result, Err(PipelineError::UnreadableDocument(_))));
    }

    #[tokio::test]
    async fn test_pdf_extractor_rejects_truncated_pdf() {
        let document = Document::new("broken.pdf", Bytes::from_static(b"%PDF-1.7\n%%EOF"));
        let result = loader(Arc::new(PdfPageExtractor)).load_and_split(&document).await;
        assert!(matches!(result, Err(PipelineError::UnreadableDocument(_))));
    }

    /// Builds a PDF with one line of Helvetica text per page.
    fn pdf_with_pages(lines: &[&str]) -> Bytes {
        use pdf_extract::content::{Content, Operation};
        use pdf_extract::{Dictionary, Document as PdfDocument, Object, Stream};

        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut font = Dictionary::new();
        font.set("Type", "Font");
        font.set("Subtype", "Type1");
        font.set("BaseFont", "Helvetica");
        let font_id = doc.add_object(font);

        let mut fonts = Dictionary::new();
        fonts.set("F1", font_id);
        let mut resources = Dictionary::new();
        resources.set("Font", fonts);
        let resources_id = doc.add_object(resources);

        let mut kids = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), Object::Integer(24)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let stream = Stream::new(Dictionary::new(), content.encode().unwrap());
            let content_id = doc.add_object(stream);

            let mut page = Dictionary::new();
            page.set("Type", "Page");
            page.set("Parent", pages_id);
            page.set("Contents", content_id);
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", "Pages");
        pages.set("Count", Object::Integer(kids.len() as i64));
        pages.set("Kids", kids);
        pages.set("Resources", resources_id);
        pages.set(
            "MediaBox",
            vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", "Catalog");
        catalog.set("Pages", pages_id);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        Bytes::from(buffer)
    }

    #[test]
    fn test_pdf_extractor_returns_one_text_per_page() {
        let bytes = pdf_with_pages(&["Alpha page one", "Beta page two"]);
        let extracted = extract_via_temp_file(&PdfPageExtractor, &bytes).unwrap();

        assert_eq!(extracted.page_count, 2);
        assert_eq!(extracted.pages.len(), 2);
        assert!(extracted.pages[0].contains("Alpha page one"));
        assert!(!extracted.pages[0].contains("Beta"));
        assert!(extracted.pages[1].contains("Beta page two"));
    }

    #[tokio::test]
    async fn test_multi_page_pdf_chunks_carry_page_numbers() {
        let document = Document::new(
            "resume.pdf",
            pdf_with_pages(&["Python backend engineer", "Sales and marketing lead"]),
        );
        let chunks = loader(Arc::new(PdfPageExtractor))
            .load_and_split(&document)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, Some(0));
        assert_eq!(chunks[1].page, Some(1));
        assert!(chunks[0].text.contains("Python backend engineer"));
        assert!(chunks[1].text.contains("Sales and marketing lead"));
        assert!(chunks.iter().all(|c| c.total_pages == 2));
    }

    #[test]
    fn test_unseparated_pages_have_no_page_number() {
        let extracted = ExtractedPages {
            pages: vec!["whole document text".to_string()],
            page_count: 3,
        };
        let pages = extracted.into_page_texts();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, None);
        assert_eq!(pages[0].total_pages, 3);
    }
}
