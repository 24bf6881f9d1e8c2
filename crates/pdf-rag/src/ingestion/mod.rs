//! Document ingestion: PDF text extraction, word-window chunking, and the
//! embed-then-index pipeline

mod chunker;
mod parser;
mod pipeline;

pub use chunker::WordChunker;
pub use parser::{is_pdf_filename, sanitize_filename, PdfExtractor};
pub use pipeline::{validate_document_id, IngestPipeline, IngestReport, IngestStage};
