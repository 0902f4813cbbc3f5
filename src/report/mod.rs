//! Turning ledger events into report rows and writing them out.

mod projector;
mod writer;

pub use projector::{format_sats, is_reportable, project, ReportRow};
pub use writer::{
    CsvReportWriter, ReportArtifact, ReportSink, ReportWriter, CSV_HEADERS, DEFAULT_FILE_PREFIX,
};
