//! Daily report artifacts: CSV sheets and the admin summary e-mail.

pub mod sheets;
pub mod summary;

pub use sheets::{lead_sheet_csv, summary_csv, write_report_files, ReportFiles};
pub use summary::{render_report_html, report_subject};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to encode csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write report file: {0}")]
    Io(#[from] std::io::Error),
}
