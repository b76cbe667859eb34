mod json;
mod lines;
mod terminal;

pub use json::JsonReporter;
pub use lines::LinesReporter;
pub use terminal::TerminalReporter;

use crate::analysis::Record;
use miette::Result;
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Default)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
    /// Raw `<0|1> <location>` lines, the exchange format of the cache
    Lines,
}

/// Reporter for outputting analysis results
pub struct Reporter {
    format: ReportFormat,
    output_path: Option<PathBuf>,
    include_used: bool,
}

impl Reporter {
    pub fn new(format: ReportFormat, output_path: Option<PathBuf>, include_used: bool) -> Self {
        Self {
            format,
            output_path,
            include_used,
        }
    }

    /// Report the analysis results.
    pub fn report(&self, records: &[Record]) -> Result<()> {
        match &self.format {
            ReportFormat::Terminal => {
                let reporter = TerminalReporter::new();
                reporter.report(records)
            }
            ReportFormat::Json => {
                let reporter = JsonReporter::new(self.output_path.clone(), self.include_used);
                reporter.report(records)
            }
            ReportFormat::Lines => {
                let reporter = LinesReporter::new(self.output_path.clone());
                reporter.report(records)
            }
        }
    }
}

/// Split a canonical `<file>:<line>:<col>` location. Splits from the
/// right, so files containing `:` survive.
pub(crate) fn split_location(location: &str) -> (&str, u64, u64) {
    let (rest, col) = location.rsplit_once(':').unwrap_or((location, ""));
    let (file, line) = rest.rsplit_once(':').unwrap_or((rest, ""));
    (
        file,
        line.parse().unwrap_or(0),
        col.parse().unwrap_or(0),
    )
}

/// Order records by (file, line, col), lines and columns compared as
/// unsigned integers rather than text.
pub fn sort_records(records: &mut [Record]) {
    records.sort_by(|a, b| {
        let (af, al, ac) = split_location(&a.location);
        let (bf, bl, bc) = split_location(&b.location);
        (af, al, ac).cmp(&(bf, bl, bc))
    });
}
