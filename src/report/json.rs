use crate::analysis::Record;
use crate::report::split_location;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
    include_used: bool,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>, include_used: bool) -> Self {
        Self {
            output_path,
            include_used,
        }
    }

    pub fn report(&self, records: &[Record]) -> Result<()> {
        let report = JsonReport::from_records(records, self.include_used);
        let json = serde_json::to_string_pretty(&report).into_diagnostic()?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport {
    version: &'static str,
    declarations: Vec<JsonDeclaration>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonDeclaration {
    file: String,
    line: u64,
    column: u64,
    used: bool,
}

#[derive(Serialize)]
struct JsonSummary {
    total: usize,
    used: usize,
    unused: usize,
}

impl JsonReport {
    fn from_records(records: &[Record], include_used: bool) -> Self {
        let used_count = records.iter().filter(|r| r.used).count();

        let declarations: Vec<JsonDeclaration> = records
            .iter()
            .filter(|r| include_used || !r.used)
            .map(|r| {
                let (file, line, column) = split_location(&r.location);
                JsonDeclaration {
                    file: file.to_string(),
                    line,
                    column,
                    used: r.used,
                }
            })
            .collect();

        Self {
            version: "1.0",
            declarations,
            summary: JsonSummary {
                total: records.len(),
                used: used_count,
                unused: records.len() - used_count,
            },
        }
    }
}
