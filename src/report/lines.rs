use crate::analysis::Record;
use miette::{IntoDiagnostic, Result};
use std::io::Write;
use std::path::PathBuf;

/// Raw line reporter: one `<0|1> <location>` row per record, the same
/// format the per-unit cache files use. Suited to diffing and scripting.
pub struct LinesReporter {
    output_path: Option<PathBuf>,
}

impl LinesReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, records: &[Record]) -> Result<()> {
        let mut out = String::new();
        for record in records {
            out.push_str(&format!("{} {}\n", u8::from(record.used), record.location));
        }

        match &self.output_path {
            Some(path) => std::fs::write(path, out).into_diagnostic()?,
            None => std::io::stdout()
                .write_all(out.as_bytes())
                .into_diagnostic()?,
        }
        Ok(())
    }
}
