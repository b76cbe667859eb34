use crate::analysis::Record;
use crate::report::split_location;
use colored::Colorize;
use miette::Result;

/// Terminal reporter with colored output
pub struct TerminalReporter;

impl TerminalReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report(&self, records: &[Record]) -> Result<()> {
        let unused: Vec<&Record> = records.iter().filter(|r| !r.used).collect();

        if unused.is_empty() {
            println!(
                "{}",
                format!(
                    "No unused declarations found ({} analyzed).",
                    records.len()
                )
                .green()
                .bold()
            );
            return Ok(());
        }

        println!();
        println!(
            "{}",
            format!("Found {} unused declarations:", unused.len())
                .yellow()
                .bold()
        );
        println!();

        let mut current_file = "";
        for record in &unused {
            let (file, line, col) = split_location(&record.location);
            if file != current_file {
                if !current_file.is_empty() {
                    println!();
                }
                println!("{}", file.cyan().bold());
                current_file = file;
            }
            println!(
                "  {} {} never referenced",
                "○".dimmed(),
                format!("{}:{}", line, col).dimmed()
            );
        }

        println!();
        println!("{}", "─".repeat(60).dimmed());
        println!(
            "Summary: {} unused, {} used, {} total",
            unused.len().to_string().yellow(),
            (records.len() - unused.len()).to_string().green(),
            records.len()
        );
        println!(
            "{}",
            "Tip: declarations only reached via templates or macros may still be live"
                .dimmed()
        );

        Ok(())
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
