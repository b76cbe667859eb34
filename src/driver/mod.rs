//! Per-translation-unit execution
//!
//! Spawns the AST dumper for each compile command, streams its stdout
//! straight through the scanner into a fresh analyzer, and unions the
//! per-unit results by location string. Every unit owns disjoint state, so
//! the parallel path needs no synchronization beyond collecting results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use miette::{miette, IntoDiagnostic, Result, WrapErr};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::{Record, UsageAnalyzer};
use crate::cache::{TuCache, TuKey};
use crate::compiledb::{args::ast_dump_argv, CompileCommand};
use crate::scanner::AstScanner;
use crate::scope::PathScope;

/// Drives the scan/analyze pipeline over a set of translation units.
pub struct Driver {
    project_root: PathBuf,
    excluded: Vec<PathBuf>,
    dumper: String,
    cache: Option<TuCache>,
}

impl Driver {
    pub fn new(project_root: PathBuf, excluded: Vec<PathBuf>, dumper: String) -> Self {
        Self {
            project_root,
            excluded,
            dumper,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: TuCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Analyze one translation unit, returning its usage records.
    pub fn analyze_unit(&self, cmd: &CompileCommand) -> Result<Vec<Record>> {
        let argv = ast_dump_argv(&cmd.argv, &self.dumper);

        let key = match &self.cache {
            Some(_) => TuKey::for_unit(cmd, &argv).ok(),
            None => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(records) = cache.load(key) {
                debug!("cache hit for {}", cmd.file.display());
                return Ok(records);
            }
        }

        debug!("dumping AST for {}", cmd.file.display());

        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(&cmd.directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to run {}", argv[0]))?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let scope = PathScope::new(&self.project_root, &cmd.directory, &self.excluded);
        let scan_result = AstScanner::new(stdout, UsageAnalyzer::new(scope)).run();

        let status = child.wait().into_diagnostic()?;

        let analyzer = match scan_result {
            Ok(analyzer) => analyzer,
            Err(e) => {
                // a dumper that died mid-stream is the more useful diagnostic
                if !status.success() {
                    return Err(miette!(
                        "{} exited with {} while dumping {}",
                        argv[0],
                        status,
                        cmd.file.display()
                    ));
                }
                return Err(e)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Malformed AST dump for {}", cmd.file.display()));
            }
        };

        if !status.success() {
            return Err(miette!(
                "{} exited with {} while dumping {}",
                argv[0],
                status,
                cmd.file.display()
            ));
        }

        let records = analyzer.records();

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Err(e) = cache.store(key, &records) {
                warn!("failed to cache results for {}: {}", cmd.file.display(), e);
            }
        }

        Ok(records)
    }

    /// Analyze every translation unit and merge the results. Units that
    /// fail are logged and skipped; the run only fails when nothing could
    /// be analyzed at all.
    pub fn analyze_all(&self, commands: &[CompileCommand], parallel: bool) -> Result<Vec<Record>> {
        let results: Vec<Result<Vec<Record>>> = if parallel {
            info!("Analyzing {} translation units in parallel...", commands.len());
            commands
                .par_iter()
                .map(|cmd| self.analyze_unit(cmd))
                .collect()
        } else {
            let pb = indicatif::ProgressBar::new(commands.len() as u64);
            pb.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            let results = commands
                .iter()
                .map(|cmd| {
                    let r = self.analyze_unit(cmd);
                    pb.inc(1);
                    r
                })
                .collect();
            pb.finish_and_clear();
            results
        };

        let mut per_unit = Vec::new();
        let mut failures = 0usize;
        for (cmd, result) in commands.iter().zip(results) {
            match result {
                Ok(records) => per_unit.push(records),
                Err(e) => {
                    warn!("skipping {}: {:?}", cmd.file.display(), e);
                    failures += 1;
                }
            }
        }

        if !commands.is_empty() && per_unit.is_empty() {
            return Err(miette!("all {} translation units failed to analyze", failures));
        }
        if failures > 0 {
            info!("{} of {} translation units failed", failures, commands.len());
        }

        Ok(merge_records(per_unit))
    }
}

/// Union per-unit records by location string: a declaration is used when
/// any translation unit used it.
pub fn merge_records(per_unit: Vec<Vec<Record>>) -> Vec<Record> {
    let mut merged: BTreeMap<String, bool> = BTreeMap::new();
    for records in per_unit {
        for record in records {
            *merged.entry(record.location).or_insert(false) |= record.used;
        }
    }
    merged
        .into_iter()
        .map(|(location, used)| Record { used, location })
        .collect()
}

/// Convenience for analyzing an in-memory dump; the scanner accepts any
/// byte producer.
pub fn analyze_dump(
    dump: &[u8],
    project_root: &Path,
    build_dir: &Path,
    excluded: &[PathBuf],
) -> std::result::Result<Vec<Record>, crate::scanner::ScanError> {
    let scope = PathScope::new(project_root, build_dir, excluded);
    let analyzer = AstScanner::new(dump, UsageAnalyzer::new(scope)).run()?;
    Ok(analyzer.records())
}
