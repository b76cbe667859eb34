//! Compilation database loading
//!
//! Translation units come from a `compile_commands.json` database or,
//! alternatively, from a build log with one command line per row (the
//! shape `ninja -t commands` prints).

pub mod args;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CompileDbError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse compilation database: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("entry for {file} has neither \"command\" nor \"arguments\"")]
    MissingCommand { file: String },
    #[error("unterminated quote in command line: {line}")]
    UnterminatedQuote { line: String },
}

/// Raw entry as serialized in `compile_commands.json`.
#[derive(Debug, Deserialize)]
struct RawEntry {
    directory: String,
    file: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<String>>,
}

/// One compiler invocation: a translation unit to analyze.
#[derive(Debug, Clone)]
pub struct CompileCommand {
    /// Working directory of the invocation; relative paths in the argv and
    /// in the compiler's output resolve against it.
    pub directory: PathBuf,

    /// Main source file, as written in the database.
    pub file: PathBuf,

    pub argv: Vec<String>,
}

impl CompileCommand {
    /// Absolute path of the main source file.
    pub fn source_path(&self) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            self.directory.join(&self.file)
        }
    }
}

/// Load `compile_commands.json`.
pub fn load(path: &Path) -> Result<Vec<CompileCommand>, CompileDbError> {
    let contents = fs::read_to_string(path).map_err(|source| CompileDbError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: Vec<RawEntry> = serde_json::from_str(&contents)?;

    let mut commands = Vec::with_capacity(raw.len());
    for entry in raw {
        let argv = match (entry.arguments, entry.command) {
            (Some(argv), _) => argv,
            (None, Some(command)) => split_command_line(&command)?,
            (None, None) => {
                return Err(CompileDbError::MissingCommand { file: entry.file });
            }
        };
        commands.push(CompileCommand {
            directory: PathBuf::from(entry.directory),
            file: PathBuf::from(entry.file),
            argv,
        });
    }

    debug!("loaded {} compile commands from {}", commands.len(), path.display());
    Ok(commands)
}

/// Extract compile steps from a build log: one command line per row,
/// everything that is not a C/C++ compile invocation skipped.
pub fn from_log(path: &Path, directory: &Path) -> Result<Vec<CompileCommand>, CompileDbError> {
    let contents = fs::read_to_string(path).map_err(|source| CompileDbError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut commands = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let argv = split_command_line(line)?;
        if let Some(file) = compile_source(&argv) {
            commands.push(CompileCommand {
                directory: directory.to_path_buf(),
                file: PathBuf::from(file),
                argv,
            });
        }
    }

    debug!("extracted {} compile commands from {}", commands.len(), path.display());
    Ok(commands)
}

/// If `argv` is a C/C++ compile step, return its source operand.
fn compile_source(argv: &[String]) -> Option<&str> {
    let compiler = argv.first()?;
    if !is_compiler(compiler) {
        return None;
    }
    if !argv.iter().any(|a| a == "-c") {
        return None;
    }
    argv.iter()
        .skip(1)
        .map(String::as_str)
        .find(|a| !a.starts_with('-') && is_source_file(a))
}

fn is_compiler(arg0: &str) -> bool {
    let base = arg0.rsplit('/').next().unwrap_or(arg0);
    // strip a trailing version suffix like clang-17 or gcc-12
    let base = match base.rfind('-') {
        Some(i) if base[i + 1..].chars().all(|c| c.is_ascii_digit()) => &base[..i],
        _ => base,
    };
    matches!(base, "cc" | "c++" | "gcc" | "g++" | "clang" | "clang++")
}

fn is_source_file(arg: &str) -> bool {
    let ext = match arg.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => return false,
    };
    matches!(ext, "c" | "cc" | "cpp" | "cxx" | "c++" | "C")
}

/// Split a shell command line into words: whitespace separation, single
/// quotes literal, double quotes with backslash escapes, bare backslash
/// escaping the next character.
pub fn split_command_line(line: &str) -> Result<Vec<String>, CompileDbError> {
    let unterminated = || CompileDbError::UnterminatedQuote {
        line: line.to_string(),
    };

    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(unterminated()),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(e @ ('"' | '\\' | '$' | '`')) => word.push(e),
                            Some(other) => {
                                word.push('\\');
                                word.push(other);
                            }
                            None => return Err(unterminated()),
                        },
                        Some(c) => word.push(c),
                        None => return Err(unterminated()),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(c) => word.push(c),
                    None => return Err(unterminated()),
                }
            }
            _ => {
                in_word = true;
                word.push(c);
            }
        }
    }

    if in_word {
        words.push(word);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_words() {
        assert_eq!(
            split_command_line("clang -c a.cpp").unwrap(),
            vec!["clang", "-c", "a.cpp"]
        );
    }

    #[test]
    fn test_split_quotes() {
        assert_eq!(
            split_command_line(r#"cc -DNAME="two words" 'a b.c'"#).unwrap(),
            vec!["cc", "-DNAME=two words", "a b.c"]
        );
    }

    #[test]
    fn test_split_escapes() {
        assert_eq!(
            split_command_line(r#"cc a\ b.c "x\"y""#).unwrap(),
            vec!["cc", "a b.c", "x\"y"]
        );
    }

    #[test]
    fn test_split_empty_quotes_make_a_word() {
        assert_eq!(split_command_line("cc ''").unwrap(), vec!["cc", ""]);
    }

    #[test]
    fn test_split_unterminated() {
        assert!(matches!(
            split_command_line("cc 'oops"),
            Err(CompileDbError::UnterminatedQuote { .. })
        ));
    }

    #[test]
    fn test_is_compiler() {
        assert!(is_compiler("clang++"));
        assert!(is_compiler("/usr/bin/cc"));
        assert!(is_compiler("gcc-12"));
        assert!(is_compiler("/opt/llvm/bin/clang-17"));
        assert!(!is_compiler("ld"));
        assert!(!is_compiler("python3"));
    }

    #[test]
    fn test_compile_source_detection() {
        let argv: Vec<String> = ["clang++", "-O2", "-c", "src/a.cpp", "-o", "a.o"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(compile_source(&argv), Some("src/a.cpp"));

        let link: Vec<String> = ["clang++", "a.o", "-o", "app"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(compile_source(&link), None);
    }

    #[test]
    fn test_load_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("compile_commands.json");
        fs::write(
            &db,
            r#"[
              {"directory": "/proj/build", "file": "../src/a.cpp",
               "command": "clang++ -c ../src/a.cpp -o a.o"},
              {"directory": "/proj/build", "file": "b.c",
               "arguments": ["cc", "-c", "b.c"]}
            ]"#,
        )
        .unwrap();

        let commands = load(&db).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].argv[0], "clang++");
        assert_eq!(commands[0].source_path(), PathBuf::from("/proj/build/../src/a.cpp"));
        assert_eq!(commands[1].argv, vec!["cc", "-c", "b.c"]);
    }

    #[test]
    fn test_from_log_filters_non_compiles() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("build.log");
        fs::write(
            &log,
            "clang++ -O2 -c src/a.cpp -o a.o\n\
             /usr/bin/ld a.o -o app\n\
             gcc -c lib/b.c -o b.o\n\
             echo done\n",
        )
        .unwrap();

        let commands = from_log(&log, Path::new("/proj")).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].file, PathBuf::from("src/a.cpp"));
        assert_eq!(commands[1].file, PathBuf::from("lib/b.c"));
    }
}
