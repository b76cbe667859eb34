//! CppDead - Fast dead function detection for C/C++
//!
//! This library finds function, method, constructor, and conversion-operator
//! declarations that are defined but never referenced, by consuming the
//! compiler's JSON AST dump (`clang -Xclang -ast-dump=json`).
//!
//! # Architecture
//!
//! The analysis pipeline consists of:
//! 1. **Compilation Database** - Enumerate translation units from
//!    `compile_commands.json` or a build log
//! 2. **AST Streaming** - Scan the compiler's JSON dump byte-by-byte in
//!    bounded memory, without materializing the tree
//! 3. **Usage Analysis** - Reconcile locations across nodes, link
//!    declarations to definitions, and mark used locations
//! 4. **Aggregation** - Union per-translation-unit results by location
//! 5. **Reporting** - Output results in various formats

pub mod analysis;
pub mod cache;
pub mod compiledb;
pub mod config;
pub mod driver;
pub mod pool;
pub mod report;
pub mod scanner;
pub mod scope;

pub use analysis::{Record, UsageAnalyzer};
pub use compiledb::CompileCommand;
pub use config::Config;
pub use driver::Driver;
pub use pool::{LocId, StringPool};
pub use report::{ReportFormat, Reporter};
pub use scanner::{AstNode, AstScanner, NodeSink, ScanError, ScanErrorKind};
pub use scope::PathScope;
