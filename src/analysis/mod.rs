//! Usage analysis over the streamed AST
//!
//! Consumes node projections in pre-order, re-materializes the location
//! fields the dump omits on sibling nodes, canonicalizes file paths
//! against the project scope, interns locations, links definitions back to
//! their earlier declarations, and aggregates a used/unused verdict per
//! declaration.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::pool::{LocId, StringPool};
use crate::scanner::{AstNode, NodeSink, ScanErrorKind};
use crate::scope::PathScope;

/// Upper bound for an inherited file path. Real compiler dumps stay well
/// under this; hitting it is `StringTooLong`.
const MAX_FILE_LEN: usize = 4096;

/// Upper bound for an inherited line number, as digits.
const MAX_LINE_LEN: usize = 16;

/// Declaration kinds worth reporting. The set is closed; destructors are
/// deliberately absent because an unused destructor is not actionable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Function,
    Method,
    Constructor,
    Conversion,
}

impl DeclKind {
    fn from_kind(kind: &[u8]) -> Option<Self> {
        match kind {
            b"FunctionDecl" => Some(DeclKind::Function),
            b"CXXMethodDecl" => Some(DeclKind::Method),
            b"CXXConstructorDecl" => Some(DeclKind::Constructor),
            b"CXXConversionDecl" => Some(DeclKind::Conversion),
            _ => None,
        }
    }
}

/// One analyzed location with its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub used: bool,
    /// Canonical `<project-relative-file>:<line>:<col>`.
    pub location: String,
}

/// Per-translation-unit usage analyzer.
///
/// Strictly single-threaded: the scanner calls in synchronously as each
/// node completes. State grows monotonically with distinct declarations;
/// the caller discards the whole instance to release it.
pub struct UsageAnalyzer {
    scope: PathScope,
    pool: StringPool,

    /// Canonical location per node id.
    id_to_loc: HashMap<u64, LocId>,

    /// Macro spelling location per node id, when present.
    id_to_spelling: HashMap<u64, LocId>,

    /// Locations known to be used.
    used: HashSet<LocId>,

    /// Most recent in-scope file, inherited by nodes that omit theirs.
    /// Empty means the most recent file was out of scope; no locations are
    /// produced until an in-scope file appears.
    current_file: Vec<u8>,

    /// Most recent line, inherited like `current_file`.
    current_line: Vec<u8>,

    scratch: Vec<u8>,
}

impl UsageAnalyzer {
    pub fn new(scope: PathScope) -> Self {
        Self {
            scope,
            pool: StringPool::new(),
            id_to_loc: HashMap::new(),
            id_to_spelling: HashMap::new(),
            used: HashSet::new(),
            current_file: Vec::new(),
            current_line: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Process one node projection. Infallible except for oversized
    /// file/line values.
    fn ingest(&mut self, node: &AstNode) -> Result<(), ScanErrorKind> {
        self.inherit_location(node)?;

        if DeclKind::from_kind(&node.kind).is_none() {
            return Ok(());
        }

        // compiler builtins lack locations entirely
        if self.current_file.is_empty() || self.current_line.is_empty() || node.loc.col.is_empty()
        {
            return Ok(());
        }

        // synthesized members are not the programmer's code, and a deleted
        // declaration cannot meaningfully be unused
        if node.is_implicit || node.is_explicitly_deleted {
            return Ok(());
        }

        let Some(id) = parse_node_id(&node.id) else {
            return Ok(());
        };

        let (loc, spelling) = if node.previous_decl.is_empty() {
            let loc = self.intern_primary(node);
            let spelling = self.intern_spelling(node);
            (loc, spelling)
        } else {
            // this node defines an earlier prototype: reuse its location
            let Some(prev) = parse_node_id(&node.previous_decl) else {
                return Ok(());
            };
            let Some(&loc) = self.id_to_loc.get(&prev) else {
                // the dump occasionally emits dangling back-references
                return Ok(());
            };
            (loc, self.id_to_spelling.get(&prev).copied())
        };

        self.record(id, loc, spelling);

        if node.is_used || node.mangled_name == b"main" {
            self.used.insert(loc);
            if let Some(spelling) = spelling {
                self.used.insert(spelling);
            }
        }

        Ok(())
    }

    /// Fold this node's location fields into the inherited cursors.
    ///
    /// Generated files carry `# line file` directives that the compiler
    /// surfaces as presumed locations; those point at the file the
    /// maintainer actually edits, so they win over the physical ones.
    fn inherit_location(&mut self, node: &AstNode) -> Result<(), ScanErrorKind> {
        let file = if node.loc.presumed_file.is_empty() {
            &node.loc.file
        } else {
            &node.loc.presumed_file
        };

        if !file.is_empty() {
            let resolved = self.resolve_file(file);
            self.current_file.clear();
            if let Some(rel) = resolved {
                if rel.len() >= MAX_FILE_LEN {
                    return Err(ScanErrorKind::StringTooLong);
                }
                self.current_file.extend_from_slice(rel.as_bytes());
            }
        }

        if !self.current_file.is_empty() {
            let line = if node.loc.presumed_line.is_empty() {
                &node.loc.line
            } else {
                &node.loc.presumed_line
            };
            if !line.is_empty() {
                if line.len() >= MAX_LINE_LEN {
                    return Err(ScanErrorKind::StringTooLong);
                }
                self.current_line.clear();
                self.current_line.extend_from_slice(line);
            }
        }

        Ok(())
    }

    fn resolve_file(&self, raw: &[u8]) -> Option<String> {
        let s = std::str::from_utf8(raw).ok()?;
        let rel = self.scope.resolve(Path::new(s))?;
        Some(rel.to_string_lossy().into_owned())
    }

    fn intern_primary(&mut self, node: &AstNode) -> LocId {
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.current_file);
        self.scratch.push(b':');
        self.scratch.extend_from_slice(&self.current_line);
        self.scratch.push(b':');
        self.scratch.extend_from_slice(&node.loc.col);
        self.pool.put(&self.scratch)
    }

    /// Macro-expanded nodes carry a spelling-side location; intern it so a
    /// use at the expansion site also covers the definition site. The
    /// spelling column only gates presence; the recorded column is the
    /// node's own.
    fn intern_spelling(&mut self, node: &AstNode) -> Option<LocId> {
        if node.spelling_loc.col.is_empty() {
            return None;
        }
        let resolved = if node.spelling_loc.file.is_empty() {
            None
        } else {
            // out-of-scope spelling file: fall back on nothing, skip it
            Some(self.resolve_file(&node.spelling_loc.file)?)
        };
        self.scratch.clear();
        match &resolved {
            Some(rel) => self.scratch.extend_from_slice(rel.as_bytes()),
            None => self.scratch.extend_from_slice(&self.current_file),
        }
        self.scratch.push(b':');
        if node.spelling_loc.line.is_empty() {
            self.scratch.extend_from_slice(&self.current_line);
        } else {
            self.scratch.extend_from_slice(&node.spelling_loc.line);
        }
        self.scratch.push(b':');
        self.scratch.extend_from_slice(&node.loc.col);
        Some(self.pool.put(&self.scratch))
    }

    fn record(&mut self, id: u64, loc: LocId, spelling: Option<LocId>) {
        if let Some(existing) = self.id_to_loc.insert(id, loc) {
            // a node id must resolve to one location for the whole dump
            assert_eq!(existing, loc, "node {id:#x} reported conflicting locations");
        }
        if let Some(spelling) = spelling {
            if let Some(existing) = self.id_to_spelling.insert(id, spelling) {
                assert_eq!(
                    existing, spelling,
                    "node {id:#x} reported conflicting spelling locations"
                );
            }
        }
    }

    /// Enumerate every analyzed location with its verdict. Order is
    /// unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (bool, &[u8])> + '_ {
        self.pool
            .iter()
            .map(|id| (self.used.contains(&id), self.pool.get(id)))
    }

    /// Owned records for all analyzed locations. Order is unspecified.
    pub fn records(&self) -> Vec<Record> {
        self.iter()
            .map(|(used, bytes)| Record {
                used,
                location: String::from_utf8_lossy(bytes).into_owned(),
            })
            .collect()
    }

    pub fn location_count(&self) -> usize {
        self.pool.len()
    }
}

impl NodeSink for UsageAnalyzer {
    fn on_node(&mut self, node: &AstNode) -> Result<(), ScanErrorKind> {
        self.ingest(node)
    }
}

/// Parse a node id: `0x`-prefixed hex as the dump writes it, or decimal.
fn parse_node_id(bytes: &[u8]) -> Option<u64> {
    let s = std::str::from_utf8(bytes).ok()?;
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::SourceLoc;
    use std::path::PathBuf;

    fn analyzer() -> UsageAnalyzer {
        UsageAnalyzer::new(PathScope::new(Path::new("/proj"), Path::new("/proj"), &[]))
    }

    fn node(kind: &[u8], id: &[u8], file: &[u8], line: &[u8], col: &[u8]) -> AstNode {
        AstNode {
            id: id.to_vec(),
            kind: kind.to_vec(),
            loc: SourceLoc {
                file: file.to_vec(),
                line: line.to_vec(),
                col: col.to_vec(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_node_id() {
        assert_eq!(parse_node_id(b"0x10"), Some(16));
        assert_eq!(parse_node_id(b"0X1f"), Some(31));
        assert_eq!(parse_node_id(b"42"), Some(42));
        assert_eq!(parse_node_id(b""), None);
        assert_eq!(parse_node_id(b"0xzz"), None);
    }

    #[test]
    fn test_basic_record() {
        let mut a = analyzer();
        let mut n = node(b"FunctionDecl", b"0x10", b"/proj/a.cpp", b"3", b"5");
        n.is_used = true;
        a.ingest(&n).unwrap();
        assert_eq!(
            a.records(),
            vec![Record {
                used: true,
                location: "a.cpp:3:5".into()
            }]
        );
    }

    #[test]
    fn test_location_inherited_from_earlier_node() {
        let mut a = analyzer();
        a.ingest(&node(b"FunctionDecl", b"0x10", b"/proj/a.cpp", b"10", b"1"))
            .unwrap();
        // sibling omits file and line, inherits a.cpp:10
        a.ingest(&node(b"CXXMethodDecl", b"0x11", b"", b"", b"7"))
            .unwrap();
        let mut locs: Vec<_> = a.records().into_iter().map(|r| r.location).collect();
        locs.sort();
        assert_eq!(locs, vec!["a.cpp:10:1", "a.cpp:10:7"]);
    }

    #[test]
    fn test_out_of_scope_file_clears_cursor() {
        let mut a = analyzer();
        a.ingest(&node(b"FunctionDecl", b"0x10", b"/proj/a.cpp", b"3", b"5"))
            .unwrap();
        a.ingest(&node(
            b"FunctionDecl",
            b"0x11",
            b"/usr/include/stdio.h",
            b"50",
            b"1",
        ))
        .unwrap();
        // no file on this one: the out-of-scope cursor still blocks it
        a.ingest(&node(b"FunctionDecl", b"0x12", b"", b"60", b"2"))
            .unwrap();
        assert_eq!(a.location_count(), 1);
    }

    #[test]
    fn test_non_callable_kinds_only_update_cursor() {
        let mut a = analyzer();
        a.ingest(&node(b"VarDecl", b"0x10", b"/proj/a.cpp", b"3", b"5"))
            .unwrap();
        assert_eq!(a.location_count(), 0);
        a.ingest(&node(b"FunctionDecl", b"0x11", b"", b"", b"9"))
            .unwrap();
        assert_eq!(a.records()[0].location, "a.cpp:3:9");
    }

    #[test]
    fn test_implicit_and_deleted_skipped() {
        let mut a = analyzer();
        let mut implicit = node(b"CXXConstructorDecl", b"0x10", b"/proj/a.cpp", b"4", b"3");
        implicit.is_implicit = true;
        let mut deleted = node(b"CXXMethodDecl", b"0x11", b"/proj/a.cpp", b"5", b"3");
        deleted.is_explicitly_deleted = true;
        a.ingest(&implicit).unwrap();
        a.ingest(&deleted).unwrap();
        assert_eq!(a.location_count(), 0);
    }

    #[test]
    fn test_previous_decl_reuses_location() {
        let mut a = analyzer();
        a.ingest(&node(b"FunctionDecl", b"0x20", b"/proj/a.cpp", b"1", b"1"))
            .unwrap();
        let mut def = node(b"FunctionDecl", b"0x21", b"/proj/a.cpp", b"9", b"13");
        def.previous_decl = b"0x20".to_vec();
        def.is_used = true;
        a.ingest(&def).unwrap();
        // one location, used: the definition folds into the prototype
        assert_eq!(
            a.records(),
            vec![Record {
                used: true,
                location: "a.cpp:1:1".into()
            }]
        );
    }

    #[test]
    fn test_dangling_previous_decl_dropped() {
        let mut a = analyzer();
        let mut def = node(b"FunctionDecl", b"0x21", b"/proj/a.cpp", b"9", b"13");
        def.previous_decl = b"0xdead".to_vec();
        a.ingest(&def).unwrap();
        assert_eq!(a.location_count(), 0);
    }

    #[test]
    fn test_main_is_always_used() {
        let mut a = analyzer();
        let mut n = node(b"FunctionDecl", b"0x10", b"/proj/main.cpp", b"1", b"5");
        n.mangled_name = b"main".to_vec();
        a.ingest(&n).unwrap();
        assert!(a.records()[0].used);
    }

    #[test]
    fn test_presumed_location_wins() {
        let mut a = analyzer();
        let mut n = node(b"FunctionDecl", b"0x10", b"/proj/gen/a.gen.cpp", b"900", b"2");
        n.loc.presumed_file = b"/proj/a.tmpl".to_vec();
        n.loc.presumed_line = b"12".to_vec();
        a.ingest(&n).unwrap();
        assert_eq!(a.records()[0].location, "a.tmpl:12:2");
    }

    #[test]
    fn test_spelling_location_marked_used() {
        let mut a = analyzer();
        let mut n = node(b"FunctionDecl", b"0x10", b"/proj/a.cpp", b"9", b"1");
        n.spelling_loc = SourceLoc {
            file: b"/proj/macros.h".to_vec(),
            line: b"2".to_vec(),
            col: b"11".to_vec(),
            ..Default::default()
        };
        n.is_used = true;
        a.ingest(&n).unwrap();
        let recs = a.records();
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.used));
        // spelling file and line, but the node's own column
        assert!(recs.iter().any(|r| r.location == "macros.h:2:1"));
    }

    #[test]
    fn test_used_is_subset_of_pool() {
        let mut a = analyzer();
        let mut used = node(b"FunctionDecl", b"0x1", b"/proj/a.cpp", b"1", b"1");
        used.is_used = true;
        a.ingest(&used).unwrap();
        a.ingest(&node(b"FunctionDecl", b"0x2", b"/proj/a.cpp", b"2", b"1"))
            .unwrap();
        for id in a.used.iter() {
            assert!(id.index() < a.pool.len());
        }
    }

    #[test]
    fn test_oversized_line_rejected() {
        let mut a = analyzer();
        let n = node(
            b"FunctionDecl",
            b"0x1",
            b"/proj/a.cpp",
            &[b'9'; MAX_LINE_LEN],
            b"1",
        );
        assert_eq!(a.ingest(&n), Err(ScanErrorKind::StringTooLong));
    }

    #[test]
    #[should_panic(expected = "conflicting locations")]
    fn test_conflicting_id_locations_abort() {
        let mut a = analyzer();
        a.ingest(&node(b"FunctionDecl", b"0x1", b"/proj/a.cpp", b"1", b"1"))
            .unwrap();
        a.ingest(&node(b"FunctionDecl", b"0x1", b"/proj/a.cpp", b"2", b"2"))
            .unwrap();
    }

    #[test]
    fn test_build_dir_relative_paths() {
        let scope = PathScope::new(
            Path::new("/proj"),
            Path::new("/proj/build"),
            &[PathBuf::from("vendor")],
        );
        let mut a = UsageAnalyzer::new(scope);
        a.ingest(&node(b"FunctionDecl", b"0x1", b"../src/a.cpp", b"4", b"2"))
            .unwrap();
        a.ingest(&node(b"FunctionDecl", b"0x2", b"/proj/vendor/v.cpp", b"1", b"1"))
            .unwrap();
        let recs = a.records();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].location, "src/a.cpp:4:2");
    }
}
