//! Streaming AST scanner
//!
//! A push parser over the compiler's JSON AST dump. The dump is a single
//! deeply nested object whose `inner` arrays hold child nodes; dumps for
//! large translation units run to gigabytes, so the scanner walks the
//! stream byte-by-byte in a bounded window and forwards a compact per-node
//! projection to a sink as each node object completes.
//!
//! The dump format places `inner` as the last key of its node. The scanner
//! relies on this to flush the parent before descending, which hands nodes
//! to the sink in pre-order: parent before children. Keys appearing after
//! `inner` would land on a fresh projection without an id and be discarded
//! downstream.

mod error;
mod tokenizer;

pub use error::{ScanError, ScanErrorKind};
pub use tokenizer::{MIN_UNIT_SIZE, SCAN_WINDOW};

use std::io::Read;

use tokenizer::{Token, Tokenizer};

/// Source position fields of one node, as raw bytes from the dump.
/// Values may originate from JSON strings or numbers; both are kept as
/// their literal bytes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: Vec<u8>,
    pub line: Vec<u8>,
    pub presumed_file: Vec<u8>,
    pub presumed_line: Vec<u8>,
    pub col: Vec<u8>,
}

impl SourceLoc {
    fn clear(&mut self) {
        self.file.clear();
        self.line.clear();
        self.presumed_file.clear();
        self.presumed_line.clear();
        self.col.clear();
    }
}

/// Per-node projection delivered to the sink.
///
/// Owned by the scanner and reset between nodes; sinks must copy out
/// anything they keep. The buffers retain capacity across nodes, so a
/// steady-state scan does not allocate.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AstNode {
    pub id: Vec<u8>,
    pub kind: Vec<u8>,
    pub previous_decl: Vec<u8>,
    pub mangled_name: Vec<u8>,
    pub is_used: bool,
    pub is_implicit: bool,
    pub is_explicitly_deleted: bool,
    /// Expansion-side location; for macro-expanded nodes the place the
    /// expansion occurs.
    pub loc: SourceLoc,
    /// Spelling-side location, populated only for macro-expanded nodes.
    pub spelling_loc: SourceLoc,
}

impl AstNode {
    fn clear(&mut self) {
        self.id.clear();
        self.kind.clear();
        self.previous_decl.clear();
        self.mangled_name.clear();
        self.is_used = false;
        self.is_implicit = false;
        self.is_explicitly_deleted = false;
        self.loc.clear();
        self.spelling_loc.clear();
    }
}

/// Receives one call per completed node, in pre-order.
pub trait NodeSink {
    /// Consume a node projection. The reference is valid only for the
    /// duration of the call. Returning an error aborts the scan at the
    /// current input position.
    fn on_node(&mut self, node: &AstNode) -> Result<(), ScanErrorKind>;
}

/// Node-object keys the scanner consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKey {
    Id,
    Kind,
    PreviousDecl,
    MangledName,
    Loc,
    IsUsed,
    IsImplicit,
    ExplicitlyDeleted,
    Inner,
    Other,
}

impl NodeKey {
    fn from_bytes(key: &[u8]) -> Self {
        match key {
            b"id" => NodeKey::Id,
            b"kind" => NodeKey::Kind,
            b"previousDecl" => NodeKey::PreviousDecl,
            b"mangledName" => NodeKey::MangledName,
            b"loc" => NodeKey::Loc,
            b"isUsed" => NodeKey::IsUsed,
            b"isImplicit" => NodeKey::IsImplicit,
            b"explicitlyDeleted" => NodeKey::ExplicitlyDeleted,
            b"inner" => NodeKey::Inner,
            _ => NodeKey::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocKey {
    File,
    Line,
    PresumedFile,
    PresumedLine,
    Col,
    ExpansionLoc,
    SpellingLoc,
    Other,
}

impl LocKey {
    fn from_bytes(key: &[u8]) -> Self {
        match key {
            b"file" => LocKey::File,
            b"line" => LocKey::Line,
            b"presumedFile" => LocKey::PresumedFile,
            b"presumedLine" => LocKey::PresumedLine,
            b"col" => LocKey::Col,
            b"expansionLoc" => LocKey::ExpansionLoc,
            b"spellingLoc" => LocKey::SpellingLoc,
            _ => LocKey::Other,
        }
    }
}

/// Which `SourceLoc` a loc field lands on. Expansion fields share the
/// primary location; only spelling fields go to the secondary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocTarget {
    Primary,
    Spelling,
}

/// Streaming scanner driving a `NodeSink`.
pub struct AstScanner<R: Read, S: NodeSink> {
    tok: Tokenizer<R>,
    sink: S,
    node: AstNode,
}

impl<R: Read, S: NodeSink> AstScanner<R, S> {
    pub fn new(reader: R, sink: S) -> Self {
        Self {
            tok: Tokenizer::new(reader),
            sink,
            node: AstNode::default(),
        }
    }

    /// Scan the whole dump, returning the sink when the top-level object
    /// closes. Fails fast on the first malformed construct, reporting the
    /// 1-based input position.
    pub fn run(mut self) -> Result<S, ScanError> {
        match self.tok.next()? {
            Token::ObjectBegin => {}
            Token::Eof => return Err(self.tok.error(ScanErrorKind::UnexpectedEndOfInput)),
            _ => return Err(self.tok.error(ScanErrorKind::ExpectedNode)),
        }

        // Open braces and brackets not yet closed. The machine never keeps
        // a per-level stack; a parent flushed at its `inner` key is closed
        // later by a tolerated ObjectEnd in the between-nodes state.
        let mut depth: usize = 1;
        let mut in_node = true;

        loop {
            if in_node {
                match self.tok.next()? {
                    Token::ObjectEnd => {
                        self.flush()?;
                        depth -= 1;
                        if depth == 0 {
                            return Ok(self.sink);
                        }
                        in_node = false;
                    }
                    Token::String { bytes, escaped } => {
                        let key = NodeKey::from_bytes(bytes);
                        if escaped {
                            return Err(self
                                .tok
                                .error(ScanErrorKind::UnsupportedObjectKeyEscapes));
                        }
                        match key {
                            NodeKey::Id => {
                                let v = read_scalar(&mut self.tok)?;
                                copy_into(&mut self.node.id, v);
                            }
                            NodeKey::Kind => {
                                let v = read_scalar(&mut self.tok)?;
                                copy_into(&mut self.node.kind, v);
                            }
                            NodeKey::PreviousDecl => {
                                let v = read_scalar(&mut self.tok)?;
                                copy_into(&mut self.node.previous_decl, v);
                            }
                            NodeKey::MangledName => {
                                let v = read_scalar(&mut self.tok)?;
                                copy_into(&mut self.node.mangled_name, v);
                            }
                            NodeKey::IsUsed => {
                                self.node.is_used = read_bool(&mut self.tok)?;
                            }
                            NodeKey::IsImplicit => {
                                self.node.is_implicit = read_bool(&mut self.tok)?;
                            }
                            NodeKey::ExplicitlyDeleted => {
                                self.node.is_explicitly_deleted = read_bool(&mut self.tok)?;
                            }
                            NodeKey::Loc => {
                                expect_object(&mut self.tok)?;
                                scan_loc(&mut self.tok, &mut self.node)?;
                            }
                            NodeKey::Inner => {
                                // children follow; hand the parent over first
                                self.flush()?;
                                match self.tok.next()? {
                                    Token::ArrayBegin => {}
                                    Token::Eof => {
                                        return Err(self
                                            .tok
                                            .error(ScanErrorKind::UnexpectedEndOfInput))
                                    }
                                    _ => {
                                        return Err(self
                                            .tok
                                            .error(ScanErrorKind::ExpectedArray))
                                    }
                                }
                                depth += 1;
                                in_node = false;
                            }
                            NodeKey::Other => skip_value(&mut self.tok)?,
                        }
                    }
                    Token::Eof => {
                        return Err(self.tok.error(ScanErrorKind::UnexpectedEndOfInput))
                    }
                    _ => return Err(self.tok.error(ScanErrorKind::Syntax)),
                }
            } else {
                // between nodes: inside an `inner` array, or after a parent
                // was flushed early and its closing brace is still due
                match self.tok.next()? {
                    Token::ObjectBegin => {
                        depth += 1;
                        in_node = true;
                    }
                    Token::ObjectEnd | Token::ArrayEnd => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(self.sink);
                        }
                    }
                    Token::Eof => {
                        return Err(self.tok.error(ScanErrorKind::UnexpectedEndOfInput))
                    }
                    _ => return Err(self.tok.error(ScanErrorKind::ExpectedNode)),
                }
            }
        }
    }

    fn flush(&mut self) -> Result<(), ScanError> {
        if let Err(kind) = self.sink.on_node(&self.node) {
            let (line, col) = self.tok.position();
            return Err(ScanError::parse(kind, line, col));
        }
        self.node.clear();
        Ok(())
    }
}

fn copy_into(dst: &mut Vec<u8>, src: &[u8]) {
    dst.clear();
    dst.extend_from_slice(src);
}

/// Land a single string-or-number scalar.
fn read_scalar<'t, R: Read>(tok: &'t mut Tokenizer<R>) -> Result<&'t [u8], ScanError> {
    let (line, col) = tok.position();
    match tok.next()? {
        Token::String { bytes, .. } => Ok(bytes),
        Token::Number(bytes) => Ok(bytes),
        Token::Eof => Err(ScanError::parse(
            ScanErrorKind::UnexpectedEndOfInput,
            line,
            col,
        )),
        _ => Err(ScanError::parse(
            ScanErrorKind::ExpectedStringOrNumber,
            line,
            col,
        )),
    }
}

fn read_bool<R: Read>(tok: &mut Tokenizer<R>) -> Result<bool, ScanError> {
    match tok.next()? {
        Token::True => Ok(true),
        Token::False => Ok(false),
        Token::Eof => Err(tok.error(ScanErrorKind::UnexpectedEndOfInput)),
        _ => Err(tok.error(ScanErrorKind::ExpectedBool)),
    }
}

fn expect_object<R: Read>(tok: &mut Tokenizer<R>) -> Result<(), ScanError> {
    match tok.next()? {
        Token::ObjectBegin => Ok(()),
        Token::Eof => Err(tok.error(ScanErrorKind::UnexpectedEndOfInput)),
        _ => Err(tok.error(ScanErrorKind::ExpectedObject)),
    }
}

/// Swallow exactly one value of any shape, tracking nesting depth.
fn skip_value<R: Read>(tok: &mut Tokenizer<R>) -> Result<(), ScanError> {
    let mut depth: usize = 0;
    loop {
        match tok.next()? {
            Token::ObjectBegin | Token::ArrayBegin => depth += 1,
            Token::ObjectEnd | Token::ArrayEnd => {
                if depth == 0 {
                    return Err(tok.error(ScanErrorKind::Syntax));
                }
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Token::String { .. } | Token::Number(_) | Token::True | Token::False
            | Token::Null => {
                if depth == 0 {
                    return Ok(());
                }
            }
            Token::Eof => return Err(tok.error(ScanErrorKind::UnexpectedEndOfInput)),
        }
    }
}

/// Scan a `loc` object. `expansionLoc` fields fold into the primary
/// location, `spellingLoc` fields into the secondary; neither nested form
/// recurses further, so deeper structure inside them is skipped.
fn scan_loc<R: Read>(tok: &mut Tokenizer<R>, node: &mut AstNode) -> Result<(), ScanError> {
    scan_loc_fields(tok, node, LocTarget::Primary, true)
}

fn scan_loc_fields<R: Read>(
    tok: &mut Tokenizer<R>,
    node: &mut AstNode,
    target: LocTarget,
    allow_nested: bool,
) -> Result<(), ScanError> {
    loop {
        match tok.next()? {
            Token::ObjectEnd => return Ok(()),
            Token::String { bytes, escaped } => {
                let key = LocKey::from_bytes(bytes);
                if escaped {
                    return Err(tok.error(ScanErrorKind::UnsupportedObjectKeyEscapes));
                }
                match key {
                    LocKey::File | LocKey::Line | LocKey::PresumedFile
                    | LocKey::PresumedLine | LocKey::Col => {
                        let v = read_scalar(tok)?;
                        let dst = match target {
                            LocTarget::Primary => &mut node.loc,
                            LocTarget::Spelling => &mut node.spelling_loc,
                        };
                        let field = match key {
                            LocKey::File => &mut dst.file,
                            LocKey::Line => &mut dst.line,
                            LocKey::PresumedFile => &mut dst.presumed_file,
                            LocKey::PresumedLine => &mut dst.presumed_line,
                            LocKey::Col => &mut dst.col,
                            _ => unreachable!(),
                        };
                        copy_into(field, v);
                    }
                    LocKey::ExpansionLoc if allow_nested => {
                        expect_object(tok)?;
                        scan_loc_fields(tok, node, LocTarget::Primary, false)?;
                    }
                    LocKey::SpellingLoc if allow_nested => {
                        expect_object(tok)?;
                        scan_loc_fields(tok, node, LocTarget::Spelling, false)?;
                    }
                    _ => skip_value(tok)?,
                }
            }
            Token::Eof => return Err(tok.error(ScanErrorKind::UnexpectedEndOfInput)),
            _ => return Err(tok.error(ScanErrorKind::Syntax)),
        }
    }
}
