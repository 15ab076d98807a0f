//! Go syntax extraction.
//!
//! Source files are parsed with tree-sitter and reduced to owned declarations:
//! imports, function and method declarations, their call sites, and an
//! estimate of each body's basic blocks. Nothing downstream holds on to the
//! tree-sitter tree.

mod blocks;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tree_sitter::{Node, Parser};

use crate::model::FunctionId;

pub use blocks::estimate_blocks;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{line}: {message}", path.display())]
pub struct SyntaxError {
    pub path: PathBuf,
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(path: &Path, line: usize, message: impl Into<String>) -> Self {
        Self { path: path.to_path_buf(), line, message: message.into() }
    }
}

/// One import spec. `alias` is the explicit name, including `.` and `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub alias: Option<String>,
    pub path: String,
}

impl Import {
    pub fn is_dot(&self) -> bool {
        self.alias.as_deref() == Some(".")
    }

    pub fn is_blank(&self) -> bool {
        self.alias.as_deref() == Some("_")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub type_name: String,
    pub pointer: bool,
}

/// Shape of a called expression, or of a function referenced as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// `f()`
    Local(String),
    /// `x.f()` where `x` is a bare identifier: a package or a value.
    Qualified { qualifier: String, name: String },
    /// `<expr>.f()` on anything else, always a method call.
    Method(String),
    /// Any other callee expression, such as `makeHandler()()`.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub callee: Callee,
    pub line: usize,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Receiver>,
    pub file: PathBuf,
    pub line: usize,
    /// Last line of the declaration, closing brace included.
    pub end_line: usize,
    /// False for declarations implemented in assembly.
    pub has_body: bool,
    pub blocks: u32,
    /// Calls in source order, including those made from nested function literals.
    pub calls: Vec<CallSite>,
}

impl FuncDecl {
    pub fn id(&self, package: &str) -> FunctionId {
        match &self.receiver {
            Some(recv) => FunctionId::method(package, &recv.type_name, recv.pointer, &self.name),
            None => FunctionId::new(package, self.name.clone()),
        }
    }

    /// Size weight; bodiless declarations weigh nothing.
    pub fn weight(&self) -> u32 {
        if self.has_body {
            self.blocks
        } else {
            0
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file.file_name().and_then(|n| n.to_str())
    }
}

/// Everything extracted from one `.go` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSyntax {
    pub path: PathBuf,
    pub package: String,
    pub imports: Vec<Import>,
    pub funcs: Vec<FuncDecl>,
    /// Names declared by `type` declarations; calls to them are conversions.
    pub types: Vec<String>,
    /// Functions and methods referenced without being called, from function
    /// bodies and package-level `var` initializers, in source order.
    pub value_refs: Vec<Callee>,
}

impl FileSyntax {
    pub fn declares_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }
}

/// Parse one Go source file.
pub fn parse_file(path: &Path, source: &str) -> Result<FileSyntax, SyntaxError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| SyntaxError::new(path, 0, format!("failed to load Go grammar: {e}")))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| SyntaxError::new(path, 0, "parser produced no tree"))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(SyntaxError::new(path, first_error_line(root), "syntax error"));
    }

    let src = source.as_bytes();
    let mut file = FileSyntax {
        path: path.to_path_buf(),
        package: String::new(),
        imports: Vec::new(),
        funcs: Vec::new(),
        types: Vec::new(),
        value_refs: Vec::new(),
    };

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "package_clause" => {
                if let Some(name) = child.named_child(0) {
                    file.package = text(name, src).to_string();
                }
            }
            "import_declaration" => collect_imports(child, src, &mut file.imports),
            "type_declaration" => collect_types(child, src, &mut file.types),
            "var_declaration" => collect_value_refs(child, src, &mut file.value_refs),
            "function_declaration" | "method_declaration" => {
                if let Some(body) = child.child_by_field_name("body") {
                    collect_value_refs(body, src, &mut file.value_refs);
                }
                if let Some(decl) = declaration(child, src, path) {
                    file.funcs.push(decl);
                }
            }
            _ => {}
        }
    }

    Ok(file)
}

/// Give user `init` functions their per-package ordinal (`init#1`, `init#2`, ...).
///
/// `files` must hold every file of one package, in the order the loader read them.
pub fn number_init_functions(files: &mut [FileSyntax]) {
    let mut ordinal = 0;
    for decl in files.iter_mut().flat_map(|f| f.funcs.iter_mut()) {
        if decl.receiver.is_none() && decl.name == "init" {
            ordinal += 1;
            decl.name = format!("init#{ordinal}");
        }
    }
}

fn text<'s>(node: Node<'_>, src: &'s [u8]) -> &'s str {
    node.utf8_text(src).unwrap_or_default()
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn first_error_line(root: Node<'_>) -> usize {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return line_of(node);
        }
        let mut cursor = node.walk();
        let mut children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        children.reverse();
        stack.extend(children);
    }
    line_of(root)
}

fn collect_imports(node: Node<'_>, src: &[u8], out: &mut Vec<Import>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_spec" => {
                let Some(path) = child.child_by_field_name("path") else {
                    continue;
                };
                out.push(Import {
                    alias: child.child_by_field_name("name").map(|n| text(n, src).to_string()),
                    path: text(path, src).trim_matches(|c| c == '"' || c == '`').to_string(),
                });
            }
            "import_spec_list" => collect_imports(child, src, out),
            _ => {}
        }
    }
}

fn collect_types(node: Node<'_>, src: &[u8], out: &mut Vec<String>) {
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        if matches!(spec.kind(), "type_spec" | "type_alias") {
            if let Some(name) = spec.child_by_field_name("name") {
                out.push(text(name, src).to_string());
            }
        }
    }
}

/// Identifiers and selectors that are not the function of a call. Most name
/// variables; the call graph keeps only those naming a declared function.
fn collect_value_refs(root: Node<'_>, src: &[u8], out: &mut Vec<Callee>) {
    let mut found: Vec<(usize, Callee)> = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let reference = match node.kind() {
            "identifier" if !is_called(node) && !is_selector_operand(node) && !is_parameter(node) => {
                Some(Callee::Local(text(node, src).to_string()))
            }
            "selector_expression" if !is_called(node) => callee(node, src),
            _ => None,
        };
        if let Some(reference) = reference {
            found.push((node.start_byte(), reference));
        }
        let mut cursor = node.walk();
        stack.extend(node.named_children(&mut cursor));
    }
    found.sort_by_key(|(offset, _)| *offset);
    out.extend(found.into_iter().map(|(_, reference)| reference));
}

fn is_called(node: Node<'_>) -> bool {
    node.parent().is_some_and(|parent| {
        parent.kind() == "call_expression" && parent.child_by_field_name("function") == Some(node)
    })
}

fn is_selector_operand(node: Node<'_>) -> bool {
    node.parent().is_some_and(|parent| parent.kind() == "selector_expression")
}

fn is_parameter(node: Node<'_>) -> bool {
    node.parent().is_some_and(|parent| {
        matches!(parent.kind(), "parameter_declaration" | "variadic_parameter_declaration")
    })
}

fn declaration(node: Node<'_>, src: &[u8], path: &Path) -> Option<FuncDecl> {
    let name = text(node.child_by_field_name("name")?, src).to_string();
    let receiver = if node.kind() == "method_declaration" {
        Some(receiver(node.child_by_field_name("receiver")?, src)?)
    } else {
        None
    };

    let body = node.child_by_field_name("body");
    let (calls, blocks) = match body {
        Some(body) => (call_sites(body, src), estimate_blocks(body)),
        None => (Vec::new(), 0),
    };

    Some(FuncDecl {
        name,
        receiver,
        file: path.to_path_buf(),
        line: line_of(node),
        end_line: node.end_position().row + 1,
        has_body: body.is_some(),
        blocks,
        calls,
    })
}

fn receiver(list: Node<'_>, src: &[u8]) -> Option<Receiver> {
    let mut cursor = list.walk();
    let param = list.named_children(&mut cursor).find(|n| n.kind() == "parameter_declaration")?;
    let mut ty = param.child_by_field_name("type")?;
    let mut pointer = false;
    if ty.kind() == "pointer_type" {
        pointer = true;
        ty = ty.named_child(0)?;
    }
    if ty.kind() == "generic_type" {
        ty = ty.child_by_field_name("type")?;
    }
    Some(Receiver { type_name: text(ty, src).to_string(), pointer })
}

fn call_sites(body: Node<'_>, src: &[u8]) -> Vec<CallSite> {
    let mut found: Vec<(usize, CallSite)> = Vec::new();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if node.kind() == "call_expression" {
            if let Some(callee) = node.child_by_field_name("function").and_then(|f| callee(f, src))
            {
                found.push((node.start_byte(), CallSite { callee, line: line_of(node) }));
            }
        }
        let mut cursor = node.walk();
        stack.extend(node.named_children(&mut cursor));
    }
    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, site)| site).collect()
}

fn callee(node: Node<'_>, src: &[u8]) -> Option<Callee> {
    match node.kind() {
        "identifier" => Some(Callee::Local(text(node, src).to_string())),
        "selector_expression" => {
            let name = text(node.child_by_field_name("field")?, src).to_string();
            let operand = node.child_by_field_name("operand")?;
            if operand.kind() == "identifier" {
                Some(Callee::Qualified { qualifier: text(operand, src).to_string(), name })
            } else {
                Some(Callee::Method(name))
            }
        }
        "parenthesized_expression" => callee(node.named_child(0)?, src),
        // Explicit instantiation `Map[int](xs)`, or a call through `fns[i]`.
        "index_expression" => callee(node.child_by_field_name("operand")?, src),
        "call_expression" => Some(Callee::Dynamic),
        // Immediately invoked literals: their calls already belong to the declaration.
        _ => None,
    }
}
