//! Class-hierarchy-style call graph construction over parsed declarations.
//!
//! Static calls resolve to their declaration. Every call whose receiver is a
//! value goes through a dispatch node per method name that fans out to every
//! method of that name in the parsed packages, which over-approximates
//! interface calls without type information. Calls through function values
//! (parameters, struct fields, func-typed variables) go through one more
//! dispatch node that fans out to every function or method referenced as a
//! value anywhere in the parsed packages.

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use super::CallGraph;
use crate::loader::Package;
use crate::model::FunctionId;
use crate::syntax::{Callee, FileSyntax, Import};

/// Package path used for dispatch nodes; no Go import path can be empty.
const DISPATCH_PACKAGE: &str = "";

const FUNC_VALUE_DISPATCH: &str = "dispatch.func-value";

/// Predeclared functions and types; calling one never reaches user code.
const PREDECLARED: &[&str] = &[
    "any", "append", "bool", "byte", "cap", "clear", "close", "comparable", "complex",
    "complex128", "complex64", "copy", "delete", "error", "float32", "float64", "imag", "int",
    "int16", "int32", "int64", "int8", "len", "make", "max", "min", "new", "panic", "print",
    "println", "real", "recover", "rune", "string", "uint", "uint16", "uint32", "uint64",
    "uint8", "uintptr",
];

/// Where one call site leads.
enum Target<'a> {
    Static(NodeIndex),
    /// Every method of this name.
    Methods(&'a str),
    /// Every function referenced as a value.
    FuncValue,
    /// Builtins, conversions and calls into nothing declared.
    Nowhere,
}

/// Build the graph, dispatch nodes included.
pub fn build(packages: &[Package]) -> CallGraph {
    let mut graph = CallGraph::new();
    let mut methods: HashMap<&str, Vec<NodeIndex>> = HashMap::new();

    for pkg in packages {
        for decl in pkg.syntax.iter().flat_map(|f| f.funcs.iter()) {
            let ix = graph.add_function(decl.id(&pkg.import_path));
            if decl.receiver.is_some() {
                methods.entry(decl.name.as_str()).or_default().push(ix);
            }
        }
    }

    let names: HashMap<&str, &str> = packages
        .iter()
        .filter(|p| !p.name.is_empty())
        .map(|p| (p.import_path.as_str(), p.name.as_str()))
        .collect();
    let parsed: HashMap<&str, &Package> = packages
        .iter()
        .filter(|p| !p.syntax.is_empty())
        .map(|p| (p.import_path.as_str(), p))
        .collect();

    let func_values = referenced_functions(packages, &graph, &methods, &names);
    let mut func_value_stub: Option<NodeIndex> = None;
    let mut dispatch: HashMap<&str, NodeIndex> = HashMap::new();

    for pkg in packages {
        for file in &pkg.syntax {
            let scope = FileScope::new(file, &names);
            for decl in &file.funcs {
                let Some(caller) = graph.find(&decl.id(&pkg.import_path)) else {
                    continue;
                };
                for site in &decl.calls {
                    let target = match &site.callee {
                        Callee::Local(name) => {
                            match scope.resolve_local(&graph, &pkg.import_path, name) {
                                Some(ix) => Target::Static(ix),
                                None if PREDECLARED.contains(&name.as_str()) => Target::Nowhere,
                                None if declares_type(pkg, name) => Target::Nowhere,
                                None => Target::FuncValue,
                            }
                        }
                        Callee::Qualified { qualifier, name } => {
                            match scope.aliases.get(qualifier.as_str()) {
                                Some(path) => {
                                    let id = FunctionId::new(*path, name.clone());
                                    match (graph.find(&id), parsed.get(path)) {
                                        (Some(ix), _) => Target::Static(ix),
                                        // Unparsed packages get declaration-less nodes.
                                        (None, None) => Target::Static(graph.add_function(id)),
                                        (None, Some(owner)) if declares_type(owner, name) => {
                                            Target::Nowhere
                                        }
                                        // A func-typed package variable.
                                        (None, Some(_)) => Target::FuncValue,
                                    }
                                }
                                None => value_call(&methods, name),
                            }
                        }
                        Callee::Method(name) => value_call(&methods, name),
                        Callee::Dynamic => Target::FuncValue,
                    };

                    match target {
                        Target::Static(callee) => graph.add_edge(caller, callee, site.line),
                        Target::Methods(method) => {
                            let stub = *dispatch.entry(method).or_insert_with(|| {
                                let stub = graph.add_synthetic(FunctionId::new(
                                    DISPATCH_PACKAGE,
                                    format!("dispatch.{method}"),
                                ));
                                for &implementation in &methods[method] {
                                    graph.add_edge(stub, implementation, 0);
                                }
                                stub
                            });
                            graph.add_edge(caller, stub, site.line);
                        }
                        Target::FuncValue if !func_values.is_empty() => {
                            let stub = *func_value_stub.get_or_insert_with(|| {
                                let stub = graph.add_synthetic(FunctionId::new(
                                    DISPATCH_PACKAGE,
                                    FUNC_VALUE_DISPATCH,
                                ));
                                for &value in &func_values {
                                    graph.add_edge(stub, value, 0);
                                }
                                stub
                            });
                            graph.add_edge(caller, stub, site.line);
                        }
                        Target::FuncValue | Target::Nowhere => {}
                    }
                }
            }
        }
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        dispatch = dispatch.len(),
        func_values = func_values.len(),
        "built call graph"
    );
    graph
}

/// A call on a value: method dispatch when any method has that name,
/// otherwise a call through a func-typed field or variable.
fn value_call<'a>(methods: &HashMap<&str, Vec<NodeIndex>>, name: &'a str) -> Target<'a> {
    if methods.contains_key(name) {
        Target::Methods(name)
    } else {
        Target::FuncValue
    }
}

fn declares_type(pkg: &Package, name: &str) -> bool {
    pkg.syntax.iter().any(|f| f.declares_type(name))
}

/// Declared functions and methods referenced as values, in first-reference order.
fn referenced_functions(
    packages: &[Package],
    graph: &CallGraph,
    methods: &HashMap<&str, Vec<NodeIndex>>,
    names: &HashMap<&str, &str>,
) -> Vec<NodeIndex> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for pkg in packages {
        for file in &pkg.syntax {
            let scope = FileScope::new(file, names);
            for reference in &file.value_refs {
                let resolved: Vec<NodeIndex> = match reference {
                    Callee::Local(name) => {
                        scope.resolve_local(graph, &pkg.import_path, name).into_iter().collect()
                    }
                    Callee::Qualified { qualifier, name } => {
                        match scope.aliases.get(qualifier.as_str()) {
                            Some(path) => {
                                graph.find(&FunctionId::new(*path, name.clone())).into_iter().collect()
                            }
                            // Method value `v.M` or method expression `T.M`.
                            None => methods.get(name.as_str()).cloned().unwrap_or_default(),
                        }
                    }
                    Callee::Method(name) => methods.get(name.as_str()).cloned().unwrap_or_default(),
                    Callee::Dynamic => Vec::new(),
                };
                for ix in resolved {
                    let builtin = graph.node(ix).is_some_and(|n| n.id.is_builtin());
                    if !builtin && seen.insert(ix) {
                        found.push(ix);
                    }
                }
            }
        }
    }
    found
}

/// Import bindings visible in one file.
struct FileScope<'a> {
    aliases: HashMap<String, &'a str>,
    dot_imports: Vec<&'a str>,
}

impl<'a> FileScope<'a> {
    fn new(file: &'a FileSyntax, names: &HashMap<&str, &str>) -> Self {
        let mut aliases = HashMap::new();
        let mut dot_imports = Vec::new();
        for import in &file.imports {
            if import.is_blank() {
                continue;
            }
            if import.is_dot() {
                dot_imports.push(import.path.as_str());
                continue;
            }
            aliases.insert(binding_name(import, names), import.path.as_str());
        }
        Self { aliases, dot_imports }
    }

    fn resolve_local(&self, graph: &CallGraph, package: &str, name: &str) -> Option<NodeIndex> {
        graph.find(&FunctionId::new(package, name)).or_else(|| {
            self.dot_imports.iter().find_map(|path| graph.find(&FunctionId::new(*path, name)))
        })
    }
}

/// Name an import is referred to by inside the file.
fn binding_name(import: &Import, names: &HashMap<&str, &str>) -> String {
    if let Some(alias) = &import.alias {
        return alias.clone();
    }
    if let Some(name) = names.get(import.path.as_str()) {
        return (*name).to_string();
    }
    guess_package_name(&import.path)
}

/// Package name for an import path whose package was not loaded: the last
/// path element, skipping a `/vN` major-version element, without a `.vN`
/// suffix or `go-` prefix.
pub fn guess_package_name(path: &str) -> String {
    let mut elements = path.rsplit('/');
    let mut last = elements.next().unwrap_or(path);
    if is_major_version(last) {
        if let Some(previous) = elements.next() {
            last = previous;
        }
    }
    if let Some((stem, version)) = last.rsplit_once('.') {
        if is_major_version(version) {
            last = stem;
        }
    }
    let last = last.strip_prefix("go-").unwrap_or(last);
    last.replace('-', "_")
}

fn is_major_version(element: &str) -> bool {
    element
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
