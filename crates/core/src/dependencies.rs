//! Module-scoped dependency extraction.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use crate::analysis::AnalysisDataset;
use crate::error::{DeepcoverError, DeepcoverResult};
use crate::model::FunctionId;
use crate::module::ModuleResolver;
use crate::syntax::FuncDecl;

/// A first-party function reached from a target. Identity is the `FunctionId`.
#[derive(Debug, Clone)]
pub struct Dependency<'a> {
    pub module: String,
    pub id: FunctionId,
    pub node: NodeIndex,
    pub decl: Option<&'a FuncDecl>,
    pub weight: u32,
}

impl PartialEq for Dependency<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Dependency<'_> {}

impl Hash for Dependency<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Breadth-first walk from `root`, emitting every function of the root's module.
///
/// A node outside the root's module is neither emitted nor expanded, so the
/// walk never leaves the module. Built-in hooks are skipped the same way.
pub fn extract<'a>(
    dataset: &'a AnalysisDataset,
    resolver: &ModuleResolver<'_>,
    root: Option<NodeIndex>,
) -> DeepcoverResult<Vec<Dependency<'a>>> {
    let root = root.ok_or(DeepcoverError::NilRoot)?;
    let root_id = &dataset.graph.node(root).ok_or(DeepcoverError::NilRoot)?.id;
    let module = resolver
        .resolve(&root_id.package)?
        .ok_or_else(|| DeepcoverError::RootNotInModule(root_id.clone()))?;

    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([root]);
    let mut out = Vec::new();

    while let Some(ix) = queue.pop_front() {
        if !visited.insert(ix) {
            continue;
        }
        let Some(node) = dataset.graph.node(ix) else {
            continue;
        };
        if node.id.is_builtin() {
            continue;
        }
        if resolver.resolve(&node.id.package)?.as_deref() != Some(module.as_str()) {
            continue;
        }

        let decl = dataset.decl(&node.id);
        out.push(Dependency {
            module: module.clone(),
            id: node.id.clone(),
            node: ix,
            decl,
            weight: decl.map_or(0, FuncDecl::weight),
        });

        queue.extend(dataset.graph.callees(ix).into_iter().filter(|c| !visited.contains(c)));
    }

    debug!(root = %root_id, dependencies = out.len(), "extracted dependencies");
    Ok(out)
}

/// Dependency sets of every target, keyed and ordered by target.
pub fn extract_all<'a>(
    dataset: &'a AnalysisDataset,
    resolver: &ModuleResolver<'_>,
) -> DeepcoverResult<BTreeMap<FunctionId, Vec<Dependency<'a>>>> {
    let mut all = BTreeMap::new();
    for (id, &node) in &dataset.targets {
        all.insert(id.clone(), extract(dataset, resolver, Some(node))?);
    }
    Ok(all)
}
