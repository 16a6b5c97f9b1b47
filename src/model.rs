use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Stable identity of a symbol inside one workspace snapshot. Deduplication
/// and visited-set checks key on this, never on display text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub String);

impl SymbolId {
    pub fn new(id: impl Into<String>) -> Self {
        SymbolId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Namespace,
    Class,
    Interface,
    Struct,
    Method,
    Constructor,
    Property,
    Field,
    Event,
    Other,
}

impl SymbolKind {
    /// Kinds that can own an operation tree and participate in call-graph
    /// expansion.
    pub fn is_invocable(self) -> bool {
        matches!(self, SymbolKind::Method | SymbolKind::Constructor)
    }

    pub fn is_type(self) -> bool {
        matches!(self, SymbolKind::Class | SymbolKind::Interface | SymbolKind::Struct)
    }
}

/// Source position, 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: i64,
    pub column: i64,
}

impl Location {
    pub fn new(file: impl Into<String>, line: i64, column: i64) -> Self {
        Location {
            file: file.into(),
            line,
            column,
        }
    }
}

/// Opaque handle to a symbol resolved by the semantic service. Immutable
/// once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub id: SymbolId,
    pub display: String,
    pub kind: SymbolKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl SymbolRef {
    pub fn new(kind: SymbolKind, id: impl Into<String>) -> Self {
        let id = id.into();
        SymbolRef {
            display: id.clone(),
            id: SymbolId(id),
            kind,
            container: None,
            location: None,
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// What an analysis request points at: exactly one of the two forms.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetDescriptor {
    QualifiedName(String),
    Position {
        file: String,
        line: i64,
        column: i64,
    },
}

/// Outcome of symbol resolution. Ambiguity is a first-class result, never a
/// guessed pick.
#[derive(Debug, Clone)]
pub enum ResolutionResult {
    Resolved(SymbolRef),
    Ambiguous(Vec<SymbolRef>),
    NotFound,
}

/// Order-preserving set of symbols deduplicated by identity.
#[derive(Debug, Default, Clone)]
pub struct SymbolSet {
    seen: HashSet<SymbolId>,
    items: Vec<SymbolRef>,
}

impl SymbolSet {
    pub fn new() -> Self {
        SymbolSet::default()
    }

    pub fn insert(&mut self, symbol: SymbolRef) -> bool {
        if self.seen.insert(symbol.id.clone()) {
            self.items.push(symbol);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &SymbolId) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolRef> {
        self.items.iter()
    }

    pub fn merge(&mut self, other: SymbolSet) {
        for item in other.items {
            self.insert(item);
        }
    }

    /// Consume into a deterministic list: lexicographic by display, then id.
    pub fn into_sorted_vec(self) -> Vec<SymbolRef> {
        let mut items = self.items;
        items.sort_by(|a, b| a.display.cmp(&b.display).then_with(|| a.id.cmp(&b.id)));
        items
    }
}

/// One caller of the analysis root, with call sites and a flag for whether
/// the call reaches the root directly or through a virtual-dispatch boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerInfo {
    pub caller: SymbolRef,
    pub direct: bool,
    pub call_sites: Vec<Location>,
}

/// Aggregate result of dependency analysis for one root method.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    pub root: SymbolRef,
    pub calls: Vec<SymbolRef>,
    pub reads: Vec<SymbolRef>,
    pub writes: Vec<SymbolRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callers: Option<Vec<CallerInfo>>,
    /// Call targets that were skipped because classification failed on them.
    pub skipped: Vec<SymbolRef>,
}

/// Node of the descendants tree, children ordered by display name.
#[derive(Debug, Clone, Serialize)]
pub struct TypeTreeNode {
    pub symbol: SymbolRef,
    pub children: Vec<TypeTreeNode>,
}

impl TypeTreeNode {
    pub fn leaf(symbol: SymbolRef) -> Self {
        TypeTreeNode {
            symbol,
            children: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TypeTreeNode::depth)
            .max()
            .unwrap_or(0)
    }
}

/// Inheritance and implementation relationships of one type.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipGraph {
    pub root: SymbolRef,
    /// Base-type chain, nearest ancestor first.
    pub ancestors: Vec<SymbolRef>,
    pub interfaces: Vec<SymbolRef>,
    pub descendants: Vec<SymbolRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descendants_tree: Option<TypeTreeNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<BTreeMap<String, Vec<SymbolRef>>>,
}

/// One slice of a list-shaped result.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Snapshot-level counts reported by `workspace_status`.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStats {
    pub types: usize,
    pub members: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_set_dedups_by_identity_not_display() {
        let mut set = SymbolSet::new();
        let a = SymbolRef::new(SymbolKind::Method, "Demo.Foo.Run()");
        let mut b = SymbolRef::new(SymbolKind::Method, "Demo.Foo.Run()");
        b.display = "Foo.Run".to_string();
        assert!(set.insert(a));
        assert!(!set.insert(b));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn sorted_vec_is_deterministic() {
        let mut set = SymbolSet::new();
        set.insert(SymbolRef::new(SymbolKind::Field, "Demo.B.count"));
        set.insert(SymbolRef::new(SymbolKind::Field, "Demo.A.count"));
        let sorted = set.into_sorted_vec();
        assert_eq!(sorted[0].display, "Demo.A.count");
        assert_eq!(sorted[1].display, "Demo.B.count");
    }

    #[test]
    fn tree_depth_counts_levels() {
        let mut root = TypeTreeNode::leaf(SymbolRef::new(SymbolKind::Class, "A"));
        root.children.push(TypeTreeNode::leaf(SymbolRef::new(
            SymbolKind::Class,
            "B",
        )));
        assert_eq!(root.depth(), 2);
    }
}
