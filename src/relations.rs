//! Relationship graph construction: ancestor chains, transitive interface
//! sets, and depth-bounded descendant trees rebuilt from one flat query.

use crate::model::{RelationshipGraph, SymbolId, SymbolKind, SymbolRef, SymbolSet, TypeTreeNode};
use crate::semantic::SemanticService;
use crate::util::Deadline;
use anyhow::Result;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Up,
    Down,
    #[default]
    Both,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Direction> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" | "ancestors" => Some(Direction::Up),
            "down" | "descendants" => Some(Direction::Down),
            "both" => Some(Direction::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelationshipOptions {
    pub direction: Direction,
    /// Maximum descendant tree depth below the root; deeper nodes are
    /// omitted, not an error.
    pub max_depth: usize,
    /// Keep only ancestors with an in-source declaration.
    pub source_only: bool,
    pub include_overrides: bool,
    pub deadline: Deadline,
}

pub fn build(
    svc: &dyn SemanticService,
    root: &SymbolRef,
    opts: &RelationshipOptions,
) -> Result<RelationshipGraph> {
    let up = opts.direction != Direction::Down;
    let down = opts.direction != Direction::Up;

    let ancestors = if up {
        ancestor_chain(svc, root, opts)?
    } else {
        Vec::new()
    };

    let interfaces = if up {
        let mut set = SymbolSet::new();
        for interface in svc.all_interfaces(&root.id)? {
            set.insert(interface);
        }
        set.into_sorted_vec()
    } else {
        Vec::new()
    };

    let (descendants, descendants_tree) = if down {
        let flat = flat_descendants(svc, root)?;
        let tree = build_tree(svc, root, &flat, opts)?;
        (flat.into_sorted_vec(), Some(tree))
    } else {
        (Vec::new(), None)
    };

    let overrides = if opts.include_overrides {
        opts.deadline.check()?;
        let mut map = std::collections::BTreeMap::new();
        for member in svc.overridable_members(&root.id)? {
            let mut found = SymbolSet::new();
            for overriding in svc.find_overrides(&member.id)? {
                found.insert(overriding);
            }
            map.insert(member.display.clone(), found.into_sorted_vec());
        }
        Some(map)
    } else {
        None
    };

    Ok(RelationshipGraph {
        root: root.clone(),
        ancestors,
        interfaces,
        descendants,
        descendants_tree,
        overrides,
    })
}

/// Single-inheritance base chain, nearest ancestor first. A visited guard
/// keeps malformed cyclic models from looping.
fn ancestor_chain(
    svc: &dyn SemanticService,
    root: &SymbolRef,
    opts: &RelationshipOptions,
) -> Result<Vec<SymbolRef>> {
    let mut out = Vec::new();
    let mut seen: HashSet<SymbolId> = HashSet::new();
    seen.insert(root.id.clone());
    let mut current = svc.base_type(&root.id)?;
    while let Some(ancestor) = current {
        opts.deadline.check()?;
        if !seen.insert(ancestor.id.clone()) {
            break;
        }
        current = svc.base_type(&ancestor.id)?;
        if opts.source_only {
            match svc.find_source_definition(&ancestor.id)? {
                Some(definition) => out.push(definition),
                None => continue,
            }
        } else {
            out.push(ancestor);
        }
    }
    Ok(out)
}

/// One flat transitive query: derived interfaces plus implementations for an
/// interface root, derived types for a class root.
fn flat_descendants(svc: &dyn SemanticService, root: &SymbolRef) -> Result<SymbolSet> {
    let mut set = SymbolSet::new();
    if root.kind == SymbolKind::Interface {
        for derived in svc.find_derived_interfaces(&root.id, true)? {
            set.insert(derived);
        }
        for implementation in svc.find_implementations(&root.id)? {
            set.insert(implementation);
        }
    } else {
        for derived in svc.find_derived_types(&root.id, true)? {
            set.insert(derived);
        }
    }
    Ok(set)
}

/// Reconstruct the tree by matching each descendant's immediate parent link
/// against the flat set. Classes hang off their base type; interfaces hang
/// off a directly declared interface. Nodes whose parent is outside the set
/// (or beyond max_depth) are omitted.
fn build_tree(
    svc: &dyn SemanticService,
    root: &SymbolRef,
    flat: &SymbolSet,
    opts: &RelationshipOptions,
) -> Result<TypeTreeNode> {
    let mut children_of: HashMap<SymbolId, Vec<SymbolRef>> = HashMap::new();
    for node in flat.iter() {
        opts.deadline.check()?;
        let parent = immediate_parent(svc, root, flat, node)?;
        if let Some(parent) = parent {
            children_of.entry(parent).or_default().push(node.clone());
        }
    }
    for children in children_of.values_mut() {
        children.sort_by(|a, b| a.display.cmp(&b.display).then_with(|| a.id.cmp(&b.id)));
    }
    Ok(expand(root, &children_of, opts.max_depth))
}

fn immediate_parent(
    svc: &dyn SemanticService,
    root: &SymbolRef,
    flat: &SymbolSet,
    node: &SymbolRef,
) -> Result<Option<SymbolId>> {
    if node.kind == SymbolKind::Interface {
        // Deterministic pick when several declared interfaces qualify.
        let mut candidates: Vec<SymbolRef> = svc
            .declared_interfaces(&node.id)?
            .into_iter()
            .filter(|p| p.id == root.id || flat.contains(&p.id))
            .collect();
        candidates.sort_by(|a, b| a.display.cmp(&b.display));
        return Ok(candidates.into_iter().next().map(|p| p.id));
    }
    if root.kind == SymbolKind::Interface {
        // Implementing type under an interface root: attach to the most
        // derived link present in the set.
        if let Some(base) = svc.base_type(&node.id)? {
            if base.id == root.id || flat.contains(&base.id) {
                return Ok(Some(base.id));
            }
        }
        let mut candidates: Vec<SymbolRef> = svc
            .declared_interfaces(&node.id)?
            .into_iter()
            .filter(|p| p.id == root.id || flat.contains(&p.id))
            .collect();
        candidates.sort_by(|a, b| a.display.cmp(&b.display));
        return Ok(candidates.into_iter().next().map(|p| p.id));
    }
    Ok(svc
        .base_type(&node.id)?
        .filter(|base| base.id == root.id || flat.contains(&base.id))
        .map(|base| base.id))
}

fn expand(
    symbol: &SymbolRef,
    children_of: &HashMap<SymbolId, Vec<SymbolRef>>,
    remaining: usize,
) -> TypeTreeNode {
    let mut node = TypeTreeNode::leaf(symbol.clone());
    if remaining == 0 {
        return node;
    }
    if let Some(children) = children_of.get(&symbol.id) {
        for child in children {
            node.children.push(expand(child, children_of, remaining - 1));
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemberDecl, MemoryBackend, SemanticModel, Span, TypeDecl};

    fn hierarchy() -> MemoryBackend {
        let model = SemanticModel::new(vec![
            TypeDecl::class("Demo.Base")
                .metadata_only()
                .member(MemberDecl::method("Touch").overridable()),
            TypeDecl::class("Demo.Animal")
                .with_base("Demo.Base")
                .at(Span::new("animal.cs", 1, 1, 20, 2))
                .implements("Demo.INamed"),
            TypeDecl::class("Demo.Dog")
                .with_base("Demo.Animal")
                .at(Span::new("dog.cs", 1, 1, 20, 2)),
            TypeDecl::class("Demo.Puppy")
                .with_base("Demo.Dog")
                .at(Span::new("puppy.cs", 1, 1, 20, 2)),
            TypeDecl::class("Demo.Cat")
                .with_base("Demo.Animal")
                .at(Span::new("cat.cs", 1, 1, 20, 2)),
            TypeDecl::interface("Demo.INamed"),
        ]);
        MemoryBackend::new(model).unwrap()
    }

    fn opts(max_depth: usize) -> RelationshipOptions {
        RelationshipOptions {
            direction: Direction::Both,
            max_depth,
            source_only: false,
            include_overrides: false,
            deadline: Deadline::after_ms(60_000),
        }
    }

    fn root(svc: &MemoryBackend, name: &str) -> SymbolRef {
        use crate::semantic::SemanticService;
        svc.find_type_by_qualified_name(name).unwrap().unwrap()
    }

    #[test]
    fn ancestors_nearest_first() {
        let svc = hierarchy();
        let graph = build(&svc, &root(&svc, "Demo.Puppy"), &opts(5)).unwrap();
        let names: Vec<&str> = graph.ancestors.iter().map(|a| a.display.as_str()).collect();
        assert_eq!(names, vec!["Demo.Dog", "Demo.Animal", "Demo.Base"]);
    }

    #[test]
    fn source_only_drops_metadata_ancestors() {
        let svc = hierarchy();
        let mut options = opts(5);
        options.source_only = true;
        let graph = build(&svc, &root(&svc, "Demo.Puppy"), &options).unwrap();
        let names: Vec<&str> = graph.ancestors.iter().map(|a| a.display.as_str()).collect();
        assert_eq!(names, vec!["Demo.Dog", "Demo.Animal"]);
    }

    #[test]
    fn interfaces_inherited_through_base_chain() {
        let svc = hierarchy();
        let graph = build(&svc, &root(&svc, "Demo.Dog"), &opts(5)).unwrap();
        let names: Vec<&str> = graph.interfaces.iter().map(|i| i.display.as_str()).collect();
        assert_eq!(names, vec!["Demo.INamed"]);
    }

    #[test]
    fn tree_children_ordered_by_name() {
        let svc = hierarchy();
        let graph = build(&svc, &root(&svc, "Demo.Animal"), &opts(5)).unwrap();
        let tree = graph.descendants_tree.unwrap();
        let children: Vec<&str> = tree
            .children
            .iter()
            .map(|c| c.symbol.display.as_str())
            .collect();
        assert_eq!(children, vec!["Demo.Cat", "Demo.Dog"]);
        assert_eq!(tree.children[1].children[0].symbol.display, "Demo.Puppy");
    }

    #[test]
    fn max_depth_prunes_deeper_nodes() {
        let svc = hierarchy();
        let graph = build(&svc, &root(&svc, "Demo.Animal"), &opts(1)).unwrap();
        let tree = graph.descendants_tree.unwrap();
        // Direct children only; Puppy is omitted, not an error.
        assert_eq!(tree.depth(), 2);
        assert!(tree.children.iter().all(|c| c.children.is_empty()));
        // The flat set still carries the whole transitive closure.
        assert_eq!(graph.descendants.len(), 3);
    }

    #[test]
    fn interface_root_tree_uses_declaration_edges() {
        let svc = hierarchy();
        let graph = build(&svc, &root(&svc, "Demo.INamed"), &opts(5)).unwrap();
        let tree = graph.descendants_tree.unwrap();
        let top: Vec<&str> = tree
            .children
            .iter()
            .map(|c| c.symbol.display.as_str())
            .collect();
        // Animal declares INamed; its subclasses hang off Animal.
        assert_eq!(top, vec!["Demo.Animal"]);
        let under_animal: Vec<&str> = tree.children[0]
            .children
            .iter()
            .map(|c| c.symbol.display.as_str())
            .collect();
        assert_eq!(under_animal, vec!["Demo.Cat", "Demo.Dog"]);
    }

    #[test]
    fn up_direction_skips_descendants() {
        let svc = hierarchy();
        let mut options = opts(5);
        options.direction = Direction::Up;
        let graph = build(&svc, &root(&svc, "Demo.Animal"), &options).unwrap();
        assert!(graph.descendants.is_empty());
        assert!(graph.descendants_tree.is_none());
        assert_eq!(graph.ancestors.len(), 1);
    }
}
