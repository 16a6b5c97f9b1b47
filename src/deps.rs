//! Dependency graph construction: bounded-depth breadth-first expansion of
//! the call graph, merging per-method classifications into deduplicated
//! aggregate sets.

use crate::classify::{Classification, ClassifyOptions, classify};
use crate::error::is_fatal;
use crate::model::{DependencyGraph, SymbolId, SymbolRef, SymbolSet};
use crate::semantic::SemanticService;
use crate::util::Deadline;
use anyhow::Result;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct DependencyOptions {
    /// Number of call-graph levels to classify; the root is level 1.
    pub depth: usize,
    /// Resolve callers of the root (one level, never transitive).
    pub include_callers: bool,
    pub classify: ClassifyOptions,
    pub deadline: Deadline,
}

pub fn build(
    svc: &dyn SemanticService,
    root: &SymbolRef,
    opts: &DependencyOptions,
) -> Result<DependencyGraph> {
    let mut aggregate = Classification::default();
    let mut skipped = SymbolSet::new();
    let mut visited: HashSet<SymbolId> = HashSet::new();
    let mut queue: VecDeque<(SymbolRef, usize)> = VecDeque::new();

    visited.insert(root.id.clone());
    queue.push_back((root.clone(), 1));

    while let Some((method, level)) = queue.pop_front() {
        opts.deadline.check()?;

        let classification = match classify(svc, &method, &opts.classify) {
            Ok(Some(classification)) => classification,
            // Metadata-only: stays in the aggregate (its caller put it in
            // `calls`) but expands no further.
            Ok(None) => continue,
            Err(err) => {
                if is_fatal(&err) {
                    return Err(err);
                }
                skipped.insert(method);
                continue;
            }
        };

        if level < opts.depth {
            for call in classification.calls.iter() {
                if call.kind.is_invocable() && !visited.contains(&call.id) {
                    visited.insert(call.id.clone());
                    queue.push_back((call.clone(), level + 1));
                }
            }
        }
        aggregate.merge(classification);
    }

    let callers = if opts.include_callers {
        opts.deadline.check()?;
        Some(svc.find_callers(&root.id)?)
    } else {
        None
    };

    Ok(DependencyGraph {
        root: root.clone(),
        calls: aggregate.calls.into_sorted_vec(),
        reads: aggregate.reads.into_sorted_vec(),
        writes: aggregate.writes.into_sorted_vec(),
        callers,
        skipped: skipped.into_sorted_vec(),
    })
}
