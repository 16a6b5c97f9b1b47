//! Operation classification: a single-pass walk of one method body that
//! partitions every leaf reference into calls, reads, and writes. The walk
//! carries an explicit write-context flag; no execution is simulated.

use crate::model::{SymbolRef, SymbolSet};
use crate::semantic::{Argument, Operation, SemanticService};
use anyhow::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyOptions {
    /// Record resolved property getters/setters in `calls` in addition to the
    /// property itself in `reads`/`writes`.
    pub accessors_as_calls: bool,
}

#[derive(Debug, Default, Clone)]
pub struct Classification {
    pub calls: SymbolSet,
    pub reads: SymbolSet,
    pub writes: SymbolSet,
}

impl Classification {
    pub fn merge(&mut self, other: Classification) {
        self.calls.merge(other.calls);
        self.reads.merge(other.reads);
        self.writes.merge(other.writes);
    }
}

/// Classify one method body. `Ok(None)` means the method is resolvable only
/// from metadata and has no body to classify.
pub fn classify(
    svc: &dyn SemanticService,
    method: &SymbolRef,
    opts: &ClassifyOptions,
) -> Result<Option<Classification>> {
    let Some(tree) = svc.operation_tree(&method.id)? else {
        return Ok(None);
    };
    let mut out = Classification::default();
    walk(&tree, false, opts, &mut out);
    Ok(Some(out))
}

/// Classify an already-fetched operation tree.
pub fn classify_tree(tree: &Operation, opts: &ClassifyOptions) -> Classification {
    let mut out = Classification::default();
    walk(tree, false, opts, &mut out);
    out
}

fn walk(op: &Operation, write: bool, opts: &ClassifyOptions, out: &mut Classification) {
    match op {
        Operation::Invocation {
            target,
            arguments,
            receiver,
            ..
        } => {
            out.calls.insert(target.clone());
            if let Some(receiver) = receiver {
                walk(receiver, false, opts, out);
            }
            walk_arguments(arguments, opts, out);
        }
        Operation::ObjectCreation {
            constructor,
            arguments,
            ..
        } => {
            out.calls.insert(constructor.clone());
            walk_arguments(arguments, opts, out);
        }
        Operation::FieldReference { field, instance } => {
            record(field.clone(), write, out);
            if let Some(instance) = instance {
                walk(instance, false, opts, out);
            }
        }
        Operation::EventReference { event, instance } => {
            record(event.clone(), write, out);
            if let Some(instance) = instance {
                walk(instance, false, opts, out);
            }
        }
        Operation::PropertyReference {
            property,
            getter,
            setter,
            instance,
        } => {
            record(property.clone(), write, out);
            if opts.accessors_as_calls {
                let accessor = if write { setter } else { getter };
                if let Some(accessor) = accessor {
                    out.calls.insert(accessor.clone());
                }
            }
            // The receiver is evaluated to reach the property, read context
            // regardless of what happens to the property itself.
            if let Some(instance) = instance {
                walk(instance, false, opts, out);
            }
        }
        Operation::Assignment { target, value } => {
            // Explicit contexts for both sides, not the ambient one.
            walk(target, true, opts, out);
            walk(value, false, opts, out);
        }
        Operation::CompoundAssignment { target, value } => {
            // The target's prior value is read, then a new value is written.
            walk(target, false, opts, out);
            walk(target, true, opts, out);
            walk(value, false, opts, out);
        }
        Operation::IncrementDecrement { target } => {
            walk(target, false, opts, out);
            walk(target, true, opts, out);
        }
        Operation::Block { children } | Operation::Other { children } => {
            for child in children {
                walk(child, write, opts, out);
            }
        }
    }
}

fn walk_arguments(arguments: &[Argument], opts: &ClassifyOptions, out: &mut Classification) {
    for arg in arguments {
        // ref/out arguments hand the callee a writable location.
        walk(&arg.value, arg.by_ref, opts, out);
    }
}

fn record(symbol: SymbolRef, write: bool, out: &mut Classification) {
    if write {
        out.writes.insert(symbol);
    } else {
        out.reads.insert(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SymbolKind, SymbolRef};
    use crate::semantic::{Argument, Operation};

    fn field(id: &str) -> SymbolRef {
        SymbolRef::new(SymbolKind::Field, id)
    }

    fn method(id: &str) -> SymbolRef {
        SymbolRef::new(SymbolKind::Method, id)
    }

    fn prop(id: &str) -> Operation {
        Operation::property(
            SymbolRef::new(SymbolKind::Property, id),
            Some(method(&format!("{id}.get"))),
            Some(method(&format!("{id}.set"))),
        )
    }

    fn has(set: &SymbolSet, id: &str) -> bool {
        set.iter().any(|s| s.id.as_str() == id)
    }

    #[test]
    fn assignment_splits_contexts() {
        let tree = Operation::assign(
            Operation::field(field("T.a")),
            Operation::field(field("T.b")),
        );
        let c = classify_tree(&tree, &ClassifyOptions::default());
        assert!(has(&c.writes, "T.a"));
        assert!(has(&c.reads, "T.b"));
        assert!(!has(&c.reads, "T.a"));
    }

    #[test]
    fn compound_assignment_reads_and_writes_target() {
        let tree = Operation::compound_assign(
            Operation::field(field("T.count")),
            Operation::field(field("T.step")),
        );
        let c = classify_tree(&tree, &ClassifyOptions::default());
        assert!(has(&c.reads, "T.count"));
        assert!(has(&c.writes, "T.count"));
        assert!(has(&c.reads, "T.step"));
        assert!(!has(&c.writes, "T.step"));
    }

    #[test]
    fn increment_reads_and_writes_target() {
        let tree = Operation::increment(Operation::field(field("T.count")));
        let c = classify_tree(&tree, &ClassifyOptions::default());
        assert!(has(&c.reads, "T.count"));
        assert!(has(&c.writes, "T.count"));
    }

    #[test]
    fn by_ref_argument_is_a_write() {
        let tree = Operation::invoke(
            method("T.Callee(Int32,Int32)"),
            vec![
                Argument::value(Operation::field(field("T.plain"))),
                Argument::by_ref(Operation::field(field("T.out"))),
            ],
        );
        let c = classify_tree(&tree, &ClassifyOptions::default());
        assert!(has(&c.reads, "T.plain"));
        assert!(has(&c.writes, "T.out"));
        assert!(has(&c.calls, "T.Callee(Int32,Int32)"));
    }

    #[test]
    fn accessors_recorded_as_calls_only_when_enabled() {
        let tree = Operation::assign(prop("T.Name"), prop("T.Other"));
        let quiet = classify_tree(&tree, &ClassifyOptions::default());
        assert!(quiet.calls.is_empty());
        assert!(has(&quiet.writes, "T.Name"));
        assert!(has(&quiet.reads, "T.Other"));

        let loud = classify_tree(
            &tree,
            &ClassifyOptions {
                accessors_as_calls: true,
            },
        );
        assert!(has(&loud.calls, "T.Name.set"));
        assert!(has(&loud.calls, "T.Other.get"));
        assert!(!has(&loud.calls, "T.Name.get"));
    }

    #[test]
    fn compound_property_marks_both_accessors() {
        let tree = Operation::compound_assign(prop("T.Total"), Operation::field(field("T.step")));
        let c = classify_tree(
            &tree,
            &ClassifyOptions {
                accessors_as_calls: true,
            },
        );
        assert!(has(&c.calls, "T.Total.get"));
        assert!(has(&c.calls, "T.Total.set"));
        assert!(has(&c.reads, "T.Total"));
        assert!(has(&c.writes, "T.Total"));
    }

    #[test]
    fn invocation_target_independent_of_write_context() {
        // An invocation on the RHS inside an assignment still lands in calls.
        let tree = Operation::assign(
            Operation::field(field("T.a")),
            Operation::invoke(method("T.Produce()"), Vec::new()),
        );
        let c = classify_tree(&tree, &ClassifyOptions::default());
        assert!(has(&c.calls, "T.Produce()"));
    }

    #[test]
    fn duplicate_call_sites_collapse() {
        let tree = Operation::block(vec![
            Operation::invoke(method("T.Log(String)"), Vec::new()),
            Operation::invoke(method("T.Log(String)"), Vec::new()),
        ]);
        let c = classify_tree(&tree, &ClassifyOptions::default());
        assert_eq!(c.calls.len(), 1);
    }

    #[test]
    fn unknown_kinds_propagate_ambient_context() {
        // A write context flowing through an opaque wrapper still applies.
        let tree = Operation::assign(
            Operation::Other {
                children: vec![Operation::field(field("T.wrapped"))],
            },
            Operation::field(field("T.src")),
        );
        let c = classify_tree(&tree, &ClassifyOptions::default());
        assert!(has(&c.writes, "T.wrapped"));
    }
}
