//! Boundary to the semantic analysis engine. The analysis layer never parses
//! or type-checks source itself; it consumes an immutable snapshot through
//! `SemanticService` and treats workspace replacement as an atomic swap.

use crate::error::AnalysisError;
use crate::model::{BackendStats, CallerInfo, Location, SymbolId, SymbolRef};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Semantic, type-resolved representation of a method body. A closed set of
/// operation kinds; anything without classification significance is `Other`
/// and only forwards its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Invocation {
        target: SymbolRef,
        #[serde(default)]
        arguments: Vec<Argument>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiver: Option<Box<Operation>>,
        /// Call-site position when the model records one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        site: Option<Location>,
    },
    ObjectCreation {
        constructor: SymbolRef,
        #[serde(default)]
        arguments: Vec<Argument>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        site: Option<Location>,
    },
    FieldReference {
        field: SymbolRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance: Option<Box<Operation>>,
    },
    PropertyReference {
        property: SymbolRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        getter: Option<SymbolRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        setter: Option<SymbolRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance: Option<Box<Operation>>,
    },
    EventReference {
        event: SymbolRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance: Option<Box<Operation>>,
    },
    Assignment {
        target: Box<Operation>,
        value: Box<Operation>,
    },
    CompoundAssignment {
        target: Box<Operation>,
        value: Box<Operation>,
    },
    IncrementDecrement {
        target: Box<Operation>,
    },
    Block {
        #[serde(default)]
        children: Vec<Operation>,
    },
    Other {
        #[serde(default)]
        children: Vec<Operation>,
    },
}

impl Operation {
    pub fn block(children: Vec<Operation>) -> Self {
        Operation::Block { children }
    }

    pub fn invoke(target: SymbolRef, arguments: Vec<Argument>) -> Self {
        Operation::Invocation {
            target,
            arguments,
            receiver: None,
            site: None,
        }
    }

    pub fn construct(constructor: SymbolRef, arguments: Vec<Argument>) -> Self {
        Operation::ObjectCreation {
            constructor,
            arguments,
            site: None,
        }
    }

    pub fn field(field: SymbolRef) -> Self {
        Operation::FieldReference {
            field,
            instance: None,
        }
    }

    pub fn property(property: SymbolRef, getter: Option<SymbolRef>, setter: Option<SymbolRef>) -> Self {
        Operation::PropertyReference {
            property,
            getter,
            setter,
            instance: None,
        }
    }

    pub fn assign(target: Operation, value: Operation) -> Self {
        Operation::Assignment {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn compound_assign(target: Operation, value: Operation) -> Self {
        Operation::CompoundAssignment {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn increment(target: Operation) -> Self {
        Operation::IncrementDecrement {
            target: Box::new(target),
        }
    }
}

/// One invocation argument. `by_ref` covers ref/out passing modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argument {
    #[serde(default)]
    pub by_ref: bool,
    pub value: Operation,
}

impl Argument {
    pub fn value(value: Operation) -> Self {
        Argument {
            by_ref: false,
            value,
        }
    }

    pub fn by_ref(value: Operation) -> Self {
        Argument {
            by_ref: true,
            value,
        }
    }
}

/// Primitive operations the analysis layer needs from the compiler/workspace
/// side. Implementations must be safe to share across concurrent requests;
/// every method is a pure read of one snapshot.
pub trait SemanticService: Send + Sync {
    /// Exact qualified-name lookup of a type.
    fn find_type_by_qualified_name(&self, name: &str) -> Result<Option<SymbolRef>>;

    /// Members of `type_id` with the given simple name (all overloads).
    fn find_members_by_name(&self, type_id: &SymbolId, name: &str) -> Result<Vec<SymbolRef>>;

    /// Every constructor and method of `type_id`, synthetic ones excluded.
    fn invocable_members(&self, type_id: &SymbolId) -> Result<Vec<SymbolRef>>;

    /// Smallest enclosing declaration at a source position.
    fn find_symbol_at_position(&self, file: &str, line: i64, column: i64) -> Result<Option<SymbolRef>>;

    /// Declared parameter type names of a method or constructor.
    fn parameter_types(&self, member: &SymbolId) -> Result<Vec<String>>;

    /// Operation tree of a method body; `None` for metadata-only methods.
    fn operation_tree(&self, method: &SymbolId) -> Result<Option<Operation>>;

    /// The property a getter/setter method belongs to, if any.
    fn containing_property(&self, method: &SymbolId) -> Result<Option<SymbolRef>>;

    fn find_references(&self, symbol: &SymbolId) -> Result<Vec<Location>>;

    /// Immediate base type, `None` at a root.
    fn base_type(&self, type_id: &SymbolId) -> Result<Option<SymbolRef>>;

    /// Interfaces declared directly on the type (no inherited or transitive
    /// entries).
    fn declared_interfaces(&self, type_id: &SymbolId) -> Result<Vec<SymbolRef>>;

    /// Full transitive interface set of the type.
    fn all_interfaces(&self, type_id: &SymbolId) -> Result<Vec<SymbolRef>>;

    fn find_derived_types(&self, type_id: &SymbolId, transitive: bool) -> Result<Vec<SymbolRef>>;

    fn find_derived_interfaces(&self, type_id: &SymbolId, transitive: bool) -> Result<Vec<SymbolRef>>;

    /// Types implementing an interface, or members implementing an interface
    /// member, solution-wide.
    fn find_implementations(&self, symbol: &SymbolId) -> Result<Vec<SymbolRef>>;

    fn find_overrides(&self, member: &SymbolId) -> Result<Vec<SymbolRef>>;

    /// Virtual/abstract/overridable members declared by the type.
    fn overridable_members(&self, type_id: &SymbolId) -> Result<Vec<SymbolRef>>;

    fn find_callers(&self, method: &SymbolId) -> Result<Vec<CallerInfo>>;

    /// In-source declaration of the symbol, `None` for metadata symbols.
    fn find_source_definition(&self, symbol: &SymbolId) -> Result<Option<SymbolRef>>;

    fn stats(&self) -> BackendStats;
}

/// Handle to the current workspace snapshot. Replacement is an atomic swap:
/// in-flight requests keep the `Arc` they captured, new requests see the new
/// snapshot.
#[derive(Default)]
pub struct Workspace {
    current: RwLock<Option<Arc<dyn SemanticService>>>,
}

impl Workspace {
    pub fn empty() -> Self {
        Workspace::default()
    }

    pub fn with(service: Arc<dyn SemanticService>) -> Self {
        Workspace {
            current: RwLock::new(Some(service)),
        }
    }

    /// Capture the live snapshot, or report `BackendUnavailable`.
    ///
    /// The slot holds nothing but an `Arc` swap, so a lock poisoned by a
    /// panicking holder still contains a coherent value; recover it rather
    /// than failing every later request.
    pub fn snapshot(&self) -> Result<Arc<dyn SemanticService>> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| AnalysisError::BackendUnavailable.into())
    }

    pub fn replace(&self, service: Arc<dyn SemanticService>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(service);
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
