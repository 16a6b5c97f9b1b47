//! In-memory implementation of `SemanticService`, populated from a serialized
//! semantic-model document. The compiler/workspace layer that produces such a
//! document is out of scope here; this backend is the loading seam for the
//! server binary and the model builder used by tests.

use crate::model::{BackendStats, CallerInfo, Location, SymbolId, SymbolKind, SymbolRef};
use crate::semantic::{Operation, SemanticService};
use crate::util::sort_locations;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

/// Source span of a declaration, 1-based and inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub file: String,
    pub start_line: i64,
    pub start_column: i64,
    pub end_line: i64,
    pub end_column: i64,
}

impl Span {
    pub fn new(
        file: impl Into<String>,
        start_line: i64,
        start_column: i64,
        end_line: i64,
        end_column: i64,
    ) -> Self {
        Span {
            file: file.into(),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    fn contains(&self, file: &str, line: i64, column: i64) -> bool {
        if self.file != file {
            return false;
        }
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && column < self.start_column {
            return false;
        }
        if line == self.end_line && column > self.end_column {
            return false;
        }
        true
    }

    /// Rough extent used to pick the smallest enclosing declaration.
    fn weight(&self) -> i64 {
        (self.end_line - self.start_line) * 10_000 + (self.end_column - self.start_column)
    }

    fn start(&self) -> Location {
        Location::new(self.file.clone(), self.start_line, self.start_column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKindDecl {
    #[default]
    Class,
    Interface,
    Struct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKindDecl {
    #[default]
    Method,
    Constructor,
    Property,
    Field,
    Event,
}

/// One member declaration in the model document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberDecl {
    /// Simple name. Empty for constructors (defaults to the type's simple
    /// name).
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: MemberKindDecl,
    /// Declared parameter type names, methods and constructors only.
    #[serde(default)]
    pub params: Vec<String>,
    /// Compiler-generated (e.g. implicit default constructor).
    #[serde(default)]
    pub synthetic: bool,
    /// virtual/abstract/overridable.
    #[serde(default)]
    pub overridable: bool,
    /// Identity of the member this one overrides or implements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<String>,
    /// Resolvable only from metadata: no body, no source location.
    #[serde(default)]
    pub metadata: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Accessor spans, properties only. A property without accessor spans
    /// still gets accessor symbols; they just have no position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getter_span: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setter_span: Option<Span>,
}

impl MemberDecl {
    pub fn method(name: impl Into<String>) -> Self {
        MemberDecl {
            name: name.into(),
            kind: MemberKindDecl::Method,
            ..Default::default()
        }
    }

    pub fn constructor() -> Self {
        MemberDecl {
            kind: MemberKindDecl::Constructor,
            ..Default::default()
        }
    }

    pub fn property(name: impl Into<String>) -> Self {
        MemberDecl {
            name: name.into(),
            kind: MemberKindDecl::Property,
            ..Default::default()
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        MemberDecl {
            name: name.into(),
            kind: MemberKindDecl::Field,
            ..Default::default()
        }
    }

    pub fn event(name: impl Into<String>) -> Self {
        MemberDecl {
            name: name.into(),
            kind: MemberKindDecl::Event,
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_body(mut self, body: Operation) -> Self {
        self.body = Some(body);
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn overridable(mut self) -> Self {
        self.overridable = true;
        self
    }

    pub fn overriding(mut self, target: impl Into<String>) -> Self {
        self.overrides = Some(target.into());
        self
    }

    pub fn metadata_only(mut self) -> Self {
        self.metadata = true;
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_accessor_spans(mut self, getter: Span, setter: Span) -> Self {
        self.getter_span = Some(getter);
        self.setter_span = Some(setter);
        self
    }
}

/// One type declaration in the model document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDecl {
    /// Fully qualified name; doubles as the type's identity.
    pub name: String,
    #[serde(default)]
    pub kind: TypeKindDecl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Interfaces declared directly on this type.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub metadata: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

impl TypeDecl {
    pub fn class(name: impl Into<String>) -> Self {
        TypeDecl {
            name: name.into(),
            kind: TypeKindDecl::Class,
            ..Default::default()
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        TypeDecl {
            name: name.into(),
            kind: TypeKindDecl::Interface,
            ..Default::default()
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn metadata_only(mut self) -> Self {
        self.metadata = true;
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn member(mut self, member: MemberDecl) -> Self {
        self.members.push(member);
        self
    }
}

/// Serialized form of one workspace snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticModel {
    pub types: Vec<TypeDecl>,
}

impl SemanticModel {
    pub fn new(types: Vec<TypeDecl>) -> Self {
        SemanticModel { types }
    }
}

struct TypeEntry {
    symbol: SymbolRef,
    kind: TypeKindDecl,
    base: Option<SymbolId>,
    interfaces: Vec<SymbolId>,
    metadata: bool,
    span: Option<Span>,
    member_ids: Vec<SymbolId>,
}

struct MemberEntry {
    symbol: SymbolRef,
    owner: SymbolId,
    kind: MemberKindDecl,
    simple_name: String,
    params: Vec<String>,
    synthetic: bool,
    overridable: bool,
    overrides: Option<SymbolId>,
    metadata: bool,
    body: Option<Operation>,
    span: Option<Span>,
    accessor_of: Option<SymbolId>,
}

pub struct MemoryBackend {
    types: HashMap<SymbolId, TypeEntry>,
    type_order: Vec<SymbolId>,
    members: HashMap<SymbolId, MemberEntry>,
    member_order: Vec<SymbolId>,
    references: HashMap<SymbolId, Vec<Location>>,
}

fn simple_type_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

fn member_id(type_name: &str, member: &MemberDecl, simple_name: &str) -> String {
    match member.kind {
        MemberKindDecl::Method | MemberKindDecl::Constructor => {
            format!("{}.{}({})", type_name, simple_name, member.params.join(","))
        }
        _ => format!("{}.{}", type_name, simple_name),
    }
}

fn member_symbol_kind(kind: MemberKindDecl) -> SymbolKind {
    match kind {
        MemberKindDecl::Method => SymbolKind::Method,
        MemberKindDecl::Constructor => SymbolKind::Constructor,
        MemberKindDecl::Property => SymbolKind::Property,
        MemberKindDecl::Field => SymbolKind::Field,
        MemberKindDecl::Event => SymbolKind::Event,
    }
}

fn type_symbol_kind(kind: TypeKindDecl) -> SymbolKind {
    match kind {
        TypeKindDecl::Class => SymbolKind::Class,
        TypeKindDecl::Interface => SymbolKind::Interface,
        TypeKindDecl::Struct => SymbolKind::Struct,
    }
}

impl MemoryBackend {
    pub fn new(model: SemanticModel) -> Result<Self> {
        let mut backend = MemoryBackend {
            types: HashMap::new(),
            type_order: Vec::new(),
            members: HashMap::new(),
            member_order: Vec::new(),
            references: HashMap::new(),
        };

        for type_decl in &model.types {
            backend.add_type(type_decl)?;
        }
        backend.index_references();
        Ok(backend)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read model {}", path.display()))?;
        let model: SemanticModel = serde_json::from_str(&raw)
            .with_context(|| format!("parse model {}", path.display()))?;
        MemoryBackend::new(model)
    }

    fn add_type(&mut self, decl: &TypeDecl) -> Result<()> {
        if decl.name.trim().is_empty() {
            bail!("type declaration with empty name");
        }
        let type_id = SymbolId::new(&decl.name);
        if self.types.contains_key(&type_id) {
            bail!("duplicate type {}", decl.name);
        }

        let mut symbol = SymbolRef::new(type_symbol_kind(decl.kind), &decl.name);
        if let Some(span) = &decl.span {
            symbol = symbol.with_location(span.start());
        }

        let mut member_ids = Vec::new();
        for member in &decl.members {
            let id = self.add_member(&decl.name, decl.metadata, member)?;
            member_ids.push(id);
        }

        self.types.insert(
            type_id.clone(),
            TypeEntry {
                symbol,
                kind: decl.kind,
                base: decl.base.as_deref().map(SymbolId::new),
                interfaces: decl.interfaces.iter().map(SymbolId::new).collect(),
                metadata: decl.metadata,
                span: decl.span.clone(),
                member_ids,
            },
        );
        self.type_order.push(type_id);
        Ok(())
    }

    fn add_member(
        &mut self,
        type_name: &str,
        type_metadata: bool,
        decl: &MemberDecl,
    ) -> Result<SymbolId> {
        let simple_name = if decl.name.is_empty() {
            if decl.kind != MemberKindDecl::Constructor {
                bail!("member of {} with empty name", type_name);
            }
            simple_type_name(type_name).to_string()
        } else {
            decl.name.clone()
        };

        let id_raw = member_id(type_name, decl, &simple_name);
        let id = SymbolId::new(&id_raw);
        if self.members.contains_key(&id) {
            bail!("duplicate member {}", id_raw);
        }

        let metadata = decl.metadata || type_metadata;
        let mut symbol =
            SymbolRef::new(member_symbol_kind(decl.kind), &id_raw).with_container(type_name);
        if let Some(span) = &decl.span {
            if !metadata {
                symbol = symbol.with_location(span.start());
            }
        }

        self.members.insert(
            id.clone(),
            MemberEntry {
                symbol,
                owner: SymbolId::new(type_name),
                kind: decl.kind,
                simple_name,
                params: decl.params.clone(),
                synthetic: decl.synthetic,
                overridable: decl.overridable,
                overrides: decl.overrides.as_deref().map(SymbolId::new),
                metadata,
                body: decl.body.clone(),
                span: decl.span.clone(),
                accessor_of: None,
            },
        );
        self.member_order.push(id.clone());

        // Properties get getter/setter accessor symbols alongside.
        if decl.kind == MemberKindDecl::Property {
            self.add_accessor(&id_raw, "get", decl.getter_span.clone(), metadata);
            self.add_accessor(&id_raw, "set", decl.setter_span.clone(), metadata);
        }
        Ok(id)
    }

    fn add_accessor(
        &mut self,
        property_id: &str,
        which: &str,
        span: Option<Span>,
        metadata: bool,
    ) {
        let id_raw = format!("{property_id}.{which}");
        let id = SymbolId::new(&id_raw);
        let mut symbol = SymbolRef::new(SymbolKind::Method, &id_raw);
        if let Some(span) = &span {
            if !metadata {
                symbol = symbol.with_location(span.start());
            }
        }
        let owner = self
            .members
            .get(&SymbolId::new(property_id))
            .map(|p| p.owner.clone())
            .unwrap_or_else(|| SymbolId::new(property_id));
        self.members.insert(
            id.clone(),
            MemberEntry {
                symbol,
                owner,
                kind: MemberKindDecl::Method,
                simple_name: which.to_string(),
                params: Vec::new(),
                synthetic: true,
                overridable: false,
                overrides: None,
                metadata,
                body: None,
                span,
                accessor_of: Some(SymbolId::new(property_id)),
            },
        );
        self.member_order.push(id);
    }

    /// Build the reference index from every recorded method body. A reference
    /// location comes from the operation's call site when the model records
    /// one, otherwise from the referencing member's declaration.
    fn index_references(&mut self) {
        let mut collected: HashMap<SymbolId, Vec<Location>> = HashMap::new();
        for member_id in &self.member_order {
            let entry = &self.members[member_id];
            let Some(body) = &entry.body else { continue };
            let fallback = entry.span.as_ref().map(Span::start);
            let mut refs = Vec::new();
            collect_references(body, &mut refs);
            for (target, site) in refs {
                let Some(location) = site.or_else(|| fallback.clone()) else {
                    continue;
                };
                collected.entry(target).or_default().push(location);
            }
        }
        for locations in collected.values_mut() {
            sort_locations(locations);
            locations.dedup();
        }
        self.references = collected;
    }

    fn type_entry(&self, id: &SymbolId) -> Option<&TypeEntry> {
        self.types.get(id)
    }

    /// Ref for a base/interface link. Unknown ids are treated as metadata
    /// types outside the model (e.g. System.Object).
    fn type_ref(&self, id: &SymbolId) -> SymbolRef {
        self.types
            .get(id)
            .map(|t| t.symbol.clone())
            .unwrap_or_else(|| SymbolRef::new(SymbolKind::Class, id.as_str()))
    }

    fn base_chain_contains(&self, start: &SymbolId, target: &SymbolId) -> bool {
        let mut current = self.types.get(start).and_then(|t| t.base.clone());
        let mut hops = 0;
        while let Some(base) = current {
            if &base == target {
                return true;
            }
            hops += 1;
            if hops > 64 {
                break;
            }
            current = self.types.get(&base).and_then(|t| t.base.clone());
        }
        false
    }

    fn interface_set(&self, type_id: &SymbolId) -> Vec<SymbolId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue = VecDeque::new();
        let mut current = Some(type_id.clone());
        // Seed with declared interfaces of the whole base chain.
        while let Some(id) = current {
            let Some(entry) = self.types.get(&id) else { break };
            for iface in &entry.interfaces {
                if seen.insert(iface.clone()) {
                    queue.push_back(iface.clone());
                }
            }
            current = entry.base.clone();
        }
        while let Some(iface) = queue.pop_front() {
            out.push(iface.clone());
            if let Some(entry) = self.types.get(&iface) {
                for parent in &entry.interfaces {
                    if seen.insert(parent.clone()) {
                        queue.push_back(parent.clone());
                    }
                }
            }
        }
        out
    }

    fn overrides_chain_contains(&self, start: &SymbolId, target: &SymbolId) -> bool {
        let mut current = self.members.get(start).and_then(|m| m.overrides.clone());
        let mut hops = 0;
        while let Some(link) = current {
            if &link == target {
                return true;
            }
            hops += 1;
            if hops > 64 {
                break;
            }
            current = self.members.get(&link).and_then(|m| m.overrides.clone());
        }
        false
    }

    /// Whether a call on `target` can dispatch to `method` (or the reverse)
    /// through the override/implementation chain.
    fn dispatch_related(&self, target: &SymbolId, method: &SymbolId) -> bool {
        self.overrides_chain_contains(method, target) || self.overrides_chain_contains(target, method)
    }
}

fn collect_references(op: &Operation, out: &mut Vec<(SymbolId, Option<Location>)>) {
    match op {
        Operation::Invocation {
            target,
            arguments,
            receiver,
            site,
        } => {
            out.push((target.id.clone(), site.clone()));
            if let Some(receiver) = receiver {
                collect_references(receiver, out);
            }
            for arg in arguments {
                collect_references(&arg.value, out);
            }
        }
        Operation::ObjectCreation {
            constructor,
            arguments,
            site,
        } => {
            out.push((constructor.id.clone(), site.clone()));
            for arg in arguments {
                collect_references(&arg.value, out);
            }
        }
        Operation::FieldReference { field, instance } => {
            out.push((field.id.clone(), None));
            if let Some(instance) = instance {
                collect_references(instance, out);
            }
        }
        Operation::PropertyReference {
            property, instance, ..
        } => {
            out.push((property.id.clone(), None));
            if let Some(instance) = instance {
                collect_references(instance, out);
            }
        }
        Operation::EventReference { event, instance } => {
            out.push((event.id.clone(), None));
            if let Some(instance) = instance {
                collect_references(instance, out);
            }
        }
        Operation::Assignment { target, value }
        | Operation::CompoundAssignment { target, value } => {
            collect_references(target, out);
            collect_references(value, out);
        }
        Operation::IncrementDecrement { target } => collect_references(target, out),
        Operation::Block { children } | Operation::Other { children } => {
            for child in children {
                collect_references(child, out);
            }
        }
    }
}

fn collect_call_sites(op: &Operation, out: &mut Vec<(SymbolId, Option<Location>)>) {
    match op {
        Operation::Invocation {
            target,
            arguments,
            receiver,
            site,
        } => {
            out.push((target.id.clone(), site.clone()));
            if let Some(receiver) = receiver {
                collect_call_sites(receiver, out);
            }
            for arg in arguments {
                collect_call_sites(&arg.value, out);
            }
        }
        Operation::ObjectCreation {
            constructor,
            arguments,
            site,
        } => {
            out.push((constructor.id.clone(), site.clone()));
            for arg in arguments {
                collect_call_sites(&arg.value, out);
            }
        }
        Operation::FieldReference { instance, .. }
        | Operation::PropertyReference { instance, .. }
        | Operation::EventReference { instance, .. } => {
            if let Some(instance) = instance {
                collect_call_sites(instance, out);
            }
        }
        Operation::Assignment { target, value }
        | Operation::CompoundAssignment { target, value } => {
            collect_call_sites(target, out);
            collect_call_sites(value, out);
        }
        Operation::IncrementDecrement { target } => collect_call_sites(target, out),
        Operation::Block { children } | Operation::Other { children } => {
            for child in children {
                collect_call_sites(child, out);
            }
        }
    }
}

impl SemanticService for MemoryBackend {
    fn find_type_by_qualified_name(&self, name: &str) -> Result<Option<SymbolRef>> {
        Ok(self
            .type_entry(&SymbolId::new(name))
            .map(|t| t.symbol.clone()))
    }

    fn find_members_by_name(&self, type_id: &SymbolId, name: &str) -> Result<Vec<SymbolRef>> {
        let Some(entry) = self.type_entry(type_id) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for member_id in &entry.member_ids {
            let member = &self.members[member_id];
            if member.simple_name == name && !member.synthetic && member.accessor_of.is_none() {
                out.push(member.symbol.clone());
            }
        }
        Ok(out)
    }

    fn invocable_members(&self, type_id: &SymbolId) -> Result<Vec<SymbolRef>> {
        let Some(entry) = self.type_entry(type_id) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for member_id in &entry.member_ids {
            let member = &self.members[member_id];
            let invocable = matches!(
                member.kind,
                MemberKindDecl::Method | MemberKindDecl::Constructor
            );
            if invocable && !member.synthetic && member.accessor_of.is_none() {
                out.push(member.symbol.clone());
            }
        }
        Ok(out)
    }

    fn find_symbol_at_position(
        &self,
        file: &str,
        line: i64,
        column: i64,
    ) -> Result<Option<SymbolRef>> {
        let mut best: Option<(i64, &SymbolRef)> = None;
        for member_id in &self.member_order {
            let member = &self.members[member_id];
            if let Some(span) = &member.span {
                if span.contains(file, line, column) {
                    let weight = span.weight();
                    if best.map(|(w, _)| weight < w).unwrap_or(true) {
                        best = Some((weight, &member.symbol));
                    }
                }
            }
        }
        if best.is_none() {
            for type_id in &self.type_order {
                let entry = &self.types[type_id];
                if let Some(span) = &entry.span {
                    if span.contains(file, line, column) {
                        let weight = span.weight();
                        if best.map(|(w, _)| weight < w).unwrap_or(true) {
                            best = Some((weight, &entry.symbol));
                        }
                    }
                }
            }
        }
        Ok(best.map(|(_, symbol)| symbol.clone()))
    }

    fn parameter_types(&self, member: &SymbolId) -> Result<Vec<String>> {
        Ok(self
            .members
            .get(member)
            .map(|m| m.params.clone())
            .unwrap_or_default())
    }

    fn operation_tree(&self, method: &SymbolId) -> Result<Option<Operation>> {
        Ok(self.members.get(method).and_then(|m| {
            if m.metadata { None } else { m.body.clone() }
        }))
    }

    fn containing_property(&self, method: &SymbolId) -> Result<Option<SymbolRef>> {
        Ok(self
            .members
            .get(method)
            .and_then(|m| m.accessor_of.as_ref())
            .and_then(|prop| self.members.get(prop))
            .map(|prop| prop.symbol.clone()))
    }

    fn find_references(&self, symbol: &SymbolId) -> Result<Vec<Location>> {
        Ok(self.references.get(symbol).cloned().unwrap_or_default())
    }

    fn base_type(&self, type_id: &SymbolId) -> Result<Option<SymbolRef>> {
        Ok(self
            .type_entry(type_id)
            .and_then(|t| t.base.as_ref())
            .map(|base| self.type_ref(base)))
    }

    fn declared_interfaces(&self, type_id: &SymbolId) -> Result<Vec<SymbolRef>> {
        Ok(self
            .type_entry(type_id)
            .map(|t| t.interfaces.iter().map(|i| self.type_ref(i)).collect())
            .unwrap_or_default())
    }

    fn all_interfaces(&self, type_id: &SymbolId) -> Result<Vec<SymbolRef>> {
        Ok(self
            .interface_set(type_id)
            .iter()
            .map(|i| self.type_ref(i))
            .collect())
    }

    fn find_derived_types(&self, type_id: &SymbolId, transitive: bool) -> Result<Vec<SymbolRef>> {
        let mut out = Vec::new();
        for candidate in &self.type_order {
            let entry = &self.types[candidate];
            if entry.kind == TypeKindDecl::Interface {
                continue;
            }
            let hit = if transitive {
                self.base_chain_contains(candidate, type_id)
            } else {
                entry.base.as_ref() == Some(type_id)
            };
            if hit {
                out.push(entry.symbol.clone());
            }
        }
        Ok(out)
    }

    fn find_derived_interfaces(
        &self,
        type_id: &SymbolId,
        transitive: bool,
    ) -> Result<Vec<SymbolRef>> {
        let mut out = Vec::new();
        for candidate in &self.type_order {
            let entry = &self.types[candidate];
            if entry.kind != TypeKindDecl::Interface {
                continue;
            }
            let hit = if transitive {
                self.interface_set(candidate).contains(type_id)
            } else {
                entry.interfaces.contains(type_id)
            };
            if hit {
                out.push(entry.symbol.clone());
            }
        }
        Ok(out)
    }

    fn find_implementations(&self, symbol: &SymbolId) -> Result<Vec<SymbolRef>> {
        if let Some(entry) = self.types.get(symbol) {
            if entry.kind != TypeKindDecl::Interface {
                return Ok(Vec::new());
            }
            let mut out = Vec::new();
            for candidate in &self.type_order {
                let candidate_entry = &self.types[candidate];
                if candidate_entry.kind == TypeKindDecl::Interface {
                    continue;
                }
                if self.interface_set(candidate).contains(symbol) {
                    out.push(candidate_entry.symbol.clone());
                }
            }
            return Ok(out);
        }
        // Interface member: members whose override/implementation chain
        // reaches it.
        self.find_overrides(symbol)
    }

    fn find_overrides(&self, member: &SymbolId) -> Result<Vec<SymbolRef>> {
        let mut out = Vec::new();
        for candidate in &self.member_order {
            if self.overrides_chain_contains(candidate, member) {
                out.push(self.members[candidate].symbol.clone());
            }
        }
        Ok(out)
    }

    fn overridable_members(&self, type_id: &SymbolId) -> Result<Vec<SymbolRef>> {
        let Some(entry) = self.type_entry(type_id) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for member_id in &entry.member_ids {
            let member = &self.members[member_id];
            if member.overridable {
                out.push(member.symbol.clone());
            }
        }
        Ok(out)
    }

    fn find_callers(&self, method: &SymbolId) -> Result<Vec<CallerInfo>> {
        let mut out = Vec::new();
        for caller_id in &self.member_order {
            let caller = &self.members[caller_id];
            let Some(body) = &caller.body else { continue };
            let mut calls = Vec::new();
            collect_call_sites(body, &mut calls);
            let mut direct = false;
            let mut indirect = false;
            let mut sites = Vec::new();
            for (target, site) in calls {
                let hit_direct = &target == method;
                let hit_indirect = !hit_direct && self.dispatch_related(&target, method);
                if hit_direct || hit_indirect {
                    direct |= hit_direct;
                    indirect |= hit_indirect;
                    if let Some(site) = site.or_else(|| caller.span.as_ref().map(Span::start)) {
                        sites.push(site);
                    }
                }
            }
            if direct || indirect {
                sort_locations(&mut sites);
                sites.dedup();
                out.push(CallerInfo {
                    caller: caller.symbol.clone(),
                    direct,
                    call_sites: sites,
                });
            }
        }
        Ok(out)
    }

    fn find_source_definition(&self, symbol: &SymbolId) -> Result<Option<SymbolRef>> {
        if let Some(member) = self.members.get(symbol) {
            if member.metadata || member.symbol.location.is_none() {
                return Ok(None);
            }
            return Ok(Some(member.symbol.clone()));
        }
        if let Some(entry) = self.types.get(symbol) {
            if entry.metadata || entry.symbol.location.is_none() {
                return Ok(None);
            }
            return Ok(Some(entry.symbol.clone()));
        }
        Ok(None)
    }

    fn stats(&self) -> BackendStats {
        BackendStats {
            types: self.types.len(),
            members: self
                .members
                .values()
                .filter(|m| m.accessor_of.is_none())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryBackend {
        let model = SemanticModel::new(vec![
            TypeDecl::interface("Demo.IShape"),
            TypeDecl::class("Demo.Shape")
                .implements("Demo.IShape")
                .member(MemberDecl::method("Area").overridable()),
            TypeDecl::class("Demo.Circle")
                .with_base("Demo.Shape")
                .member(MemberDecl::method("Area").overriding("Demo.Shape.Area()")),
        ]);
        MemoryBackend::new(model).unwrap()
    }

    #[test]
    fn type_lookup_is_exact() {
        let backend = sample();
        assert!(backend
            .find_type_by_qualified_name("Demo.Shape")
            .unwrap()
            .is_some());
        assert!(backend
            .find_type_by_qualified_name("Demo.Shap")
            .unwrap()
            .is_none());
    }

    #[test]
    fn transitive_interfaces_cross_base_chain() {
        let backend = sample();
        let ifaces = backend
            .all_interfaces(&SymbolId::new("Demo.Circle"))
            .unwrap();
        assert_eq!(ifaces.len(), 1);
        assert_eq!(ifaces[0].display, "Demo.IShape");
    }

    #[test]
    fn implementations_include_transitive_implementers() {
        let backend = sample();
        let impls = backend
            .find_implementations(&SymbolId::new("Demo.IShape"))
            .unwrap();
        let names: Vec<&str> = impls.iter().map(|s| s.display.as_str()).collect();
        assert_eq!(names, vec!["Demo.Shape", "Demo.Circle"]);
    }

    #[test]
    fn overrides_found_through_chain() {
        let backend = sample();
        let overrides = backend
            .find_overrides(&SymbolId::new("Demo.Shape.Area()"))
            .unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].display, "Demo.Circle.Area()");
    }

    #[test]
    fn duplicate_type_rejected() {
        let model = SemanticModel::new(vec![
            TypeDecl::class("Demo.Foo"),
            TypeDecl::class("Demo.Foo"),
        ]);
        assert!(MemoryBackend::new(model).is_err());
    }
}
