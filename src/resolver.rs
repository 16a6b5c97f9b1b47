//! Symbol resolution: from a qualified name or source position to a symbol,
//! with overload disambiguation by parameter signature and ambiguity as a
//! first-class outcome.

use crate::error::AnalysisError;
use crate::model::{ResolutionResult, SymbolKind, SymbolRef, TargetDescriptor};
use crate::semantic::SemanticService;
use anyhow::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Type-only names resolve to their single constructor when set (the
    /// default root context for dependency analysis). Unset, a type name
    /// resolves to the type itself.
    pub member_context: bool,
    /// Positions inside a property accessor resolve to the accessor method
    /// instead of the property.
    pub accessor_methods: bool,
}

pub fn resolve(
    svc: &dyn SemanticService,
    descriptor: &TargetDescriptor,
    opts: &ResolveOptions,
) -> Result<ResolutionResult> {
    match descriptor {
        TargetDescriptor::QualifiedName(name) => resolve_qualified(svc, name, opts),
        TargetDescriptor::Position { file, line, column } => {
            resolve_position(svc, file, *line, *column, opts)
        }
    }
}

/// Reduce a resolution to a single symbol, or fail with the structured
/// ambiguity/not-found error the protocol reports.
pub fn require_resolved(result: ResolutionResult, target: &str) -> Result<SymbolRef> {
    match result {
        ResolutionResult::Resolved(symbol) => Ok(symbol),
        ResolutionResult::Ambiguous(candidates) => Err(AnalysisError::Ambiguous {
            hint: format!(
                "{} matches {} members; add a parameter list to disambiguate",
                target,
                candidates.len()
            ),
            candidates,
        }
        .into()),
        ResolutionResult::NotFound => Err(AnalysisError::NotFound(target.to_string()).into()),
    }
}

fn resolve_qualified(
    svc: &dyn SemanticService,
    raw: &str,
    opts: &ResolveOptions,
) -> Result<ResolutionResult> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AnalysisError::InvalidInput("empty qualified name".into()).into());
    }
    let (path, params) = split_parameter_list(raw)?;

    if let Some(params) = params {
        return resolve_with_signature(svc, path, &params);
    }

    if let Some(type_symbol) = svc.find_type_by_qualified_name(path)? {
        if !opts.member_context {
            return Ok(ResolutionResult::Resolved(type_symbol));
        }
        return Ok(resolve_type_default(svc, &type_symbol)?);
    }

    let Some((type_path, member_name)) = path.rsplit_once('.') else {
        return Ok(ResolutionResult::NotFound);
    };
    let Some(type_symbol) = svc.find_type_by_qualified_name(type_path)? else {
        return Ok(ResolutionResult::NotFound);
    };
    let members = svc.find_members_by_name(&type_symbol.id, member_name)?;
    Ok(match members.len() {
        0 => ResolutionResult::NotFound,
        1 => ResolutionResult::Resolved(members.into_iter().next().unwrap()),
        _ => ResolutionResult::Ambiguous(members),
    })
}

/// Type-only name in member context. A single non-synthetic constructor wins
/// outright, even when ordinary methods exist; anything else with invocable
/// members is ambiguous, never guessed.
fn resolve_type_default(
    svc: &dyn SemanticService,
    type_symbol: &SymbolRef,
) -> Result<ResolutionResult> {
    let invocables = svc.invocable_members(&type_symbol.id)?;
    let constructors: Vec<&SymbolRef> = invocables
        .iter()
        .filter(|m| m.kind == SymbolKind::Constructor)
        .collect();
    if constructors.len() == 1 {
        return Ok(ResolutionResult::Resolved(constructors[0].clone()));
    }
    if invocables.is_empty() {
        return Ok(ResolutionResult::Resolved(type_symbol.clone()));
    }
    Ok(ResolutionResult::Ambiguous(invocables))
}

fn resolve_with_signature(
    svc: &dyn SemanticService,
    path: &str,
    params: &[String],
) -> Result<ResolutionResult> {
    let candidates = if let Some(type_symbol) = svc.find_type_by_qualified_name(path)? {
        svc.invocable_members(&type_symbol.id)?
            .into_iter()
            .filter(|m| m.kind == SymbolKind::Constructor)
            .collect::<Vec<_>>()
    } else {
        let Some((type_path, member_name)) = path.rsplit_once('.') else {
            return Ok(ResolutionResult::NotFound);
        };
        let Some(type_symbol) = svc.find_type_by_qualified_name(type_path)? else {
            return Ok(ResolutionResult::NotFound);
        };
        svc.find_members_by_name(&type_symbol.id, member_name)?
            .into_iter()
            .filter(|m| m.kind.is_invocable())
            .collect()
    };

    let mut arity_matches = Vec::new();
    for candidate in candidates {
        let declared = svc.parameter_types(&candidate.id)?;
        if declared.len() == params.len() {
            arity_matches.push((candidate, declared));
        }
    }

    let signature_matches: Vec<&(SymbolRef, Vec<String>)> = arity_matches
        .iter()
        .filter(|(_, declared)| {
            declared
                .iter()
                .zip(params.iter())
                .all(|(d, p)| normalize_type_name(d) == normalize_type_name(p))
        })
        .collect();

    Ok(match signature_matches.len() {
        1 => ResolutionResult::Resolved(signature_matches[0].0.clone()),
        0 => {
            // Arity alone settles it when unambiguous.
            if arity_matches.len() == 1 {
                ResolutionResult::Resolved(arity_matches.into_iter().next().unwrap().0)
            } else {
                ResolutionResult::NotFound
            }
        }
        _ => ResolutionResult::Ambiguous(
            signature_matches.iter().map(|(s, _)| s.clone()).collect(),
        ),
    })
}

fn resolve_position(
    svc: &dyn SemanticService,
    file: &str,
    line: i64,
    column: i64,
    opts: &ResolveOptions,
) -> Result<ResolutionResult> {
    if file.trim().is_empty() {
        return Err(AnalysisError::InvalidInput("empty file path".into()).into());
    }
    if line < 1 || column < 1 {
        return Err(AnalysisError::InvalidInput(format!(
            "line and column are 1-based, got {line}:{column}"
        ))
        .into());
    }
    let Some(symbol) = svc.find_symbol_at_position(file, line, column)? else {
        return Ok(ResolutionResult::NotFound);
    };
    if !opts.accessor_methods {
        if let Some(property) = svc.containing_property(&symbol.id)? {
            return Ok(ResolutionResult::Resolved(property));
        }
    }
    Ok(ResolutionResult::Resolved(symbol))
}

/// Split `Type.Member(int, string)` into path and parsed parameter tokens.
/// No parentheses means no signature; `()` means an explicit empty one.
fn split_parameter_list(raw: &str) -> Result<(&str, Option<Vec<String>>)> {
    let Some(open) = raw.find('(') else {
        return Ok((raw, None));
    };
    if !raw.ends_with(')') {
        return Err(
            AnalysisError::InvalidInput(format!("unterminated parameter list in {raw}")).into(),
        );
    }
    let path = raw[..open].trim_end();
    if path.is_empty() {
        return Err(AnalysisError::InvalidInput(format!("missing name in {raw}")).into());
    }
    let inner = &raw[open + 1..raw.len() - 1];
    let params = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|p| p.trim().to_string()).collect()
    };
    Ok((path, Some(params)))
}

/// Canonical comparison form of a type name: language keyword aliases map to
/// CLR names, `System.` and other namespace prefixes are stripped.
fn normalize_type_name(name: &str) -> String {
    let name = name.trim();
    let alias = match name {
        "bool" => Some("Boolean"),
        "byte" => Some("Byte"),
        "sbyte" => Some("SByte"),
        "char" => Some("Char"),
        "decimal" => Some("Decimal"),
        "double" => Some("Double"),
        "float" => Some("Single"),
        "int" => Some("Int32"),
        "uint" => Some("UInt32"),
        "long" => Some("Int64"),
        "ulong" => Some("UInt64"),
        "short" => Some("Int16"),
        "ushort" => Some("UInt16"),
        "object" => Some("Object"),
        "string" => Some("String"),
        "nint" => Some("IntPtr"),
        "nuint" => Some("UIntPtr"),
        "void" => Some("Void"),
        _ => None,
    };
    if let Some(alias) = alias {
        return alias.to_string();
    }
    name.rsplit('.').next().unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemberDecl, MemoryBackend, SemanticModel, Span, TypeDecl};
    use crate::model::ResolutionResult;

    fn backend() -> MemoryBackend {
        let model = SemanticModel::new(vec![
            TypeDecl::class("Demo.Single").member(MemberDecl::constructor()),
            TypeDecl::class("Demo.Busy")
                .member(MemberDecl::constructor())
                .member(MemberDecl::constructor().with_params(&["Int32"]))
                .member(MemberDecl::method("Run")),
            TypeDecl::class("Demo.Calc")
                .member(MemberDecl::method("Add").with_params(&["Int32", "Int32"]))
                .member(MemberDecl::method("Add").with_params(&["Double", "Double"]))
                .member(MemberDecl::method("Add").with_params(&["String"])),
            TypeDecl::class("Demo.Widget")
                .at(Span::new("widget.cs", 1, 1, 40, 2))
                .member(
                    MemberDecl::property("Name")
                        .at(Span::new("widget.cs", 3, 5, 9, 6))
                        .with_accessor_spans(
                            Span::new("widget.cs", 4, 9, 5, 10),
                            Span::new("widget.cs", 6, 9, 7, 10),
                        ),
                )
                .member(MemberDecl::method("Refresh").at(Span::new("widget.cs", 11, 5, 20, 6))),
        ]);
        MemoryBackend::new(model).unwrap()
    }

    fn name(result: &ResolutionResult) -> String {
        match result {
            ResolutionResult::Resolved(s) => s.display.clone(),
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[test]
    fn single_ctor_type_resolves_to_ctor_in_member_context() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::QualifiedName("Demo.Single".into()),
            &ResolveOptions {
                member_context: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(name(&result), "Demo.Single.Single()");
    }

    #[test]
    fn type_name_resolves_to_type_outside_member_context() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::QualifiedName("Demo.Busy".into()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(name(&result), "Demo.Busy");
    }

    #[test]
    fn multi_ctor_type_is_ambiguous_with_all_invocables() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::QualifiedName("Demo.Busy".into()),
            &ResolveOptions {
                member_context: true,
                ..Default::default()
            },
        )
        .unwrap();
        match result {
            ResolutionResult::Ambiguous(candidates) => {
                // Both constructors and the ordinary method are candidates.
                assert_eq!(candidates.len(), 3);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn overloads_without_signature_are_ambiguous() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::QualifiedName("Demo.Calc.Add".into()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert!(matches!(result, ResolutionResult::Ambiguous(c) if c.len() == 3));
    }

    #[test]
    fn signature_with_aliases_disambiguates() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::QualifiedName("Demo.Calc.Add(int, int)".into()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(name(&result), "Demo.Calc.Add(Int32,Int32)");
    }

    #[test]
    fn arity_alone_resolves_when_unique() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::QualifiedName("Demo.Calc.Add(Text)".into()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(name(&result), "Demo.Calc.Add(String)");
    }

    #[test]
    fn ctor_signature_selects_overload() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::QualifiedName("Demo.Busy(System.Int32)".into()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(name(&result), "Demo.Busy.Busy(Int32)");
    }

    #[test]
    fn unknown_name_is_not_found_not_error() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::QualifiedName("Demo.Missing.Run".into()),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert!(matches!(result, ResolutionResult::NotFound));
    }

    #[test]
    fn empty_name_is_invalid_input() {
        let svc = backend();
        let err = resolve(
            &svc,
            &TargetDescriptor::QualifiedName("  ".into()),
            &ResolveOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn position_in_accessor_yields_property_by_default() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::Position {
                file: "widget.cs".into(),
                line: 4,
                column: 12,
            },
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(name(&result), "Demo.Widget.Name");
    }

    #[test]
    fn position_in_accessor_yields_accessor_when_requested() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::Position {
                file: "widget.cs".into(),
                line: 4,
                column: 12,
            },
            &ResolveOptions {
                accessor_methods: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(name(&result), "Demo.Widget.Name.get");
    }

    #[test]
    fn position_picks_smallest_enclosing_declaration() {
        let svc = backend();
        let result = resolve(
            &svc,
            &TargetDescriptor::Position {
                file: "widget.cs".into(),
                line: 12,
                column: 1,
            },
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(name(&result), "Demo.Widget.Refresh()");
        // Outside every member, the type itself encloses.
        let result = resolve(
            &svc,
            &TargetDescriptor::Position {
                file: "widget.cs".into(),
                line: 30,
                column: 1,
            },
            &ResolveOptions::default(),
        )
        .unwrap();
        assert_eq!(name(&result), "Demo.Widget");
    }

    #[test]
    fn zero_based_position_rejected() {
        let svc = backend();
        let err = resolve(
            &svc,
            &TargetDescriptor::Position {
                file: "widget.cs".into(),
                line: 0,
                column: 3,
            },
            &ResolveOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::InvalidInput(_))
        ));
    }
}
