use semquery::backend::{MemberDecl, MemoryBackend, SemanticModel, TypeDecl};
use semquery::model::{Location, SymbolKind, SymbolRef};
use semquery::rpc::App;
use semquery::semantic::{Argument, Operation, Workspace};
use serde_json::{Value, json};
use std::sync::Arc;

fn sym(kind: SymbolKind, id: &str) -> SymbolRef {
    SymbolRef::new(kind, id)
}

fn name_property() -> Operation {
    Operation::property(
        sym(SymbolKind::Property, "Demo.Foo.Name"),
        Some(sym(SymbolKind::Method, "Demo.Foo.Name.get")),
        Some(sym(SymbolKind::Method, "Demo.Foo.Name.set")),
    )
}

fn count_field() -> Operation {
    Operation::field(sym(SymbolKind::Field, "Demo.Foo.count"))
}

/// The workload from the design notes:
///   count++; count += 2; Name = Name + "x";
///   Callee(42); new Bar(); Bar.Static();
fn do_work_body() -> Operation {
    Operation::block(vec![
        Operation::increment(count_field()),
        Operation::compound_assign(count_field(), Operation::Other { children: vec![] }),
        Operation::assign(
            name_property(),
            Operation::Other {
                children: vec![name_property()],
            },
        ),
        Operation::invoke(
            sym(SymbolKind::Method, "Demo.Foo.Callee(Int32)"),
            vec![Argument::value(Operation::Other { children: vec![] })],
        ),
        Operation::construct(sym(SymbolKind::Constructor, "Demo.Bar.Bar()"), vec![]),
        Operation::invoke(sym(SymbolKind::Method, "Demo.Bar.Static()"), vec![]),
    ])
}

fn model() -> SemanticModel {
    SemanticModel::new(vec![
        TypeDecl::class("Demo.Foo")
            .member(MemberDecl::constructor())
            .member(MemberDecl::field("count"))
            .member(MemberDecl::property("Name"))
            .member(MemberDecl::method("DoWork").with_body(do_work_body()))
            .member(MemberDecl::method("Callee").with_params(&["Int32"])),
        TypeDecl::class("Demo.Bar")
            .member(MemberDecl::constructor())
            .member(MemberDecl::method("Static")),
        TypeDecl::class("Demo.Caller").member(
            MemberDecl::method("Run").with_body(Operation::block(vec![
                Operation::construct(sym(SymbolKind::Constructor, "Demo.Foo.Foo()"), vec![]),
                Operation::Invocation {
                    target: sym(SymbolKind::Method, "Demo.Foo.DoWork()"),
                    arguments: vec![],
                    receiver: None,
                    site: Some(Location::new("caller.cs", 12, 9)),
                },
            ])),
        ),
    ])
}

fn app() -> App {
    let backend = MemoryBackend::new(model()).unwrap();
    App::with_workspace(Workspace::with(Arc::new(backend)))
}

fn ids(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn do_work_classification_with_accessors_as_calls() {
    let app = app();
    let result = app
        .handle(
            "analyze_dependencies",
            json!({
                "qualified_name": "Demo.Foo.DoWork",
                "accessors_as_calls": true,
            }),
        )
        .unwrap();

    let reads = ids(&result["reads"]);
    assert!(reads.contains(&"Demo.Foo.count".to_string()));
    assert!(reads.contains(&"Demo.Foo.Name".to_string()));

    let writes = ids(&result["writes"]);
    assert!(writes.contains(&"Demo.Foo.count".to_string()));
    assert!(writes.contains(&"Demo.Foo.Name".to_string()));

    let calls = ids(&result["calls"]);
    for expected in [
        "Demo.Foo.Callee(Int32)",
        "Demo.Bar.Bar()",
        "Demo.Bar.Static()",
        "Demo.Foo.Name.get",
        "Demo.Foo.Name.set",
    ] {
        assert!(calls.contains(&expected.to_string()), "missing {expected}");
    }
}

#[test]
fn accessors_stay_out_of_calls_by_default() {
    let app = app();
    let result = app
        .handle(
            "analyze_dependencies",
            json!({ "qualified_name": "Demo.Foo.DoWork" }),
        )
        .unwrap();
    let calls = ids(&result["calls"]);
    assert!(!calls.iter().any(|c| c.ends_with(".get") || c.ends_with(".set")));
    // Ordinary invocations still land in calls.
    assert!(calls.contains(&"Demo.Foo.Callee(Int32)".to_string()));
}

#[test]
fn callers_of_do_work_reference_caller_run() {
    let app = app();
    let result = app
        .handle(
            "analyze_dependencies",
            json!({
                "qualified_name": "Demo.Foo.DoWork",
                "include_callers": true,
            }),
        )
        .unwrap();
    let callers = result["callers"]["items"].as_array().unwrap();
    assert_eq!(callers.len(), 1);
    let entry = &callers[0];
    assert!(
        entry["caller"]["display"]
            .as_str()
            .unwrap()
            .contains("Caller.Run")
    );
    assert_eq!(entry["direct"], json!(true));
    assert_eq!(entry["call_sites"][0]["line"], json!(12));
}

#[test]
fn virtual_dispatch_callers_are_flagged_indirect() {
    let model = SemanticModel::new(vec![
        TypeDecl::class("Demo.Base").member(MemberDecl::method("Virt").overridable()),
        TypeDecl::class("Demo.Derived")
            .with_base("Demo.Base")
            .member(MemberDecl::method("Virt").overriding("Demo.Base.Virt()")),
        TypeDecl::class("Demo.User").member(
            MemberDecl::method("Go").with_body(Operation::invoke(
                sym(SymbolKind::Method, "Demo.Base.Virt()"),
                vec![],
            )),
        ),
    ]);
    let backend = MemoryBackend::new(model).unwrap();
    let app = App::with_workspace(Workspace::with(Arc::new(backend)));

    let result = app
        .handle(
            "find_callers",
            json!({ "qualified_name": "Demo.Derived.Virt" }),
        )
        .unwrap();
    let callers = result["callers"]["items"].as_array().unwrap();
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0]["caller"]["id"], json!("Demo.User.Go()"));
    assert_eq!(callers[0]["direct"], json!(false));
}

#[test]
fn property_target_is_rejected_for_dependency_analysis() {
    let app = app();
    let err = app
        .handle(
            "analyze_dependencies",
            json!({ "qualified_name": "Demo.Foo.Name" }),
        )
        .unwrap_err();
    assert_eq!(semquery::error::error_code(&err), "invalid_input");
}
