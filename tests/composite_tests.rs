use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tagindex::composite::{
    ClassifiedBinding, CompositeTypeKind, ProblemBinding, SpecializationBinding, UncertainBinding,
};
use tagindex::fragment::TypeKeyword;
use tagindex::tags::index_tags;
use tagindex::*;

fn fragment(id: u32, tags: &str) -> Arc<TagFragment> {
    let fragment = TagFragment::new(FragmentId(id));
    index_tags(&fragment, tags.as_bytes(), None).expect("index tags");
    Arc::new(fragment)
}

/// A read-only fragment, as loaded from a dependency's snapshot.
fn snapshot_fragment(id: u32, tags: &str) -> Arc<TagFragment> {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("dep.bin");
    save_snapshot(&fragment(id, tags), &path).expect("save");
    Arc::new(load_snapshot(&path, FragmentId(id), FragmentFormat::Snapshot).expect("load"))
}

const PROJECT: &str = "open\t/p/io.h\t4;\"\tkind:prototype\tlanguage:C\tsignature:(const char *path)\n\
                       head\t/p/list.c\t5;\"\tkind:variable\tlanguage:C\ttyperef:typename:struct node **\n\
                       MAX\t/p/defs.h\t1;\"\tkind:macro\tlanguage:C\n";

const LIBRARY: &str = "open\t/lib/open.c\t30;\"\tkind:function\tlanguage:C\tsignature:(const char *path)\ttyperef:typename:int\n\
                       node\t/lib/list.h\t2;\"\tkind:struct\tlanguage:C\n\
                       next\t/lib/list.h\t3;\"\tkind:member\tstruct:node\tlanguage:C\ttyperef:typename:struct node *\n";

const WIDGET_DECL: &str = "ns\t/p/w.hpp\t1;\"\tkind:namespace\tlanguage:C++\n\
                           Widget\t/p/w.hpp\t2;\"\tkind:class\tnamespace:ns\tlanguage:C++\n";

const WIDGET_IMPL: &str = "Widget\t/q/w.hpp\t2;\"\tkind:class\tnamespace:ns\tlanguage:C++\n\
                           get\t/q/w.cpp\t9;\"\tkind:function\tclass:ns::Widget\tlanguage:C++\n";

#[test]
fn equivalent_bindings_merge_across_fragments() {
    let index = CompositeIndex::new();
    index.attach(fragment(0, PROJECT));
    index.attach(snapshot_fragment(1, LIBRARY));

    index.query(|factory| {
        let found = factory.find_bindings("open").expect("lookup");
        assert_eq!(found.len(), 1);
        let open = &found[0];

        assert_eq!(open.representative().fragment, FragmentId(0));
        assert!(open.has_definition());
        assert_eq!(open.equivalents().len(), 2);
        assert_eq!(open.names().len(), 2);

        let preferred = open.preferred(false);
        assert_eq!(preferred.representative().fragment, FragmentId(1));
        assert_eq!(preferred, open.preferred(true));
        assert_eq!(
            open.adapt(FragmentId(1)).map(|b| b.fragment),
            Some(FragmentId(1))
        );
    });
}

#[test]
fn nested_types_stay_composite() {
    let index = CompositeIndex::new();
    index.attach(fragment(0, PROJECT));
    index.attach(snapshot_fragment(1, LIBRARY));

    index.query(|factory| {
        let head = factory.find_bindings("head").expect("lookup").remove(0);
        let ty = head.ty().expect("typed");
        assert_eq!(ty.kind(), CompositeTypeKind::Pointer);
        assert_eq!(ty.to_string(), "struct node * *");

        let inner = ty.get_type().expect("pointer target");
        assert_eq!(inner.kind(), CompositeTypeKind::Pointer);
        assert_eq!(ty.get_type(), Some(inner.clone()));

        let named = inner.get_type().expect("pointer target");
        assert_eq!(named.kind(), CompositeTypeKind::Named);
        assert!(named.get_type().is_none());

        // The struct lives in the library fragment only.
        let node = named.binding().expect("resolved");
        assert_eq!(node.name(), "node");
        assert_eq!(node.representative().fragment, FragmentId(1));

        // Self-referential member type resolves back to the same binding.
        let members = factory
            .scope_for_path(&["node".to_string()])
            .bindings()
            .expect("members");
        assert_eq!(members.len(), 1);
        let next_target = members[0]
            .ty()
            .and_then(|t| t.get_type())
            .and_then(|t| t.binding())
            .expect("resolved");
        assert_eq!(next_target, node);
    });
}

#[test]
fn scopes_are_canonical_and_parent_chains_terminate() {
    let index = CompositeIndex::new();
    index.attach(fragment(0, WIDGET_DECL));
    index.attach(fragment(1, WIDGET_IMPL));

    index.query(|factory| {
        let get = factory.find_bindings("get").expect("lookup").remove(0);
        let scope = get.scope();
        assert_eq!(scope.kind(), ScopeKind::Class);
        assert_eq!(scope.qualified_name(), vec!["ns".to_string(), "Widget".to_string()]);

        // Reached through the member (fragment 1) or by name: same scope.
        let by_name = factory.scope_for_path(&["ns".to_string(), "Widget".to_string()]);
        assert_eq!(scope, by_name);
        assert_eq!(
            scope.scope_binding().map(|b| b.representative().fragment),
            Some(FragmentId(0))
        );

        let mut visited = HashSet::new();
        let mut current = Some(scope.clone());
        let mut kinds = Vec::new();
        while let Some(s) = current {
            if !visited.insert(s.clone()) {
                panic!("scope chain revisits {:?}", s);
            }
            kinds.push(s.kind());
            current = s.parent();
        }
        assert_eq!(kinds, vec![ScopeKind::Class, ScopeKind::Namespace, ScopeKind::Global]);

        let members = scope.find_bindings("get").expect("lookup");
        assert_eq!(members, vec![get.clone()]);
        assert_eq!(get.owner().map(|o| o.name().to_string()), Some("Widget".to_string()));
    });
}

#[test]
fn macros_live_in_the_macro_container() {
    let index = CompositeIndex::new();
    index.attach(fragment(0, PROJECT));

    index.query(|factory| {
        let max = factory.find_bindings("MAX").expect("lookup").remove(0);
        assert_eq!(max.scope().kind(), ScopeKind::MacroContainer);
        assert_eq!(max.scope(), factory.macro_container());
        assert!(max.scope().parent().is_none());

        assert_eq!(factory.macro_container().find_bindings("MAX").expect("lookup").len(), 1);
        assert!(factory.global_scope().find_bindings("MAX").expect("lookup").is_empty());
        assert_eq!(factory.global_scope().find_bindings("open").expect("lookup").len(), 1);
    });
}

#[test]
fn unresolved_scopes_are_named() {
    let index = CompositeIndex::new();
    index.attach(fragment(1, WIDGET_IMPL.lines().nth(1).unwrap_or_default()));

    index.query(|factory| {
        let get = factory.find_bindings("get").expect("lookup").remove(0);
        let scope = get.scope();
        assert_eq!(scope.kind(), ScopeKind::Unresolved);
        assert!(scope.scope_binding().is_none());
        let parent = scope.parent().expect("parent");
        assert_eq!(parent.qualified_name(), vec!["ns".to_string()]);
        assert_eq!(parent.parent().map(|p| p.kind()), Some(ScopeKind::Global));
    });
}

#[test]
fn unsupported_operations_fail_explicitly() {
    let index = CompositeIndex::new();
    index.attach(fragment(0, PROJECT));

    index.query(|factory| {
        let open = factory.find_bindings("open").expect("lookup").remove(0);
        let err = open.has_declaration().expect_err("unsupported");
        assert!(err.is_unsupported());

        let err = factory.global_scope().add_binding(&open).expect_err("unsupported");
        assert!(err.is_unsupported());
    });
}

#[test]
#[should_panic(expected = "no equivalent")]
fn find_one_binding_requires_an_equivalent() {
    let index = CompositeIndex::new();
    index.attach(fragment(0, PROJECT));

    let stray = FragmentBinding {
        fragment: FragmentId(7),
        format: FragmentFormat::Tags,
        key: BindingKey(0),
        name: "nowhere".to_string(),
        owner: Vec::new(),
        class: KindClass::Function,
        kind: TagKind::Function,
        linkage: Linkage::C,
        ty: None,
        names: Vec::new(),
    };
    index.query(|factory| factory.find_one_binding(&stray, true));
}

#[test]
fn uncertain_bindings_are_classified() {
    let index = CompositeIndex::new();
    index.attach(fragment(0, PROJECT));

    index.query(|factory| {
        let open = factory.find_bindings("open").expect("lookup").remove(0);
        let classified =
            factory.process_uncertain_binding(UncertainBinding::Fragment(open.representative().clone()));
        assert_eq!(classified.as_composite(), Some(&open));

        let problem = UncertainBinding::Problem(ProblemBinding {
            name: "missing".to_string(),
            message: "not found".to_string(),
        });
        assert!(matches!(
            factory.process_uncertain_binding(problem.clone()),
            ClassifiedBinding::PassThrough(p) if p == problem
        ));

        let specialization = UncertainBinding::Specialization(SpecializationBinding {
            name: "vector".to_string(),
            arguments: vec!["int".to_string()],
        });
        assert!(factory.process_uncertain_binding(specialization).as_composite().is_none());

        let other = UncertainBinding::Other {
            type_name: "ConceptBinding".to_string(),
            name: "Sortable".to_string(),
        };
        match factory.process_uncertain_binding(other) {
            ClassifiedBinding::PassThrough(b) => assert_eq!(b.name(), "Sortable"),
            ClassifiedBinding::Composite(_) => panic!("unknown kinds must pass through"),
        }
    });
}

#[test]
fn named_types_resolve_by_keyword() {
    let index = CompositeIndex::new();
    index.attach(snapshot_fragment(1, LIBRARY));

    index.query(|factory| {
        let node = vec!["node".to_string()];
        assert!(factory.resolve_named_type(TypeKeyword::Struct, &node).is_some());
        assert!(factory.resolve_named_type(TypeKeyword::Plain, &node).is_some());
        assert!(factory.resolve_named_type(TypeKeyword::Enum, &node).is_none());
    });
}

#[test]
fn attach_replaces_and_detach_removes() {
    let index = CompositeIndex::new();
    index.attach(fragment(0, PROJECT));
    index.attach(fragment(1, LIBRARY));
    index.attach(fragment(1, WIDGET_DECL));
    assert_eq!(index.fragment_count(), 2);

    let count = |name: &str| index.query(|f| f.find_bindings(name).map(|b| b.len()));
    assert_eq!(count("node").expect("lookup"), 0);
    assert_eq!(count("Widget").expect("lookup"), 1);

    let detached = index.detach(FragmentId(1)).expect("attached");
    assert_eq!(detached.id(), FragmentId(1));
    assert!(index.detach(FragmentId(1)).is_none());
    assert_eq!(index.fragment_ids(), vec![FragmentId(0)]);
    assert_eq!(count("Widget").expect("lookup"), 0);
}

#[test]
fn snapshot_fragments_are_read_only() {
    let dep = snapshot_fragment(3, LIBRARY);
    assert!(matches!(dep.write(), Err(IndexError::ReadOnlyFragment(FragmentId(3)))));
    assert!(dep.contains_path(&PathBuf::from("/lib/list.h")));
}
