//! Property-based tests for the merge engine.
//!
//! Uses proptest to generate binding sets and verify that merging is
//! idempotent and independent of fragment order.

use proptest::prelude::*;
use std::collections::BTreeSet;
use tagindex::composite::{ComparatorChain, CompositesFactory, IndexView};
use tagindex::tags::parse_tag_line;
use tagindex::*;

// ============================================================================
// Strategies for generating test data
// ============================================================================

fn identifier() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("open".to_string()),
        Just("close".to_string()),
        Just("node".to_string()),
        Just("size".to_string()),
        "[a-z][a-z0-9_]{0,6}",
    ]
}

fn class() -> impl Strategy<Value = (KindClass, TagKind)> {
    prop_oneof![
        Just((KindClass::Function, TagKind::Function)),
        Just((KindClass::Variable, TagKind::Variable)),
        Just((KindClass::Composite, TagKind::Struct)),
        Just((KindClass::Macro, TagKind::Macro)),
    ]
}

fn owner() -> impl Strategy<Value = Vec<String>> {
    prop_oneof![
        Just(Vec::new()),
        Just(vec!["ns".to_string()]),
        Just(vec!["ns".to_string(), "Widget".to_string()]),
    ]
}

fn linkage() -> impl Strategy<Value = Linkage> {
    prop_oneof![Just(Linkage::C), Just(Linkage::Cpp)]
}

type Shape = (String, Vec<String>, (KindClass, TagKind), Linkage);

fn shapes() -> impl Strategy<Value = Vec<Shape>> {
    prop::collection::vec((identifier(), owner(), class(), linkage()), 0..24)
}

fn bindings(fragment: u32, format: FragmentFormat, shapes: &[Shape]) -> Vec<FragmentBinding> {
    shapes
        .iter()
        .enumerate()
        .map(|(i, (name, owner, (class, kind), linkage))| FragmentBinding {
            fragment: FragmentId(fragment),
            format,
            key: BindingKey(i as u32),
            name: name.clone(),
            owner: owner.clone(),
            class: *class,
            kind: *kind,
            linkage: *linkage,
            ty: None,
            names: Vec::new(),
        })
        .collect()
}

fn logical_key(b: &FragmentBinding) -> (String, Vec<String>, KindClass, Linkage) {
    (b.name.clone(), b.owner.clone(), b.class, b.linkage)
}

fn factory() -> CompositesFactory<'static> {
    CompositesFactory::new(IndexView::new(Vec::new()), ComparatorChain::default())
}

// ============================================================================
// Merge properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The same bindings supplied twice merge like the bindings supplied once.
    #[test]
    fn merge_is_idempotent(shapes in shapes()) {
        let factory = factory();
        let s = bindings(0, FragmentFormat::Tags, &shapes);

        let once = factory.composite_bindings(&[s.clone()]);
        let twice = factory.composite_bindings(&[s.clone(), s]);
        prop_assert_eq!(once.len(), twice.len());
        prop_assert_eq!(&once, &twice);
    }

    /// A second fragment exposing equivalent bindings adds no composites.
    #[test]
    fn equivalent_fragments_do_not_grow_the_result(shapes in shapes()) {
        let factory = factory();
        let tags = bindings(0, FragmentFormat::Tags, &shapes);
        let snapshot = bindings(1, FragmentFormat::Snapshot, &shapes);

        let once = factory.composite_bindings(&[tags.clone()]);
        let both = factory.composite_bindings(&[tags, snapshot]);
        let once_keys: Vec<_> = once.iter().map(|b| logical_key(b.representative())).collect();
        let both_keys: Vec<_> = both.iter().map(|b| logical_key(b.representative())).collect();
        prop_assert_eq!(once_keys, both_keys);
    }

    /// Fragment order does not change the result sequence.
    #[test]
    fn merge_is_order_invariant(a in shapes(), b in shapes()) {
        let factory = factory();
        let a = bindings(0, FragmentFormat::Tags, &a);
        let b = bindings(1, FragmentFormat::Snapshot, &b);

        let ab: Vec<BindingRef> = factory
            .merge(&[a.clone(), b.clone()])
            .iter()
            .map(|b| b.handle())
            .collect();
        let ba: Vec<BindingRef> = factory
            .merge(&[b, a])
            .iter()
            .map(|b| b.handle())
            .collect();
        prop_assert_eq!(ab, ba);
    }

    /// Merged results hold exactly one binding per equivalence class.
    #[test]
    fn merge_covers_each_class_once(a in shapes(), b in shapes()) {
        let factory = factory();
        let a = bindings(0, FragmentFormat::Tags, &a);
        let b = bindings(1, FragmentFormat::Tags, &b);

        let expected: BTreeSet<_> = a.iter().chain(&b).map(logical_key).collect();
        let merged = factory.merge(&[a, b]);
        let keys: Vec<_> = merged.iter().map(logical_key).collect();
        let unique: BTreeSet<_> = keys.iter().cloned().collect();
        prop_assert_eq!(keys.len(), unique.len());
        prop_assert_eq!(unique, expected);
    }

    /// Tag lines never make the parser panic, and parsed line numbers are
    /// zero-based or -1.
    #[test]
    fn tag_lines_parse_without_panicking(
        name in "[A-Za-z_][A-Za-z0-9_]{0,10}",
        anchor in prop_oneof![
            "[0-9a-z;\"]{0,8}",
            "[+-]?[0-9]{1,22};\"",
            any::<i64>().prop_map(|n| format!("{};\"", n)),
            any::<u64>().prop_map(|n| format!("{};\"", n)),
        ],
        extra in prop::collection::vec("[a-z]{1,6}(:[A-Za-z:+]{0,8})?", 0..4),
    ) {
        let line = format!("{}\tfile.c\t{}\t{}", name, anchor, extra.join("\t"));
        let record = parse_tag_line(&line).expect("name and file present");
        prop_assert_eq!(record.element_name, name);
        prop_assert!(record.line >= -1);
    }
}
