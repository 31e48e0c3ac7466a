//! Turning tag records into stored bindings.
//!
//! Each record either adds a name to an existing binding (same scope, same
//! name, same kind class, same linkage) or creates exactly one new binding.

use crate::error::Result;
use crate::fragment::{FragmentType, FragmentWriter, NewBinding};
use crate::tags::parser::{parse_signature, parse_typeref};
use crate::types::{BindingKey, BindingName, Linkage, TagKind, TagRecord};

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Created(BindingKey),
    Reused(BindingKey),
}

impl Materialized {
    pub fn key(&self) -> BindingKey {
        match self {
            Self::Created(key) | Self::Reused(key) => *key,
        }
    }
}

/// Language-specific interpretation of tag records.
pub trait Materializer: Send + Sync {
    fn linkage(&self) -> Linkage;

    /// Extension fields naming the record's enclosing scope.
    fn scope_fields(&self) -> &'static [&'static str];

    /// Qualified name of the scope the record's binding lives in.
    fn owner(&self, record: &TagRecord) -> Vec<String> {
        scope_from_fields(record, self.scope_fields())
    }

    fn materialize(&self, writer: &mut FragmentWriter<'_>, record: &TagRecord) -> Result<Materialized> {
        let owner = self.owner(record);
        let name = BindingName {
            file: record.file.clone(),
            line: record.line,
            is_definition: record.kind.is_definition(),
        };
        let ty = record_type(record);
        let class = record.kind.class();

        match writer.find_binding(&owner, &record.element_name, class, self.linkage()) {
            Some(key) => {
                writer.add_name(key, record.kind, name)?;
                if let Some(ty) = ty {
                    let untyped = writer.binding(key).is_some_and(|b| b.ty.is_none());
                    if untyped || record.kind.is_definition() {
                        writer.set_type(key, ty)?;
                    }
                }
                Ok(Materialized::Reused(key))
            }
            None => {
                let key = writer.add_binding(
                    NewBinding {
                        name: record.element_name.clone(),
                        owner,
                        kind: record.kind,
                        linkage: self.linkage(),
                        ty,
                    },
                    name,
                );
                Ok(Materialized::Created(key))
            }
        }
    }
}

/// C: only aggregate scopes exist, and enumerators live in the enclosing
/// (global) scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct CMaterializer;

impl Materializer for CMaterializer {
    fn linkage(&self) -> Linkage {
        Linkage::C
    }

    fn scope_fields(&self) -> &'static [&'static str] {
        &["struct", "union", "enum"]
    }

    fn owner(&self, record: &TagRecord) -> Vec<String> {
        if record.kind == TagKind::Enumerator {
            return Vec::new();
        }
        scope_from_fields(record, self.scope_fields())
    }
}

/// C++: namespaces and classes nest, names are `::` qualified.
#[derive(Debug, Default, Clone, Copy)]
pub struct CppMaterializer;

impl Materializer for CppMaterializer {
    fn linkage(&self) -> Linkage {
        Linkage::Cpp
    }

    fn scope_fields(&self) -> &'static [&'static str] {
        &["class", "struct", "union", "enum", "namespace"]
    }
}

pub fn is_cpp_language(language: &str) -> bool {
    language.eq_ignore_ascii_case("c++") || language.eq_ignore_ascii_case("cpp")
}

/// Pick the materializer for a record by its `language` field.
pub fn materializer_for(record: &TagRecord) -> &'static dyn Materializer {
    static C: CMaterializer = CMaterializer;
    static CPP: CppMaterializer = CppMaterializer;
    match record.language() {
        Some(language) if is_cpp_language(language) => &CPP,
        _ => &C,
    }
}

/// Read the scope from `<kind>:<name>` fields or the combined
/// `scope:<kind>:<name>` form.
fn scope_from_fields(record: &TagRecord, fields: &[&str]) -> Vec<String> {
    let value = fields.iter().find_map(|field| record.field(field)).or_else(|| {
        let (kind, name) = record.field("scope")?.split_once(':')?;
        fields.contains(&kind).then_some(name)
    });
    match value {
        Some(value) => value
            .split("::")
            .flat_map(|part| part.split('.'))
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Type of the record's binding from its `typeref` and `signature`
/// fields. Functions without a `typeref` get C's implicit `int` return.
fn record_type(record: &TagRecord) -> Option<FragmentType> {
    let typeref = record.field("typeref").and_then(parse_typeref);
    match record.field("signature") {
        Some(signature) if record.kind.class() == crate::types::KindClass::Function => {
            Some(FragmentType::Function {
                return_type: Box::new(typeref.unwrap_or_else(|| FragmentType::Basic("int".to_string()))),
                params: parse_signature(signature),
            })
        }
        _ => typeref,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{FragmentRead, IndexFragment, TagFragment};
    use crate::tags::parser::parse_tag_line;
    use crate::types::{FragmentId, KindClass};
    use pretty_assertions::assert_eq;

    fn record(line: &str) -> TagRecord {
        parse_tag_line(line).expect("record")
    }

    #[test]
    fn dispatches_on_language() {
        let cpp = record("get\tw.cpp\t3;\"\tkind:function\tlanguage:C++");
        let c = record("get\tw.c\t3;\"\tkind:function\tlanguage:C");
        let none = record("get\tw.c\t3;\"\tkind:function");
        assert_eq!(materializer_for(&cpp).linkage(), Linkage::Cpp);
        assert_eq!(materializer_for(&c).linkage(), Linkage::C);
        assert_eq!(materializer_for(&none).linkage(), Linkage::C);
    }

    #[test]
    fn prototype_and_definition_share_a_binding() {
        let fragment = TagFragment::new(FragmentId(1));
        let mut writer = fragment.write().expect("writable");
        let proto = record("open\tio.h\t4;\"\tkind:prototype\tlanguage:C\tsignature:(const char *path)");
        let def = record(
            "open\tio.c\t20;\"\tkind:function\tlanguage:C\tsignature:(const char *path)\ttyperef:typename:int",
        );

        let first = CMaterializer.materialize(&mut writer, &proto).expect("proto");
        let second = CMaterializer.materialize(&mut writer, &def).expect("def");
        assert!(matches!(first, Materialized::Created(_)));
        assert_eq!(second, Materialized::Reused(first.key()));

        let binding = writer.binding(first.key()).expect("binding");
        assert_eq!(binding.kind, TagKind::Function);
        assert_eq!(binding.names.len(), 2);
        assert!(matches!(binding.ty, Some(FragmentType::Function { .. })));
        assert_eq!(writer.binding_count(), 1);
    }

    #[test]
    fn same_name_different_class_is_a_new_binding() {
        let fragment = TagFragment::new(FragmentId(1));
        let mut writer = fragment.write().expect("writable");
        CMaterializer
            .materialize(&mut writer, &record("stat\tstat.h\t1;\"\tkind:struct\tlanguage:C"))
            .expect("struct");
        CMaterializer
            .materialize(&mut writer, &record("stat\tstat.h\t9;\"\tkind:prototype\tlanguage:C"))
            .expect("function");
        assert_eq!(writer.binding_count(), 2);
    }

    #[test]
    fn cpp_members_are_scoped() {
        let fragment = TagFragment::new(FragmentId(1));
        {
            let mut writer = fragment.write().expect("writable");
            let member = record("get\tw.cpp\t9;\"\tkind:function\tclass:ns::Widget\tlanguage:C++");
            CppMaterializer.materialize(&mut writer, &member).expect("member");
        }
        let view = fragment.read();
        let found = view.find_bindings("get").expect("lookup");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owner, vec!["ns".to_string(), "Widget".to_string()]);
        assert_eq!(found[0].linkage, Linkage::Cpp);
        assert_eq!(found[0].class, KindClass::Function);
    }

    #[test]
    fn c_enumerators_are_global_and_members_keep_struct_scope() {
        let red = record("RED\tcolor.h\t2;\"\tkind:enumerator\tenum:color\tlanguage:C");
        let x = record("x\tgeo.h\t3;\"\tkind:member\tstruct:point\tlanguage:C\ttyperef:typename:int");
        assert!(CMaterializer.owner(&red).is_empty());
        assert_eq!(CMaterializer.owner(&x), vec!["point".to_string()]);
        assert_eq!(record_type(&x), Some(FragmentType::Basic("int".to_string())));
    }

    #[test]
    fn combined_scope_field() {
        let r = record("x\tgeo.cpp\t3;\"\tkind:member\tscope:struct:geo::point\tlanguage:C++");
        assert_eq!(CppMaterializer.owner(&r), vec!["geo".to_string(), "point".to_string()]);
    }
}
