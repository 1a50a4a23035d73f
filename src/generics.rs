//! Instantiation of generic type declarations.
//!
//! An instance is a synthesized [`TypeSpecDef`] whose type parameters have
//! been substituted by the given arguments. Arguments that resolve to a
//! declaration are bound as [`TypeExpr::Resolved`], so they keep the file
//! context they were written in; everything else (primitives, maps of
//! primitives) is bound literally.

use crate::registry::{FileId, Registry};
use crate::syntax::{self, ast::Field, ast::TypeExpr, ast::TypeId};
use crate::text::split_unless_nested;
use log::debug;
use std::collections::HashMap;

/// One type argument after `[]` prefixes were counted off.
#[derive(Debug, Clone)]
struct TypeArg {
    depth: usize,
    /// The element type, bound as written when it is not a declaration.
    element: TypeExpr,
    resolved: Option<TypeId>,
}

impl TypeArg {
    fn binding(&self) -> TypeExpr {
        let mut ty = match self.resolved {
            Some(id) => TypeExpr::Resolved(id),
            None => self.element.clone(),
        };
        for _ in 0..self.depth {
            ty = TypeExpr::Slice(Box::new(ty));
        }
        ty
    }

    fn name_part(&self, registry: &Registry) -> String {
        let base = match self.resolved {
            Some(id) => registry.type_def(id).type_name(),
            None => self.element.to_string(),
        };
        let prefix = match self.depth {
            0 => String::new(),
            1 => "array_".to_string(),
            n => format!("array{}_", n),
        };
        format!("{}{}", prefix, base).replace('.', "_")
    }
}

/// Instantiates `generic` with a raw argument list such as `types.Post, []string`.
///
/// # Returns
///
/// `None` when the declaration has no type parameters or the number of
/// arguments does not match them.
pub fn instantiate(registry: &mut Registry, generic: TypeId, args: &str, file: FileId) -> Option<TypeId> {
    let exprs: Vec<TypeExpr> = split_unless_nested(args, ',')
        .into_iter()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| syntax::parse_type_expr(a).unwrap_or_else(|_| TypeExpr::ident(a)))
        .collect();
    instantiate_exprs(registry, generic, &exprs, file)
}

/// Instantiates `generic` with already parsed arguments.
pub fn instantiate_exprs(
    registry: &mut Registry,
    generic: TypeId,
    args: &[TypeExpr],
    file: FileId,
) -> Option<TypeId> {
    let original = registry.type_def(generic).clone();
    if original.type_params.is_empty() || original.type_params.len() != args.len() {
        debug!(
            "Cannot instantiate {} with {} arguments",
            original.type_name(),
            args.len()
        );
        return None;
    }

    let mut resolved_args = Vec::with_capacity(args.len());
    for arg in args {
        resolved_args.push(resolve_arg(registry, arg, file));
    }

    let parts: Vec<String> = resolved_args
        .iter()
        .map(|a| a.name_part(registry))
        .collect();
    let name = format!("{}-{}", original.type_name(), parts.join("-"));
    if let Some(existing) = registry.instance(&name) {
        return Some(existing);
    }

    let bindings: HashMap<String, TypeExpr> = original
        .type_params
        .iter()
        .zip(&resolved_args)
        .map(|(param, arg)| (param.name.clone(), arg.binding()))
        .collect();

    let mut instance = original;
    instance.ty = substitute(&instance.ty, &bindings);
    instance.type_params = Vec::new();
    instance.instance_name = Some(name);
    instance.origin = Some(generic);
    instance.enums = Vec::new();
    Some(registry.add_instance(instance))
}

fn resolve_arg(registry: &mut Registry, arg: &TypeExpr, file: FileId) -> TypeArg {
    let mut depth = 0;
    let mut element = arg;
    loop {
        match element {
            TypeExpr::Slice(inner) | TypeExpr::Array(inner) => {
                depth += 1;
                element = inner;
            }
            TypeExpr::Pointer(inner) => element = inner,
            _ => break,
        }
    }
    let resolved = match element {
        TypeExpr::Resolved(id) => Some(*id),
        TypeExpr::Ident(_) | TypeExpr::Qualified { .. } => {
            registry.find_type(&element.to_string(), file)
        }
        TypeExpr::Generic { base, args } => registry
            .lookup_type(&base.to_string(), file)
            .and_then(|(id, _)| instantiate_exprs(registry, id, args, file)),
        _ => None,
    };
    TypeArg {
        depth,
        element: element.clone(),
        resolved,
    }
}

/// Replaces type parameter names by their bindings.
fn substitute(ty: &TypeExpr, bindings: &HashMap<String, TypeExpr>) -> TypeExpr {
    let sub = |inner: &TypeExpr| Box::new(substitute(inner, bindings));
    match ty {
        TypeExpr::Ident(name) => bindings.get(name).cloned().unwrap_or_else(|| ty.clone()),
        TypeExpr::Generic { base, args } => TypeExpr::Generic {
            base: base.clone(),
            args: args.iter().map(|a| substitute(a, bindings)).collect(),
        },
        TypeExpr::Pointer(inner) => TypeExpr::Pointer(sub(inner)),
        TypeExpr::Slice(inner) => TypeExpr::Slice(sub(inner)),
        TypeExpr::Array(inner) => TypeExpr::Array(sub(inner)),
        TypeExpr::Map { key, value } => TypeExpr::Map {
            key: sub(key),
            value: sub(value),
        },
        TypeExpr::Chan(dir, inner) => TypeExpr::Chan(*dir, sub(inner)),
        TypeExpr::Struct(fields) => TypeExpr::Struct(
            fields
                .iter()
                .map(|field| Field {
                    ty: substitute(&field.ty, bindings),
                    ..field.clone()
                })
                .collect(),
        ),
        TypeExpr::Tilde(inner) => TypeExpr::Tilde(sub(inner)),
        TypeExpr::Union(terms) => {
            TypeExpr::Union(terms.iter().map(|t| substitute(t, bindings)).collect())
        }
        TypeExpr::Qualified { .. }
        | TypeExpr::Func
        | TypeExpr::Interface { .. }
        | TypeExpr::Resolved(_) => ty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ParseFlag;
    use std::path::Path;

    const WEB: &str = r#"
package web

import "example.com/app/types"

type GenericResponse[T any] struct {
	Data  T
	Items []T
	Meta  map[string]T
}

type Pair[K comparable, V any] struct {
	Key   K
	Value V
}

type Page[T any] struct {
	Inner GenericResponse[T]
}

type Plain struct {
	Post types.Post
}
"#;

    fn registry() -> (Registry, FileId) {
        let mut registry = Registry::new();
        registry
            .parse_file(
                "example.com/app/types",
                "/app/types/post.go",
                "package types\ntype Post struct {\n\tID int\n}\n",
                ParseFlag::All,
            )
            .unwrap();
        let web = registry
            .parse_file("example.com/app/web", "/app/web/resp.go", WEB, ParseFlag::All)
            .unwrap();
        registry.parse_types();
        (registry, web)
    }

    fn field_types(registry: &Registry, id: TypeId) -> Vec<TypeExpr> {
        match &registry.type_def(id).ty {
            TypeExpr::Struct(fields) => fields.iter().map(|f| f.ty.clone()).collect(),
            other => panic!("expected struct, got {}", other),
        }
    }

    #[test]
    fn test_instance_naming() {
        let (mut registry, web) = registry();
        let cases = [
            ("GenericResponse[types.Post]", "web.GenericResponse-types_Post"),
            ("GenericResponse[[]types.Post]", "web.GenericResponse-array_types_Post"),
            ("GenericResponse[[][]string]", "web.GenericResponse-array2_string"),
            ("web.Pair[string, int]", "web.Pair-string-int"),
            (
                "Page[GenericResponse[types.Post]]",
                "web.Page-web_GenericResponse-types_Post",
            ),
        ];
        for (reference, expected) in cases {
            let id = registry.find_type(reference, web).unwrap();
            assert_eq!(registry.type_def(id).type_name(), expected, "{}", reference);
        }
    }

    #[test]
    fn test_substitution_binds_resolved_symbols() {
        let (mut registry, web) = registry();
        let post = registry
            .find_type("types.Post", web)
            .unwrap();
        let id = registry.find_type("GenericResponse[types.Post]", web).unwrap();
        assert_eq!(
            field_types(&registry, id),
            vec![
                TypeExpr::Resolved(post),
                TypeExpr::Slice(Box::new(TypeExpr::Resolved(post))),
                TypeExpr::Map {
                    key: Box::new(TypeExpr::ident("string")),
                    value: Box::new(TypeExpr::Resolved(post)),
                },
            ]
        );
        let def = registry.type_def(id);
        assert!(!def.is_generic());
        assert!(def.origin.is_some());
        assert_eq!(def.full_path(), "example.com/app/web.GenericResponse-types_Post");
    }

    #[test]
    fn test_primitive_arguments_are_bound_literally() {
        let (mut registry, web) = registry();
        let id = registry.find_type("Pair[string, []int]", web).unwrap();
        assert_eq!(
            field_types(&registry, id),
            vec![
                TypeExpr::ident("string"),
                TypeExpr::Slice(Box::new(TypeExpr::ident("int"))),
            ]
        );
    }

    #[test]
    fn test_instances_are_shared() {
        let (mut registry, web) = registry();
        let a = registry.find_type("GenericResponse[types.Post]", web).unwrap();
        let count = registry.type_count();
        let b = registry
            .find_type("web.GenericResponse[types.Post]", web)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.type_count(), count);
        assert_eq!(registry.instance("web.GenericResponse-types_Post"), Some(a));
    }

    #[test]
    fn test_mismatched_or_non_generic_targets() {
        let (mut registry, web) = registry();
        let pair = registry.lookup_type("Pair", web).unwrap().0;
        assert!(instantiate(&mut registry, pair, "string", web).is_none());
        let plain = registry.lookup_type("Plain", web).unwrap().0;
        assert!(instantiate(&mut registry, plain, "string", web).is_none());
        assert!(registry.find_type("Pair[string]", web).is_none());
        assert!(registry.file_id(Path::new("/app/web/resp.go")).is_some());
    }
}
