use crate::const_eval::{self, ConstType, ConstValue};
use crate::error::Result;
use crate::generics;
use crate::parser::{is_under, ParsedFile};
use crate::syntax::ast::{CommentGroup, Decl, Expr, TypeExpr, TypeId, TypeParam};
use crate::text::full_path_to_name;
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// What a file contributes to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseFlag {
    /// Type declarations only (dependencies, vendored code).
    Models,
    /// Operation comments only.
    Operations,
    All,
}

impl ParseFlag {
    pub fn models(self) -> bool {
        matches!(self, ParseFlag::Models | ParseFlag::All)
    }

    pub fn operations(self) -> bool {
        matches!(self, ParseFlag::Operations | ParseFlag::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstId(pub usize);

/// A Go package as seen through the files indexed for it.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub path: String,
    pub name: String,
    /// Declared name (or `Func.Name` for function-scoped types) to symbol.
    pub types: BTreeMap<String, TypeId>,
    pub consts: BTreeMap<String, ConstId>,
    /// Constants in declaration order, files taken in path order.
    pub const_order: Vec<ConstId>,
    pub files: Vec<FileId>,
}

/// One member of an enumeration, derived from a typed constant.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub key: String,
    pub value: serde_json::Value,
    pub comment: String,
}

/// A declared (or synthesized) type.
#[derive(Debug, Clone)]
pub struct TypeSpecDef {
    pub file: FileId,
    pub package_path: String,
    pub package_name: String,
    /// Declared name; for instances this is the generic's name.
    pub name: String,
    /// Enclosing function for types declared inside a function body.
    pub func_name: Option<String>,
    pub type_params: Vec<TypeParam>,
    pub is_alias: bool,
    pub ty: TypeExpr,
    pub doc: Option<CommentGroup>,
    pub comment: Option<CommentGroup>,
    pub not_unique: bool,
    pub enums: Vec<EnumValue>,
    /// Rendered name of a generic instantiation, e.g. `web.Response-types_Post`.
    pub instance_name: Option<String>,
    /// The generic declaration an instance was synthesized from.
    pub origin: Option<TypeId>,
}

impl TypeSpecDef {
    fn scoped_name(&self) -> String {
        match &self.func_name {
            Some(func) => format!("{}.{}", func, self.name),
            None => self.name.clone(),
        }
    }

    /// Name given by a `// @name Other` line comment.
    pub fn name_override(&self) -> Option<String> {
        let comment = self.comment.as_ref()?;
        comment.lines().iter().find_map(|line| {
            let mut words = line.split_whitespace();
            let first = words.next()?;
            if first.eq_ignore_ascii_case("@name") {
                words.next().map(str::to_string)
            } else {
                None
            }
        })
    }

    /// The name used for this type in the definitions map.
    pub fn type_name(&self) -> String {
        if let Some(instance) = &self.instance_name {
            return instance.clone();
        }
        if let Some(renamed) = self.name_override() {
            return renamed;
        }
        self.short_name()
    }

    /// `pkg.Name`, or the package-qualified form when the short one is ambiguous.
    fn short_name(&self) -> String {
        let prefix = if self.not_unique {
            full_path_to_name(&self.package_path)
        } else {
            self.package_name.clone()
        };
        format!("{}.{}", prefix, self.scoped_name())
    }

    /// `import/path.Name`, the key used by the overrides table.
    pub fn full_path(&self) -> String {
        match &self.instance_name {
            Some(instance) => {
                let suffix = instance.rsplit_once('.').map(|(_, s)| s).unwrap_or(instance);
                format!("{}.{}", self.package_path, suffix)
            }
            None => format!("{}.{}", self.package_path, self.scoped_name()),
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// A constant declaration, after the implicit repetition rule has been applied.
#[derive(Debug, Clone)]
pub struct ConstVariable {
    pub file: FileId,
    pub package_path: String,
    pub name: String,
    pub expr: Option<Expr>,
    pub ty: Option<TypeExpr>,
    pub iota: i64,
    pub comment: Option<String>,
    pub value: Option<ConstValue>,
    pub value_type: ConstType,
}

/// The cross-package symbol table for one run.
#[derive(Debug, Default)]
pub struct Registry {
    files: Vec<ParsedFile>,
    paths: HashMap<PathBuf, FileId>,
    collected: HashSet<FileId>,
    packages: BTreeMap<String, Package>,
    types: Vec<TypeSpecDef>,
    consts: Vec<ConstVariable>,
    /// Rendered `pkg.Name` -> symbol; `None` marks a name claimed by several packages.
    unique: BTreeMap<String, Option<TypeId>>,
    instances: HashMap<String, TypeId>,
    goroot: Option<PathBuf>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_goroot(mut self, goroot: Option<PathBuf>) -> Self {
        self.goroot = goroot;
        self
    }

    /// Adds a parsed file. Indexing a path twice keeps the first unit.
    pub fn index(&mut self, unit: ParsedFile) -> FileId {
        if let Some(&id) = self.paths.get(&unit.path) {
            debug!("Skipping already indexed file {}", unit.path.display());
            return id;
        }
        let id = FileId(self.files.len());
        let package = self
            .packages
            .entry(unit.package_path.clone())
            .or_insert_with(|| Package {
                path: unit.package_path.clone(),
                name: unit.package_name().to_string(),
                ..Package::default()
            });
        package.files.push(id);
        self.paths.insert(unit.path.clone(), id);
        self.files.push(unit);
        id
    }

    /// Parses `source` and indexes it.
    pub fn parse_file(
        &mut self,
        package_path: &str,
        path: impl Into<PathBuf>,
        source: &str,
        flag: ParseFlag,
    ) -> Result<FileId> {
        let path = path.into();
        if let Some(&id) = self.paths.get(&path) {
            return Ok(id);
        }
        let unit = ParsedFile::from_source(path, package_path, flag, source)?;
        Ok(self.index(unit))
    }

    pub fn file(&self, id: FileId) -> &ParsedFile {
        &self.files[id.0]
    }

    pub fn file_id(&self, path: &Path) -> Option<FileId> {
        self.paths.get(path).copied()
    }

    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.get(path)
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn type_def(&self, id: TypeId) -> &TypeSpecDef {
        &self.types[id.0]
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn constant(&self, id: ConstId) -> &ConstVariable {
        &self.consts[id.0]
    }

    /// Every indexed file in path order, leaving out vendored and toolchain sources.
    pub fn all_units(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = (0..self.files.len())
            .map(FileId)
            .filter(|&id| {
                let file = self.file(id);
                !file.package_path.starts_with("vendor")
                    && !self
                        .goroot
                        .as_deref()
                        .map(|root| is_under(&file.path, root))
                        .unwrap_or(false)
            })
            .collect();
        ids.sort_by(|a, b| self.file(*a).path.cmp(&self.file(*b).path));
        ids
    }

    /// Files flagged for operation parsing, in path order.
    pub fn range_files(&self) -> Vec<FileId> {
        self.all_units()
            .into_iter()
            .filter(|&id| self.file(id).flag.operations())
            .collect()
    }

    /// Collects type and constant declarations of every file not yet seen,
    /// disambiguates colliding names and evaluates constants into enums.
    pub fn parse_types(&mut self) {
        let mut pending: Vec<FileId> = (0..self.files.len())
            .map(FileId)
            .filter(|id| !self.collected.contains(id))
            .collect();
        pending.sort_by(|a, b| self.file(*a).path.cmp(&self.file(*b).path));
        for id in pending {
            self.collect_file(id);
            self.collected.insert(id);
        }
        self.mark_not_unique();
        self.evaluate_constants();
        debug!(
            "Registry holds {} packages, {} types, {} constants",
            self.packages.len(),
            self.types.len(),
            self.consts.len()
        );
    }

    fn collect_file(&mut self, file_id: FileId) {
        let file = &self.files[file_id.0];
        let package_path = file.package_path.clone();
        let package_name = file.package_name().to_string();
        let mut new_types = Vec::new();
        let mut new_consts = Vec::new();

        for decl in &file.syntax_tree.decls {
            match decl {
                Decl::Type(spec) => new_types.push((None, spec.clone())),
                Decl::Func(func) => {
                    for spec in &func.local_types {
                        new_types.push((Some(func.name.clone()), spec.clone()));
                    }
                }
                Decl::Const(specs) => {
                    let mut last_values: Vec<Expr> = Vec::new();
                    let mut last_type: Option<TypeExpr> = None;
                    for spec in specs {
                        if !spec.values.is_empty() {
                            last_values = spec.values.clone();
                            last_type = spec.ty.clone();
                        }
                        let comment = spec
                            .comment
                            .as_ref()
                            .or(spec.doc.as_ref())
                            .map(CommentGroup::text)
                            .filter(|c| !c.is_empty());
                        for (i, name) in spec.names.iter().enumerate() {
                            new_consts.push(ConstVariable {
                                file: file_id,
                                package_path: package_path.clone(),
                                name: name.clone(),
                                expr: last_values.get(i).cloned(),
                                ty: last_type.clone(),
                                iota: spec.iota,
                                comment: comment.clone(),
                                value: None,
                                value_type: ConstType::Untyped,
                            });
                        }
                    }
                }
            }
        }

        for (func_name, spec) in new_types {
            let def = TypeSpecDef {
                file: file_id,
                package_path: package_path.clone(),
                package_name: package_name.clone(),
                name: spec.name.clone(),
                func_name,
                type_params: spec.type_params,
                is_alias: spec.is_alias,
                ty: spec.ty,
                doc: spec.doc,
                comment: spec.comment,
                not_unique: false,
                enums: Vec::new(),
                instance_name: None,
                origin: None,
            };
            let key = def.scoped_name();
            let id = TypeId(self.types.len());
            let package = self.packages.entry(package_path.clone()).or_default();
            if package.types.contains_key(&key) {
                debug!("Duplicate declaration of {} in {}", key, package_path);
                continue;
            }
            package.types.insert(key, id);
            self.types.push(def);
        }

        for constant in new_consts {
            if constant.name == "_" {
                continue;
            }
            let id = ConstId(self.consts.len());
            let package = self.packages.entry(package_path.clone()).or_default();
            package.consts.entry(constant.name.clone()).or_insert(id);
            package.const_order.push(id);
            self.consts.push(constant);
        }
    }

    /// Names rendered identically by declarations in different packages are
    /// qualified with their package path.
    fn mark_not_unique(&mut self) {
        let mut by_name: BTreeMap<String, Vec<TypeId>> = BTreeMap::new();
        for (idx, def) in self.types.iter_mut().enumerate() {
            if def.instance_name.is_some() {
                continue;
            }
            def.not_unique = false;
            by_name.entry(def.short_name()).or_default().push(TypeId(idx));
        }
        self.unique.clear();
        for (name, ids) in by_name {
            let first_path = &self.types[ids[0].0].package_path;
            let collides = ids
                .iter()
                .any(|id| &self.types[id.0].package_path != first_path);
            if collides {
                debug!("Type name {} is declared by several packages", name);
                self.unique.insert(name, None);
                for id in ids {
                    self.types[id.0].not_unique = true;
                    let qualified = self.types[id.0].short_name();
                    self.unique.entry(qualified).or_insert(Some(id));
                }
            } else {
                self.unique.insert(name, Some(ids[0]));
            }
        }
        for (name, &id) in &self.instances {
            self.unique.insert(name.clone(), Some(id));
        }
    }

    fn evaluate_constants(&mut self) {
        let results = const_eval::evaluate_pending(self);
        for (id, evaluated) in results {
            let constant = &mut self.consts[id.0];
            match evaluated {
                Some(ev) => {
                    constant.value = Some(ev.value);
                    constant.value_type = ev.ty;
                }
                None => {
                    constant.value = None;
                    constant.value_type = ConstType::Untyped;
                }
            }
        }

        for def in &mut self.types {
            def.enums.clear();
        }
        let packages: Vec<Vec<ConstId>> = self
            .packages
            .values()
            .map(|p| p.const_order.clone())
            .collect();
        for order in packages {
            for id in order {
                let constant = &self.consts[id.0];
                let (Some(value), ConstType::Named(type_id)) = (&constant.value, &constant.value_type)
                else {
                    continue;
                };
                let type_id = *type_id;
                let Some(json) = value.to_json() else {
                    continue;
                };
                let enum_value = EnumValue {
                    key: constant.name.clone(),
                    value: json,
                    comment: constant.comment.clone().unwrap_or_default(),
                };
                self.types[type_id.0].enums.push(enum_value);
            }
        }
    }

    /// Looks a constant up by package path and name.
    pub fn find_const(&self, package_path: &str, name: &str) -> Option<ConstId> {
        self.packages.get(package_path)?.consts.get(name).copied()
    }

    /// Resolves an import qualifier used in `file` to a package path.
    pub fn find_package_path(&self, qualifier: &str, file: FileId) -> Option<String> {
        for import in &self.file(file).syntax_tree.imports {
            match import.name.as_deref() {
                Some("_") | Some(".") => continue,
                Some(alias) => {
                    if alias == qualifier {
                        return Some(import.path.clone());
                    }
                }
                None => {
                    let name = match self.packages.get(&import.path) {
                        Some(pkg) if !pkg.name.is_empty() => pkg.name.clone(),
                        _ => default_package_name(&import.path),
                    };
                    if name == qualifier {
                        return Some(import.path.clone());
                    }
                }
            }
        }
        None
    }

    fn type_in_package(&self, package_path: &str, name: &str) -> Option<TypeId> {
        self.packages.get(package_path)?.types.get(name).copied()
    }

    /// Resolves a possibly qualified name without instantiating generics.
    ///
    /// Returns the symbol and, when the name carries `[...]`, the raw
    /// argument list.
    pub fn lookup_type(&self, name: &str, file: FileId) -> Option<(TypeId, Option<String>)> {
        let name = name.trim();
        if is_builtin_type(name) {
            return None;
        }
        let (base, args) = split_generic_suffix(name);
        let found = self.lookup_base(base, file)?;
        Some((found, args.map(str::to_string)))
    }

    fn lookup_base(&self, base: &str, file: FileId) -> Option<TypeId> {
        let unit = self.file(file);

        // Full import path: `github.com/acme/api.Pet`.
        if let Some(slash) = base.rfind('/') {
            let dot = base[slash..].find('.')? + slash;
            return self.type_in_package(&base[..dot], &base[dot + 1..]);
        }

        if let Some((qualifier, rest)) = base.split_once('.') {
            if let Some(path) = self.find_package_path(qualifier, file) {
                if let Some(id) = self.type_in_package(&path, rest) {
                    return Some(id);
                }
            }
            if qualifier == unit.package_name() {
                if let Some(id) = self.type_in_package(&unit.package_path, rest) {
                    return Some(id);
                }
            }
            // `Func.Type` for a type declared inside a function of this package.
            if let Some(id) = self.type_in_package(&unit.package_path, base) {
                return Some(id);
            }
            if let Some(Some(id)) = self.unique.get(base) {
                return Some(*id);
            }
            return self
                .packages
                .values()
                .filter(|p| p.name == qualifier)
                .find_map(|p| p.types.get(rest).copied());
        }

        if let Some(id) = self.type_in_package(&unit.package_path, base) {
            return Some(id);
        }
        unit.syntax_tree
            .imports
            .iter()
            .filter(|i| i.name.as_deref() == Some("."))
            .find_map(|i| self.type_in_package(&i.path, base))
    }

    /// Resolves a type name in the context of `file`, instantiating generics.
    pub fn find_type(&mut self, name: &str, file: FileId) -> Option<TypeId> {
        let (id, args) = self.lookup_type(name, file)?;
        match args {
            Some(args) if self.type_def(id).is_generic() => {
                generics::instantiate(self, id, &args, file)
            }
            _ => Some(id),
        }
    }

    /// Looks up a previously synthesized instance by its rendered name.
    pub fn instance(&self, name: &str) -> Option<TypeId> {
        self.instances.get(name).copied()
    }

    /// Registers a synthesized instance; the first registration of a name wins.
    pub fn add_instance(&mut self, def: TypeSpecDef) -> TypeId {
        let name = def.type_name();
        if let Some(&id) = self.instances.get(&name) {
            return id;
        }
        let id = TypeId(self.types.len());
        debug!("Instantiated generic type {}", name);
        self.types.push(def);
        self.instances.insert(name.clone(), id);
        self.unique.insert(name, Some(id));
        id
    }
}

/// Go's predeclared type names.
pub fn is_builtin_type(name: &str) -> bool {
    matches!(
        name,
        "bool"
            | "byte"
            | "complex64"
            | "complex128"
            | "error"
            | "float32"
            | "float64"
            | "int"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "rune"
            | "string"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
            | "any"
    )
}

/// Splits `pkg.Name[A, B]` into `pkg.Name` and `A, B`.
pub fn split_generic_suffix(name: &str) -> (&str, Option<&str>) {
    match name.find('[') {
        Some(open) if name.ends_with(']') => (&name[..open], Some(&name[open + 1..name.len() - 1])),
        _ => (name, None),
    }
}

/// Package name implied by an import path when the package itself was not indexed.
fn default_package_name(import_path: &str) -> String {
    let mut segments = import_path.rsplit('/');
    let last = segments.next().unwrap_or(import_path);
    let is_major_version = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    let name = if is_major_version {
        segments.next().unwrap_or(last)
    } else {
        last
    };
    let name = match name.rsplit_once(".v") {
        Some((head, version)) if version.chars().all(|c| c.is_ascii_digit()) => head,
        _ => name,
    };
    name.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(files: &[(&str, &str, &str)]) -> Registry {
        let mut registry = Registry::new();
        for (package, path, source) in files {
            registry
                .parse_file(package, *path, source, ParseFlag::All)
                .unwrap();
        }
        registry.parse_types();
        registry
    }

    #[test]
    fn test_index_is_idempotent_per_path() {
        let mut registry = Registry::new();
        let a = registry
            .parse_file("m/a", "/m/a/a.go", "package a\ntype A int\n", ParseFlag::All)
            .unwrap();
        let again = registry
            .parse_file("m/a", "/m/a/a.go", "package a\ntype B int\n", ParseFlag::All)
            .unwrap();
        assert_eq!(a, again);
        registry.parse_types();
        registry.parse_types();
        assert_eq!(registry.type_count(), 1);
        assert_eq!(registry.package("m/a").unwrap().files.len(), 1);
    }

    #[test]
    fn test_find_type_through_import_alias_and_same_package() {
        let mut registry = registry(&[
            ("m/web", "/m/web/pet.go", "package web\ntype Pet struct{}\ntype Tag struct{}\n"),
            (
                "m/api",
                "/m/api/api.go",
                "package api\nimport w \"m/web\"\ntype Local struct{}\n",
            ),
        ]);
        let api = registry.file_id(Path::new("/m/api/api.go")).unwrap();
        let pet = registry.find_type("w.Pet", api).unwrap();
        assert_eq!(registry.type_def(pet).full_path(), "m/web.Pet");
        assert!(registry.find_type("Local", api).is_some());
        // Annotations may name packages the file does not import.
        assert!(registry.find_type("web.Tag", api).is_some());
        assert!(registry.find_type("m/web.Tag", api).is_some());
        assert!(registry.find_type("string", api).is_none());
        assert!(registry.find_type("web.Missing", api).is_none());
    }

    #[test]
    fn test_colliding_names_are_package_qualified() {
        let registry = registry(&[
            ("example.com/a/v1", "/m/v1/user.go", "package model\ntype User struct{}\n"),
            ("example.com/a/v2", "/m/v2/user.go", "package model\ntype User struct{}\n"),
            ("example.com/a/v2", "/m/v2/group.go", "package model\ntype Group struct{}\n"),
        ]);
        let mut names: Vec<String> = (0..registry.type_count())
            .map(|i| registry.type_def(TypeId(i)).type_name())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "example_com_a_v1.User",
                "example_com_a_v2.User",
                "model.Group"
            ]
        );
    }

    #[test]
    fn test_function_scoped_types_and_name_override() {
        let mut registry = registry(&[(
            "m/web",
            "/m/web/h.go",
            "package web\n\ntype Renamed struct{} // @name Other\n\nfunc Handle() {\n\ttype Response struct{}\n}\n",
        )]);
        let file = registry.file_id(Path::new("/m/web/h.go")).unwrap();
        let local = registry.find_type("Handle.Response", file).unwrap();
        assert_eq!(registry.type_def(local).type_name(), "web.Handle.Response");
        let renamed = registry.find_type("Renamed", file).unwrap();
        assert_eq!(registry.type_def(renamed).type_name(), "Other");
    }

    #[test]
    fn test_dot_import_lookup() {
        let mut registry = registry(&[
            ("m/models", "/m/models/m.go", "package models\ntype Item struct{}\n"),
            ("m", "/m/main.go", "package main\nimport . \"m/models\"\n"),
        ]);
        let main = registry.file_id(Path::new("/m/main.go")).unwrap();
        assert!(registry.find_type("Item", main).is_some());
    }

    #[test]
    fn test_all_units_sorted_and_filtered() {
        let mut registry = Registry::new().with_goroot(Some(PathBuf::from("/usr/go")));
        for (pkg, path) in [
            ("m/b", "/m/b/b.go"),
            ("m/a", "/m/a/a.go"),
            ("vendor/x", "/m/vendor/x/x.go"),
            ("fmt", "/usr/go/src/fmt/print.go"),
        ] {
            registry
                .parse_file(pkg, path, "package p\n", ParseFlag::All)
                .unwrap();
        }
        let paths: Vec<PathBuf> = registry
            .all_units()
            .into_iter()
            .map(|id| registry.file(id).path.clone())
            .collect();
        assert_eq!(paths, vec![PathBuf::from("/m/a/a.go"), PathBuf::from("/m/b/b.go")]);
    }

    #[test]
    fn test_default_package_name() {
        assert_eq!(default_package_name("github.com/acme/api"), "api");
        assert_eq!(default_package_name("github.com/acme/api/v2"), "api");
        assert_eq!(default_package_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(default_package_name("github.com/go-chi/chi-render"), "chi_render");
    }

    #[test]
    fn test_split_generic_suffix() {
        assert_eq!(
            split_generic_suffix("types.Pair[string, []int]"),
            ("types.Pair", Some("string, []int"))
        );
        assert_eq!(split_generic_suffix("web.Pet"), ("web.Pet", None));
    }
}
