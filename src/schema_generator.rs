use crate::config::ParserConfig;
use crate::document::{Schema, BOOLEAN, INTEGER, NUMBER, OBJECT, STRING};
use crate::error::{Result, SwagError};
use crate::field_parser::{FieldParser, ANY};
use crate::generics;
use crate::registry::{is_builtin_type, FileId, Registry, TypeSpecDef};
use crate::syntax::ast::{Field, TypeExpr, TypeId};
use crate::syntax::parse_type_expr;
use crate::text::is_exported;
use log::{debug, warn};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Schema generator - turns type references into Swagger schemas.
///
/// Owns the [`Registry`] for the rest of the run, since resolving generic
/// references may add synthesized declarations to it. Every named type that
/// gets resolved ends up as one entry of [`SchemaGenerator::definitions`].
pub struct SchemaGenerator {
    registry: Registry,
    config: ParserConfig,
    /// Built definition schemas, per symbol.
    parsed: HashMap<TypeId, String>,
    /// Definition name to the symbol that claimed it.
    names: BTreeMap<String, TypeId>,
    definitions: BTreeMap<String, Schema>,
    /// Declarations whose definition is being built.
    struct_stack: Vec<TypeId>,
}

/// Schema of a predeclared type, `None` for types with no JSON form.
pub fn primitive_schema(name: &str) -> Option<Schema> {
    let schema = match name {
        "bool" => Schema::primitive(BOOLEAN),
        "int" | "uint" | "uintptr" => Schema::primitive(INTEGER),
        "int8" | "int16" | "int32" | "uint8" | "uint16" | "uint32" | "byte" | "rune" => {
            Schema::primitive(INTEGER).with_format("int32")
        }
        "int64" | "uint64" => Schema::primitive(INTEGER).with_format("int64"),
        "float32" => Schema::primitive(NUMBER).with_format("float"),
        "float64" => Schema::primitive(NUMBER).with_format("double"),
        "string" | "error" => Schema::primitive(STRING),
        "any" => Schema::default(),
        _ => return None,
    };
    Some(schema)
}

/// Properties and required names collected from struct fields.
#[derive(Default)]
struct StructParts {
    properties: BTreeMap<String, Schema>,
    required: Vec<String>,
    /// Embedded types kept by reference because the embedding overrides them.
    composed: Vec<Schema>,
}

impl SchemaGenerator {
    /// Create a new SchemaGenerator over a populated registry.
    pub fn new(registry: Registry, config: ParserConfig) -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            registry,
            config,
            parsed: HashMap::new(),
            names: BTreeMap::new(),
            definitions: BTreeMap::new(),
            struct_stack: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Definitions reached so far.
    pub fn definitions(&self) -> &BTreeMap<String, Schema> {
        &self.definitions
    }

    pub fn into_definitions(self) -> BTreeMap<String, Schema> {
        self.definitions
    }

    pub fn definition(&self, name: &str) -> Option<&Schema> {
        self.definitions.get(name)
    }

    /// Follows a `$ref` to the schema it names.
    pub fn dereference<'s>(&'s self, schema: &'s Schema) -> &'s Schema {
        match schema.ref_name().and_then(|n| self.definitions.get(n)) {
            Some(target) => target,
            None => schema,
        }
    }

    /// Resolves a type written in an annotation, e.g. `[]web.Pet` or `map[string]int`.
    pub fn resolve_type_name(&mut self, name: &str, file: FileId) -> Result<Schema> {
        let name = name.trim();
        let ty = parse_type_expr(name)
            .map_err(|_| SwagError::UnresolvedType(name.to_string()))?;
        self.resolve(&ty, file)
    }

    /// Resolves a type reference in the context of `file`.
    ///
    /// # Errors
    ///
    /// - [`SwagError::UnresolvedType`] when a name is not declared anywhere
    /// - [`SwagError::UnsupportedField`] for channel and function types
    /// - [`SwagError::SkippedField`] when the overrides table removes the type
    /// - [`SwagError::RecursiveStruct`] when embedded structs embed each other
    pub fn resolve(&mut self, ty: &TypeExpr, file: FileId) -> Result<Schema> {
        match ty {
            TypeExpr::Ident(name) if is_builtin_type(name) => primitive_schema(name)
                .ok_or_else(|| SwagError::UnsupportedField(name.clone())),
            TypeExpr::Ident(_) | TypeExpr::Qualified { .. } => {
                self.resolve_named(&ty.to_string(), ty, file)
            }
            TypeExpr::Generic { base, args } => {
                if let Some(schema) = self.override_for(&ty.to_string(), file)? {
                    return Ok(schema);
                }
                let instance = self
                    .registry
                    .lookup_type(&base.to_string(), file)
                    .and_then(|(id, _)| generics::instantiate_exprs(&mut self.registry, id, args, file))
                    .ok_or_else(|| SwagError::UnresolvedType(ty.to_string()))?;
                self.resolve_symbol(instance)
            }
            TypeExpr::Pointer(inner) => self.resolve(inner, file),
            TypeExpr::Slice(inner) | TypeExpr::Array(inner) => {
                Ok(Schema::array(self.resolve(inner, file)?))
            }
            TypeExpr::Map { value, .. } => Ok(Schema::map(self.resolve(value, file)?)),
            TypeExpr::Interface { .. } => Ok(Schema::default()),
            TypeExpr::Struct(fields) => {
                let parts = self.parse_struct_fields(fields, file)?;
                Ok(assemble_object(parts))
            }
            TypeExpr::Resolved(id) => self.resolve_symbol(*id),
            TypeExpr::Func | TypeExpr::Chan(..) | TypeExpr::Tilde(_) | TypeExpr::Union(_) => {
                Err(SwagError::UnsupportedField(ty.to_string()))
            }
        }
    }

    fn override_for(&mut self, key: &str, file: FileId) -> Result<Option<Schema>> {
        let Some(replacement) = self.config.overrides.get(key).cloned() else {
            return Ok(None);
        };
        if replacement.is_empty() {
            debug!("Skipping {} per overrides", key);
            return Err(SwagError::SkippedField(key.to_string()));
        }
        debug!("Replacing {} with {}", key, replacement);
        self.resolve_type_name(&replacement, file).map(Some)
    }

    fn resolve_named(&mut self, written: &str, ty: &TypeExpr, file: FileId) -> Result<Schema> {
        if let Some(schema) = self.override_for(written, file)? {
            return Ok(schema);
        }
        if let TypeExpr::Qualified { package, name } = ty {
            let path = self.registry.find_package_path(package, file);
            let is_time = path.as_deref() == Some("time") || (path.is_none() && package == "time");
            if is_time && name == "Time" {
                return Ok(Schema::primitive(STRING).with_format("date-time"));
            }
        }
        match self.registry.find_type(written, file) {
            Some(id) => self.resolve_symbol(id),
            None => Err(SwagError::UnresolvedType(written.to_string())),
        }
    }

    /// Schema for a declared symbol: a `$ref` to its definition, or the
    /// primitive itself for plain `type X <primitive>` declarations.
    pub fn resolve_symbol(&mut self, id: TypeId) -> Result<Schema> {
        let def = self.registry.type_def(id).clone();
        if let Some(schema) = self.override_for(&def.full_path(), def.file)? {
            return Ok(schema);
        }

        if let TypeExpr::Ident(name) = &def.ty {
            if is_builtin_type(name) && def.enums.is_empty() {
                return primitive_schema(name).ok_or_else(|| SwagError::UnsupportedField(name.clone()));
            }
        }
        if def.is_alias {
            return self.resolve(&def.ty, def.file);
        }

        if let Some(name) = self.parsed.get(&id) {
            return Ok(Schema::reference(name));
        }
        let name = def.type_name();
        if self.struct_stack.contains(&id) {
            debug!("Referencing {} while it is being built", name);
            return Ok(Schema::reference(&name));
        }
        if let Some(&other) = self.names.get(&name) {
            if other != id {
                return Err(SwagError::malformed(format!(
                    "definition name {} is claimed by both {} and {}",
                    name,
                    self.registry.type_def(other).full_path(),
                    def.full_path()
                )));
            }
        }

        self.names.insert(name.clone(), id);
        self.struct_stack.push(id);
        let built = self.build_definition(&def);
        self.struct_stack.pop();
        let schema = match built {
            Ok(schema) => schema,
            Err(e) => {
                self.names.remove(&name);
                return Err(e);
            }
        };
        debug!("Adding definition {}", name);
        self.definitions.insert(name.clone(), schema);
        self.parsed.insert(id, name.clone());
        Ok(Schema::reference(&name))
    }

    fn build_definition(&mut self, def: &TypeSpecDef) -> Result<Schema> {
        let mut schema = self.resolve(&def.ty, def.file)?;
        if !def.enums.is_empty() {
            schema.enum_values = def.enums.iter().map(|e| e.value.clone()).collect();
            schema.extensions.insert(
                "x-enum-varnames".to_string(),
                Value::Array(def.enums.iter().map(|e| Value::String(e.key.clone())).collect()),
            );
            if def.enums.iter().any(|e| !e.comment.is_empty()) {
                let comments: serde_json::Map<String, Value> = def
                    .enums
                    .iter()
                    .filter(|e| !e.comment.is_empty())
                    .map(|e| (e.key.clone(), Value::String(e.comment.clone())))
                    .collect();
                schema
                    .extensions
                    .insert("x-enum-comments".to_string(), Value::Object(comments));
                schema.extensions.insert(
                    "x-enum-descriptions".to_string(),
                    Value::Array(
                        def.enums
                            .iter()
                            .map(|e| Value::String(e.comment.clone()))
                            .collect(),
                    ),
                );
            }
        }
        if let Some(doc) = def.doc.as_ref().map(|d| d.text()).filter(|d| !d.is_empty()) {
            if schema.reference.is_none() {
                schema.description = Some(doc);
            }
        }
        Ok(schema)
    }

    fn parse_struct_fields(&mut self, fields: &[Field], file: FileId) -> Result<StructParts> {
        let mut parts = StructParts::default();
        for field in fields {
            if field.names.is_empty() {
                self.parse_embedded_field(field, file, &mut parts)?;
                continue;
            }
            for name in &field.names {
                if !is_exported(name) {
                    continue;
                }
                let single = Field {
                    names: vec![name.clone()],
                    ..field.clone()
                };
                self.parse_named_field(&single, file, &mut parts)?;
            }
        }
        parts.required.sort();
        parts.required.dedup();
        Ok(parts)
    }

    fn parse_named_field(&mut self, field: &Field, file: FileId, parts: &mut StructParts) -> Result<()> {
        let parser = FieldParser::new(field, self.config.naming_strategy, self.config.required_by_default);
        if parser.should_skip() {
            return Ok(());
        }
        let Some(property) = parser.field_name() else {
            return Ok(());
        };

        let resolved = match parser.custom_schema()? {
            Some(custom) => Ok(custom),
            None => self.resolve(&field.ty, file),
        };
        let mut schema = match resolved {
            Ok(schema) => schema,
            Err(SwagError::SkippedField(_)) => return Ok(()),
            Err(SwagError::UnsupportedField(ty)) if !self.config.strict => {
                warn!("Skipping field {} of unsupported type {}", property, ty);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let types = self.type_path(&schema, 2);
        parser.complement_schema(&mut schema, &types)?;
        if parser.is_required() {
            parts.required.push(property.clone());
        }
        parts.properties.insert(property, schema);
        Ok(())
    }

    fn parse_embedded_field(&mut self, field: &Field, file: FileId, parts: &mut StructParts) -> Result<()> {
        let parser = FieldParser::new(field, self.config.naming_strategy, self.config.required_by_default);
        if parser.should_skip() {
            return Ok(());
        }
        if parser.field_name().is_some() {
            // Named through its json tag, a plain property.
            return self.parse_named_field(field, file, parts);
        }

        let target = field.ty.deref();
        let id = match target {
            TypeExpr::Resolved(id) => Some(*id),
            TypeExpr::Generic { base, args } => self
                .registry
                .lookup_type(&base.to_string(), file)
                .and_then(|(id, _)| generics::instantiate_exprs(&mut self.registry, id, args, file)),
            TypeExpr::Ident(_) | TypeExpr::Qualified { .. } => {
                self.registry.find_type(&target.to_string(), file)
            }
            _ => None,
        };
        let Some(id) = id else {
            return Err(SwagError::UnresolvedType(target.to_string()));
        };
        let def = self.registry.type_def(id).clone();

        let TypeExpr::Struct(fields) = &def.ty else {
            // Embedded non-struct types become a property named after the type.
            let named = Field {
                names: vec![def.name.clone()],
                ..field.clone()
            };
            return self.parse_named_field(&named, file, parts);
        };

        let read_only = parser.is_read_only();
        if read_only {
            let reference = self.resolve_symbol(id)?;
            parts.composed.push(reference);
        }

        if self.struct_stack.contains(&id) {
            let mut chain: Vec<String> = self
                .struct_stack
                .iter()
                .skip_while(|&&s| s != id)
                .map(|&s| self.registry.type_def(s).type_name())
                .collect();
            chain.push(def.type_name());
            return Err(SwagError::RecursiveStruct { chain });
        }
        self.struct_stack.push(id);
        let embedded = self.parse_struct_fields(fields, def.file);
        self.struct_stack.pop();
        let embedded = embedded?;
        if read_only {
            // Overrides sit in the inline member next to the `$ref`.
            for (name, mut schema) in embedded.properties {
                schema.read_only = true;
                parts.properties.insert(name, schema);
            }
            return Ok(());
        }
        for (name, schema) in embedded.properties {
            parts.properties.entry(name).or_insert(schema);
        }
        parts.required.extend(embedded.required);
        parts.composed.extend(embedded.composed);
        Ok(())
    }

    /// Type path of a schema, `$ref`s followed through the definitions.
    pub fn type_path(&self, schema: &Schema, depth: usize) -> Vec<String> {
        if depth == 0 {
            return Vec::new();
        }
        if let Some(name) = schema.ref_name() {
            if let Some(target) = self.definitions.get(name) {
                return self.type_path(target, depth);
            }
            let building = self
                .struct_stack
                .iter()
                .any(|&id| self.registry.type_def(id).type_name() == name);
            return if building {
                vec![OBJECT.to_string()]
            } else {
                Vec::new()
            };
        }
        if schema.schema_type.is_none() {
            if let Some(first) = schema.all_of.first() {
                return self.type_path(first, depth);
            }
            return vec![ANY.to_string()];
        }
        let mut path = vec![schema.type_name().to_string()];
        let nested = schema
            .items
            .as_deref()
            .or(schema.additional_properties.as_deref());
        if let Some(nested) = nested {
            path.extend(self.type_path(nested, depth - 1));
        }
        path
    }
}

fn assemble_object(parts: StructParts) -> Schema {
    let mut object = Schema::object();
    object.properties = parts.properties;
    object.required = parts.required;
    if parts.composed.is_empty() {
        return object;
    }
    let mut all_of = parts.composed;
    if !object.properties.is_empty() {
        all_of.push(object);
    }
    Schema::all_of(all_of)
}
