//! Per-field metadata read from struct tags and field comments.

use crate::config::PropNamingStrategy;
use crate::document::{Extensions, Schema, ARRAY, BOOLEAN, FILE, INTEGER, NUMBER, OBJECT, STRING};
use crate::error::{Result, SwagError};
use crate::syntax::ast::Field;
use crate::syntax::lexer::unescape;
use crate::text::split_unless_nested;
use serde_json::Value;

/// Placeholder type of a schema that accepts any value.
pub const ANY: &str = "any";

const ENUM_VARNAMES: &str = "x-enum-varnames";

/// A Go struct tag such as `json:"id,omitempty" binding:"required"`.
#[derive(Debug, Clone, Copy)]
pub struct StructTag<'a> {
    raw: &'a str,
}

impl<'a> StructTag<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self { raw }
    }

    /// Value for `key`, following the conventional `key:"value"` layout.
    /// Returns `None` when the key is absent or the tag is malformed from that point on.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let mut rest = self.raw;
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                return None;
            }
            let colon = rest.find(|c: char| c == ':' || c == ' ' || c == '"' || c.is_control())?;
            if colon == 0 || !rest[colon..].starts_with(":\"") {
                return None;
            }
            let name = &rest[..colon];
            let body_start = colon + 2;
            let mut end = None;
            let mut escaped = false;
            for (idx, ch) in rest[body_start..].char_indices() {
                match ch {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => {
                        end = Some(body_start + idx);
                        break;
                    }
                    _ => escaped = false,
                }
            }
            let end = end?;
            if name == key {
                return unescape(&rest[body_start..end]).ok();
            }
            rest = &rest[end + 1..];
        }
    }

    pub fn get(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }
}

/// Reads everything a struct field's tag and comments contribute to its schema.
pub struct FieldParser<'a> {
    field: &'a Field,
    tag: StructTag<'a>,
    naming: PropNamingStrategy,
    required_by_default: bool,
}

/// Constraint values collected before they are written to a schema.
#[derive(Default)]
struct Constraints {
    schema_type: String,
    array_type: String,
    format: Option<String>,
    maximum: Option<f64>,
    minimum: Option<f64>,
    multiple_of: Option<f64>,
    max_length: Option<i64>,
    min_length: Option<i64>,
    max_items: Option<i64>,
    min_items: Option<i64>,
    enums: Vec<Value>,
}

impl Constraints {
    fn is_numeric(&self) -> bool {
        is_numeric(&self.schema_type) || is_numeric(&self.array_type)
    }

    fn is_string(&self) -> bool {
        self.schema_type == STRING || self.array_type == STRING
    }

    fn element_type(&self) -> &str {
        if self.schema_type == ARRAY {
            &self.array_type
        } else {
            &self.schema_type
        }
    }
}

fn is_numeric(schema_type: &str) -> bool {
    schema_type == INTEGER || schema_type == NUMBER
}

impl<'a> FieldParser<'a> {
    pub fn new(field: &'a Field, naming: PropNamingStrategy, required_by_default: bool) -> Self {
        Self {
            field,
            tag: StructTag::new(field.tag.as_deref().unwrap_or("")),
            naming,
            required_by_default,
        }
    }

    pub fn tag(&self) -> StructTag<'a> {
        self.tag
    }

    /// `json:"-"` and `swaggerignore:"true"` hide a field.
    pub fn should_skip(&self) -> bool {
        if self.tag.get("swaggerignore").eq_ignore_ascii_case("true") {
            return true;
        }
        self.json_name().as_deref() == Some("-")
    }

    fn json_name(&self) -> Option<String> {
        let json = self.tag.lookup("json")?;
        let name = json.split(',').next().unwrap_or("").trim().to_string();
        (!name.is_empty()).then_some(name)
    }

    /// Property name of a named field. Embedded fields only have one when
    /// their `json` tag names them.
    pub fn field_name(&self) -> Option<String> {
        if let Some(name) = self.json_name() {
            return Some(name);
        }
        let declared = self.field.names.first()?;
        Some(self.naming.apply(declared))
    }

    /// `json:",string"` exposes numbers and booleans as strings.
    pub fn is_string_encoded(&self) -> bool {
        self.tag.get("json").split(',').skip(1).any(|o| o.trim() == "string")
    }

    pub fn is_read_only(&self) -> bool {
        self.tag.get("readonly") == "true"
    }

    /// Description from the doc comment, else the line comment.
    pub fn description(&self) -> Option<String> {
        self.field
            .doc
            .as_ref()
            .map(|d| d.text())
            .filter(|d| !d.is_empty())
            .or_else(|| {
                self.field
                    .comment
                    .as_ref()
                    .map(|c| c.text())
                    .filter(|c| !c.is_empty())
            })
    }

    /// A schema forced by `swaggertype`, which replaces the field's own type.
    pub fn custom_schema(&self) -> Result<Option<Schema>> {
        let swagger_type = self.tag.get("swaggertype");
        if swagger_type.is_empty() {
            return Ok(None);
        }
        let parts: Vec<&str> = swagger_type.split(',').map(str::trim).collect();
        build_custom_schema(&parts).map(Some)
    }

    pub fn is_required(&self) -> bool {
        for key in ["binding", "validate"] {
            for rule in self.tag.get(key).split(',') {
                match rule.trim() {
                    "required" => return true,
                    "optional" => return false,
                    _ => {}
                }
            }
        }
        self.required_by_default
    }

    /// Applies tag constraints and the field description to `schema`.
    ///
    /// `types` is the schema's type path (`["array", "string"]`), resolved
    /// through `$ref` by the caller. A `$ref` schema that gains any property
    /// becomes `allOf: [ref]` with the properties alongside.
    ///
    /// # Errors
    ///
    /// Fails when a constraint does not parse or does not fit the schema type.
    pub fn complement_schema(&self, schema: &mut Schema, types: &[String]) -> Result<()> {
        if types.is_empty() {
            let name = self.field.names.first().cloned().unwrap_or_default();
            return Err(SwagError::malformed(format!("invalid type for field: {}", name)));
        }
        if schema.reference.is_some() {
            let mut extra = Schema::default();
            self.complement(&mut extra, types)?;
            if extra != Schema::default() {
                let reference = std::mem::take(schema);
                extra.all_of = vec![reference];
                *schema = extra;
            }
            return Ok(());
        }
        self.complement(schema, types)
    }

    fn complement(&self, schema: &mut Schema, types: &[String]) -> Result<()> {
        if let Some(description) = self.description() {
            schema.description = Some(description);
        }
        if self.field.tag.is_none() {
            return Ok(());
        }

        let mut field = Constraints {
            schema_type: types[0].clone(),
            format: self.tag.lookup("format"),
            ..Constraints::default()
        };
        if types.len() > 1 && (types[0] == ARRAY || types[0] == OBJECT) {
            field.array_type = types[1].clone();
        }

        for key in ["binding", "validate"] {
            let rules = self.tag.get(key);
            if !rules.is_empty() {
                parse_validation_rules(&rules, &mut field)?;
            }
        }

        let enums = self.tag.get("enums");
        if !enums.is_empty() {
            let element = field.element_type().to_string();
            field.enums = enums
                .split(',')
                .map(|e| define_type(&element, e.trim(), "enums"))
                .collect::<Result<_>>()?;
        }

        let numeric = field.is_numeric();
        let string = field.is_string();
        for (key, slot) in [
            ("maximum", &mut field.maximum),
            ("minimum", &mut field.minimum),
            ("multipleOf", &mut field.multiple_of),
        ] {
            if let Some(raw) = self.tag.lookup(key) {
                if !numeric {
                    return Err(SwagError::mismatch(key, types[0].as_str()));
                }
                let value = raw.trim().parse::<f64>().map_err(|_| {
                    SwagError::malformed(format!("{} value {:?} is not a number", key, raw))
                })?;
                *slot = Some(value);
            }
        }

        for (key, slot) in [
            ("maxLength", &mut field.max_length),
            ("minLength", &mut field.min_length),
        ] {
            if let Some(raw) = self.tag.lookup(key) {
                if !string {
                    return Err(SwagError::mismatch(key, types[0].as_str()));
                }
                let value = raw.trim().parse::<i64>().map_err(|_| {
                    SwagError::malformed(format!("{} value {:?} is not an integer", key, raw))
                })?;
                *slot = Some(value);
            }
        }

        let string_encoded = self.is_string_encoded();
        let mut example = None;
        if string_encoded {
            let zero = match field.schema_type.as_str() {
                STRING => Some("\"\""),
                INTEGER | NUMBER => Some("0"),
                BOOLEAN => Some("false"),
                _ => None,
            };
            if let Some(zero) = zero {
                field.schema_type = STRING.to_string();
                *schema = Schema {
                    description: schema.description.take(),
                    ..Schema::primitive(STRING)
                };
                example = Some(Value::String(zero.to_string()));
            }
        }

        let var_names = self.tag.get(ENUM_VARNAMES);
        if !var_names.is_empty() {
            let names: Vec<Value> = var_names
                .split(',')
                .map(|n| Value::String(n.trim().to_string()))
                .collect();
            if names.len() != field.enums.len() {
                return Err(SwagError::malformed(format!(
                    "invalid count of x-enum-varnames. expected {}, got {}",
                    field.enums.len(),
                    names.len()
                )));
            }
            let target = if field.schema_type == ARRAY {
                element_schema(schema)
            } else {
                &mut *schema
            };
            target
                .extensions
                .insert(ENUM_VARNAMES.to_string(), Value::Array(names));
        }

        let extensions = self.tag.get("extensions");
        if !extensions.is_empty() {
            schema.extensions.extend(parse_extensions(&extensions));
        }

        if field.schema_type == ARRAY {
            schema.max_items = field.max_items.or(schema.max_items);
            schema.min_items = field.min_items.or(schema.min_items);
        } else if let Some(format) = &field.format {
            schema.format = Some(format.clone());
        }
        let pattern = self.tag.lookup("pattern");
        {
            let element = if field.schema_type == ARRAY {
                element_schema(schema)
            } else {
                &mut *schema
            };
            if field.schema_type == ARRAY {
                if let Some(format) = &field.format {
                    element.format = Some(format.clone());
                }
            }
            element.maximum = field.maximum.or(element.maximum);
            element.minimum = field.minimum.or(element.minimum);
            element.multiple_of = field.multiple_of.or(element.multiple_of);
            element.max_length = field.max_length.or(element.max_length);
            element.min_length = field.min_length.or(element.min_length);
            if !field.enums.is_empty() {
                element.enum_values = field.enums.clone();
            }
            if let Some(pattern) = pattern {
                element.pattern = Some(pattern);
            }
        }

        let default = self.tag.get("default");
        if !default.is_empty() {
            schema.default = Some(define_default(&field, &default)?);
        }

        if let Some(raw) = self.tag.lookup("example") {
            example = Some(if string_encoded {
                Value::String(raw)
            } else {
                define_example(&field.schema_type, &field.array_type, &raw)?
            });
        }
        if example.is_some() {
            schema.example = example;
        }

        if self.is_read_only() {
            schema.read_only = true;
        }
        Ok(())
    }
}

/// Parses `x-a,x-b=value,!x-c`: bare names are `true`, `!` names `false`,
/// and values are kept as strings. Commas inside brackets do not split.
pub fn parse_extensions(list: &str) -> Extensions {
    let mut extensions = Extensions::new();
    for entry in split_unless_nested(list, ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once('=') {
            Some((key, value)) => {
                extensions.insert(key.to_string(), Value::String(value.to_string()));
            }
            None => match entry.strip_prefix('!') {
                Some(key) => {
                    extensions.insert(key.to_string(), Value::Bool(false));
                }
                None => {
                    extensions.insert(entry.to_string(), Value::Bool(true));
                }
            },
        }
    }
    extensions
}

/// The element schema of an array, created empty when absent.
fn element_schema(schema: &mut Schema) -> &mut Schema {
    schema.items.get_or_insert_with(Box::default)
}

fn parse_validation_rules(rules: &str, field: &mut Constraints) -> Result<()> {
    for rule in rules.split(',') {
        let rule = rule.trim();
        let (name, value) = rule.split_once('=').unwrap_or((rule, ""));
        match name {
            "max" | "lte" => set_bound(field, value, true)?,
            "min" | "gte" => set_bound(field, value, false)?,
            "oneof" => {
                if !field.enums.is_empty() {
                    continue;
                }
                let element = field.element_type().to_string();
                field.enums = split_one_of(value)
                    .iter()
                    .map(|v| define_type(&element, v, "oneof"))
                    .collect::<Result<_>>()?;
            }
            "dive" => return Ok(()),
            _ => {}
        }
    }
    Ok(())
}

fn set_bound(field: &mut Constraints, value: &str, is_max: bool) -> Result<()> {
    let invalid = || SwagError::malformed(format!("invalid validation bound {:?}", value));
    match field.schema_type.as_str() {
        INTEGER | NUMBER => {
            let v = value.parse::<f64>().map_err(|_| invalid())?;
            if is_max {
                field.maximum = Some(v);
            } else {
                field.minimum = Some(v);
            }
        }
        STRING => {
            let v = value.parse::<i64>().map_err(|_| invalid())?;
            if is_max {
                field.max_length = Some(v);
            } else {
                field.min_length = Some(v);
            }
        }
        ARRAY => {
            let v = value.parse::<i64>().map_err(|_| invalid())?;
            if is_max {
                field.max_items = Some(v);
            } else {
                field.min_items = Some(v);
            }
        }
        _ => {}
    }
    Ok(())
}

/// `oneof='red green' blue` splits on spaces outside single quotes.
fn split_one_of(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in value.chars() {
        match ch {
            '\'' => quoted = !quoted,
            ' ' if !quoted => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Parses a tag value as a value of `schema_type`.
pub fn define_type(schema_type: &str, value: &str, constraint: &str) -> Result<Value> {
    let invalid = || SwagError::malformed(format!("{} is not a valid {} type", value, schema_type));
    match schema_type {
        STRING => Ok(Value::String(value.to_string())),
        INTEGER => value
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        NUMBER => value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        BOOLEAN => value.parse::<bool>().map(Value::Bool).map_err(|_| invalid()),
        other => Err(SwagError::mismatch(constraint, other)),
    }
}

fn define_default(field: &Constraints, value: &str) -> Result<Value> {
    if field.schema_type == ARRAY {
        return value
            .split(',')
            .map(|v| define_type(&field.array_type, v.trim(), "default"))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array);
    }
    define_type(&field.schema_type, value, "default")
}

/// Parses an `example` tag; arrays split on `,` and maps take `key:value` pairs.
pub fn define_example(schema_type: &str, array_type: &str, value: &str) -> Result<Value> {
    match schema_type {
        ARRAY => value
            .split(',')
            .map(|v| define_example(array_type, "", v.trim()))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        OBJECT => {
            if array_type.is_empty() {
                return Err(SwagError::malformed(format!(
                    "{} is unsupported type in example value {}",
                    schema_type, value
                )));
            }
            let mut map = serde_json::Map::new();
            for pair in value.split(',') {
                let (key, item) = pair.split_once(':').ok_or_else(|| {
                    SwagError::malformed(format!(
                        "example value {} should format: key:value",
                        value
                    ))
                })?;
                map.insert(key.to_string(), define_example(array_type, "", item)?);
            }
            Ok(Value::Object(map))
        }
        _ => define_type(schema_type, value, "example"),
    }
}

/// Builds the schema named by `swaggertype`, e.g. `primitive,integer` or `array,number`.
pub fn build_custom_schema(types: &[&str]) -> Result<Schema> {
    let Some((first, rest)) = types.split_first() else {
        return Err(SwagError::malformed("empty swaggertype"));
    };
    match *first {
        "primitive" => {
            if rest.is_empty() {
                return Err(SwagError::malformed("need primitive type after primitive"));
            }
            build_custom_schema(rest)
        }
        ARRAY => {
            if rest.is_empty() {
                return Err(SwagError::malformed("need array item type after array"));
            }
            Ok(Schema::array(build_custom_schema(rest)?))
        }
        OBJECT => {
            if rest.is_empty() {
                return Ok(Schema::object());
            }
            Ok(Schema::map(build_custom_schema(rest)?))
        }
        STRING | NUMBER | INTEGER | BOOLEAN | FILE => Ok(Schema::primitive(first)),
        other => Err(SwagError::malformed(format!("{} is not supported type", other))),
    }
}

/// Type path of a schema that is not a `$ref`: `["array", "string"]`,
/// `["object", "integer"]` for maps, `["any"]` for the empty schema.
pub fn schema_type_path(schema: &Schema, depth: usize) -> Vec<String> {
    if depth == 0 || schema.reference.is_some() {
        return Vec::new();
    }
    match schema.schema_type.as_deref() {
        Some(ARRAY) => {
            let mut path = vec![ARRAY.to_string()];
            if let Some(items) = &schema.items {
                path.extend(schema_type_path(items, depth - 1));
            }
            path
        }
        Some(OBJECT) => {
            let mut path = vec![OBJECT.to_string()];
            if let Some(value) = &schema.additional_properties {
                path.extend(schema_type_path(value, depth - 1));
            }
            path
        }
        Some(other) => vec![other.to_string()],
        None => vec![ANY.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::{CommentGroup, TypeExpr};
    use serde_json::json;

    fn field(tag: &str) -> Field {
        Field {
            names: vec!["Test".to_string()],
            ty: TypeExpr::ident("string"),
            tag: Some(tag.to_string()),
            doc: None,
            comment: None,
        }
    }

    fn complement(tag: &str, schema: &mut Schema) -> Result<()> {
        let field = field(tag);
        let types = schema_type_path(schema, 2);
        FieldParser::new(&field, PropNamingStrategy::CamelCase, false).complement_schema(schema, &types)
    }

    fn parser_required(tag: &str, by_default: bool) -> bool {
        let field = field(tag);
        FieldParser::new(&field, PropNamingStrategy::CamelCase, by_default).is_required()
    }

    #[test]
    fn test_struct_tag_lookup() {
        let tag = StructTag::new(r#"json:"id,omitempty" example:"say \"hi\"" empty:"""#);
        assert_eq!(tag.lookup("json").as_deref(), Some("id,omitempty"));
        assert_eq!(tag.lookup("example").as_deref(), Some("say \"hi\""));
        assert_eq!(tag.lookup("empty").as_deref(), Some(""));
        assert_eq!(tag.lookup("missing"), None);
    }

    #[test]
    fn test_example_tag() {
        let mut schema = Schema::primitive(STRING);
        complement(r#"json:"test" example:"one""#, &mut schema).unwrap();
        assert_eq!(schema.example, Some(json!("one")));

        let mut schema = Schema::primitive(STRING);
        complement(r#"json:"test" example:"""#, &mut schema).unwrap();
        assert_eq!(schema.example, Some(json!("")));

        let mut schema = Schema::primitive("float");
        assert!(complement(r#"json:"test" example:"one""#, &mut schema).is_err());

        let mut schema = Schema::array(Schema::primitive(INTEGER));
        complement(r#"example:"1,2""#, &mut schema).unwrap();
        assert_eq!(schema.example, Some(json!([1, 2])));

        let mut schema = Schema::map(Schema::primitive(STRING));
        complement(r#"example:"a:x,b:y""#, &mut schema).unwrap();
        assert_eq!(schema.example, Some(json!({"a": "x", "b": "y"})));
    }

    #[test]
    fn test_format_tag() {
        let mut schema = Schema::primitive(STRING);
        complement(r#"json:"test" format:"csv""#, &mut schema).unwrap();
        assert_eq!(schema.format.as_deref(), Some("csv"));
    }

    #[test]
    fn test_required_tags() {
        assert!(parser_required(r#"json:"test" binding:"required""#, false));
        assert!(parser_required(r#"json:"test" validate:"required""#, false));
        assert!(parser_required(r#"json:"test""#, true));
        assert!(!parser_required(r#"json:"test" binding:"optional""#, true));
        assert!(!parser_required(r#"json:"test" validate:"optional""#, true));
        assert!(!parser_required(r#"json:"test""#, false));
    }

    #[test]
    fn test_extensions_tag() {
        let mut schema = Schema::primitive(INTEGER);
        complement(
            r#"json:"test" extensions:"x-nullable,x-abc=def,!x-omitempty,x-example=[0, 9],x-example2={çãíœ, (bar=(abc, def)), [0,9]}""#,
            &mut schema,
        )
        .unwrap();
        assert_eq!(schema.extensions["x-nullable"], json!(true));
        assert_eq!(schema.extensions["x-abc"], json!("def"));
        assert_eq!(schema.extensions["x-omitempty"], json!(false));
        assert_eq!(schema.extensions["x-example"], json!("[0, 9]"));
        assert_eq!(
            schema.extensions["x-example2"],
            json!("{çãíœ, (bar=(abc, def)), [0,9]}")
        );
    }

    #[test]
    fn test_enums_tag() {
        let mut schema = Schema::primitive(STRING);
        complement(r#"json:"test" enums:"a,b,c""#, &mut schema).unwrap();
        assert_eq!(schema.enum_values, vec![json!("a"), json!("b"), json!("c")]);

        let mut schema = Schema::primitive("float");
        let err = complement(r#"json:"test" enums:"a,b,c""#, &mut schema).unwrap_err();
        assert!(matches!(err, SwagError::ConstraintTypeMismatch { .. }));

        let mut schema = Schema::primitive(INTEGER);
        assert!(complement(r#"enums:"1,x""#, &mut schema).is_err());
    }

    #[test]
    fn test_enum_varnames_tag() {
        let mut schema = Schema::primitive(INTEGER);
        complement(
            r#"json:"test" enums:"0,1,2" x-enum-varnames:"Daily,Weekly,Monthly""#,
            &mut schema,
        )
        .unwrap();
        assert_eq!(
            schema.extensions[ENUM_VARNAMES],
            json!(["Daily", "Weekly", "Monthly"])
        );

        let mut schema = Schema::primitive(INTEGER);
        assert!(complement(
            r#"json:"test" enums:"0,1,2,3" x-enum-varnames:"Daily,Weekly,Monthly""#,
            &mut schema
        )
        .is_err());

        let mut schema = Schema::array(Schema::primitive(INTEGER));
        complement(
            r#"json:"test" enums:"0,1,2" x-enum-varnames:"Daily,Weekly,Monthly""#,
            &mut schema,
        )
        .unwrap();
        let items = schema.items.as_ref().unwrap();
        assert_eq!(items.extensions[ENUM_VARNAMES], json!(["Daily", "Weekly", "Monthly"]));
        assert_eq!(items.enum_values, vec![json!(0), json!(1), json!(2)]);
        assert!(schema.extensions.is_empty());
    }

    #[test]
    fn test_default_tag() {
        let mut schema = Schema::primitive(STRING);
        complement(r#"json:"test" default:"pass""#, &mut schema).unwrap();
        assert_eq!(schema.default, Some(json!("pass")));

        let mut schema = Schema::primitive("float");
        assert!(complement(r#"json:"test" default:"pass""#, &mut schema).is_err());
    }

    #[test]
    fn test_numeric_constraints() {
        let mut schema = Schema::primitive(INTEGER);
        complement(r#"json:"test" maximum:"1""#, &mut schema).unwrap();
        assert_eq!(schema.maximum, Some(1.0));

        let mut schema = Schema::primitive(INTEGER);
        assert!(complement(r#"json:"test" maximum:"one""#, &mut schema).is_err());

        let mut schema = Schema::primitive(NUMBER);
        complement(r#"json:"test" multipleOf:"1""#, &mut schema).unwrap();
        assert_eq!(schema.multiple_of, Some(1.0));

        let mut schema = Schema::primitive(NUMBER);
        assert!(complement(r#"json:"test" multipleOf:"one""#, &mut schema).is_err());

        let mut schema = Schema::primitive(INTEGER);
        complement(r#"json:"test" minimum:"1""#, &mut schema).unwrap();
        assert_eq!(schema.minimum, Some(1.0));

        let mut schema = Schema::primitive(STRING);
        let err = complement(r#"json:"test" minimum:"1""#, &mut schema).unwrap_err();
        assert_eq!(err.to_string(), "minimum is not supported for string field");
    }

    #[test]
    fn test_string_constraints() {
        let mut schema = Schema::primitive(STRING);
        complement(r#"json:"test" maxLength:"1" minLength:"0" pattern:"^a+$""#, &mut schema).unwrap();
        assert_eq!(schema.max_length, Some(1));
        assert_eq!(schema.min_length, Some(0));
        assert_eq!(schema.pattern.as_deref(), Some("^a+$"));

        let mut schema = Schema::primitive(STRING);
        assert!(complement(r#"json:"test" maxLength:"one""#, &mut schema).is_err());

        let mut schema = Schema::primitive(BOOLEAN);
        assert!(complement(r#"json:"test" maxLength:"1""#, &mut schema).is_err());
    }

    #[test]
    fn test_array_constraints_apply_to_items() {
        let mut schema = Schema::array(Schema::primitive(INTEGER));
        complement(r#"binding:"min=1,max=3" maximum:"10""#, &mut schema).unwrap();
        assert_eq!(schema.min_items, Some(1));
        assert_eq!(schema.max_items, Some(3));
        assert_eq!(schema.items.as_ref().unwrap().maximum, Some(10.0));
    }

    #[test]
    fn test_validation_rules() {
        let mut schema = Schema::primitive(INTEGER);
        complement(r#"validate:"required,min=1,max=10""#, &mut schema).unwrap();
        assert_eq!((schema.minimum, schema.maximum), (Some(1.0), Some(10.0)));

        let mut schema = Schema::primitive(STRING);
        complement(r#"binding:"oneof=red 'dark green' blue""#, &mut schema).unwrap();
        assert_eq!(
            schema.enum_values,
            vec![json!("red"), json!("dark green"), json!("blue")]
        );
    }

    #[test]
    fn test_string_encoded_numbers() {
        let mut schema = Schema::primitive(INTEGER).with_format("int64");
        complement(r#"json:"id,string""#, &mut schema).unwrap();
        assert_eq!(schema.schema_type.as_deref(), Some(STRING));
        assert_eq!(schema.format, None);
        assert_eq!(schema.example, Some(json!("0")));

        let mut schema = Schema::primitive(BOOLEAN);
        complement(r#"json:"ok,string" example:"true""#, &mut schema).unwrap();
        assert_eq!(schema.example, Some(json!("true")));
    }

    #[test]
    fn test_reference_gains_all_of_wrapper() {
        let mut schema = Schema::reference("web.Owner");
        let mut owner = field(r#"json:"owner" readonly:"true""#);
        owner.comment = Some(CommentGroup {
            comments: vec!["// pet owner".to_string()],
            start_line: 1,
            end_line: 1,
        });
        FieldParser::new(&owner, PropNamingStrategy::CamelCase, false)
            .complement_schema(&mut schema, &[OBJECT.to_string()])
            .unwrap();
        assert_eq!(schema.all_of, vec![Schema::reference("web.Owner")]);
        assert_eq!(schema.description.as_deref(), Some("pet owner"));
        assert!(schema.read_only);

        let mut plain = Schema::reference("web.Owner");
        complement_with_types(r#"json:"owner""#, &mut plain, &[OBJECT.to_string()]);
        assert_eq!(plain, Schema::reference("web.Owner"));
    }

    fn complement_with_types(tag: &str, schema: &mut Schema, types: &[String]) {
        let field = field(tag);
        FieldParser::new(&field, PropNamingStrategy::CamelCase, false)
            .complement_schema(schema, types)
            .unwrap();
    }

    #[test]
    fn test_field_names_and_skips() {
        let named = field(r#"json:"pet_id,omitempty""#);
        assert_eq!(
            FieldParser::new(&named, PropNamingStrategy::CamelCase, false).field_name(),
            Some("pet_id".to_string())
        );
        let mut untagged = field("");
        untagged.names = vec!["UserID".to_string()];
        assert_eq!(
            FieldParser::new(&untagged, PropNamingStrategy::SnakeCase, false).field_name(),
            Some("user_id".to_string())
        );
        let mut embedded = field("");
        embedded.names.clear();
        assert_eq!(
            FieldParser::new(&embedded, PropNamingStrategy::CamelCase, false).field_name(),
            None
        );
        let ignored = field(r#"json:"-""#);
        assert!(FieldParser::new(&ignored, PropNamingStrategy::CamelCase, false).should_skip());
        let hidden = field(r#"swaggerignore:"true""#);
        assert!(FieldParser::new(&hidden, PropNamingStrategy::CamelCase, false).should_skip());
    }

    #[test]
    fn test_custom_schema() {
        assert_eq!(
            build_custom_schema(&["primitive", "integer"]).unwrap(),
            Schema::primitive(INTEGER)
        );
        assert_eq!(
            build_custom_schema(&["array", "number"]).unwrap(),
            Schema::array(Schema::primitive(NUMBER))
        );
        assert_eq!(
            build_custom_schema(&["object", "string"]).unwrap(),
            Schema::map(Schema::primitive(STRING))
        );
        assert!(build_custom_schema(&["primitive"]).is_err());
        assert!(build_custom_schema(&["array"]).is_err());
        assert!(build_custom_schema(&["float"]).is_err());
    }
}
