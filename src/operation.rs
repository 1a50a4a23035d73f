//! Operation annotations.
//!
//! Each doc-comment line of a handler is one directive (`@param`,
//! `@success`, `@router`, ...). An [`OperationParser`] accumulates the
//! directives of one function into an [`Operation`]; type names written in
//! annotations are resolved through the shared [`SchemaGenerator`].

use crate::assets::DocAssets;
use crate::document::{
    self, Extensions, Header, HttpMethod, Parameter, Response, Schema, SecurityRequirement, ARRAY,
    BOOLEAN, FILE, INTEGER, NUMBER, OBJECT, STRING,
};
use crate::error::{Result, SwagError};
use crate::field_parser::{define_type, parse_extensions};
use crate::registry::FileId;
use crate::schema_generator::SchemaGenerator;
use crate::text::split_unless_nested;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// `name location type required "description"`
static PARAM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\S+)\s+(\w+)\s+([\S. ]+?)\s+(\w+)\s+"([^"]*)""#).unwrap()
});

/// `codes {kind} type "description"`, shared by `@success` and `@header`.
static RESPONSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^([\w,]+)\s+([\w{}]+)\s+([\w\-.\\{}=,\[\s\]]+)\s*(".*)?"#).unwrap()
});

static ROUTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(/[\w./\-{}()+:$*]*)[[:blank:]]+\[(\w+)\]").unwrap()
});

static COMBINED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w\-./\[\]]+)\{(.*)\}$").unwrap());

static MIME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^/]+/[^/]+$").unwrap());

/// One `@router` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
    pub deprecated: bool,
}

/// An operation together with the routes it is bound to.
#[derive(Debug, Clone, Default)]
pub struct Operation {
    pub operation: document::Operation,
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Primitive,
    Array,
    Object,
}

/// Splits a directive line into the attribute and the trimmed remainder.
pub(crate) fn split_attribute(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim()),
        None => (line, ""),
    }
}

/// Maps Go primitive names onto Swagger types; anything else is returned as is.
pub(crate) fn to_scheme_type(name: &str) -> &str {
    match name {
        "int" | "uint" | "int8" | "uint8" | "int16" | "uint16" | "int32" | "uint32" | "int64"
        | "uint64" | "byte" | "rune" | "uintptr" => INTEGER,
        "float32" | "float64" => NUMBER,
        "bool" => BOOLEAN,
        other => other,
    }
}

fn is_primitive(schema_type: &str) -> bool {
    matches!(schema_type, STRING | INTEGER | NUMBER | BOOLEAN)
}

fn mime_alias(alias: &str) -> Option<&'static str> {
    let mime = match alias {
        "json" => "application/json",
        "xml" => "text/xml",
        "plain" => "text/plain",
        "html" => "text/html",
        "mpfd" => "multipart/form-data",
        "x-www-form-urlencoded" => "application/x-www-form-urlencoded",
        "json-api" => "application/vnd.api+json",
        "json-stream" => "application/x-json-stream",
        "octet-stream" => "application/octet-stream",
        "png" => "image/png",
        "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "event-stream" => "text/event-stream",
        _ => return None,
    };
    Some(mime)
}

/// Parses a comma separated `@accept` / `@produce` list.
///
/// # Errors
///
/// [`SwagError::MalformedAnnotation`] for entries that are neither a known
/// alias nor a literal `type/subtype`.
pub fn parse_mime_types(list: &str) -> Result<Vec<String>> {
    let mut mimes = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match mime_alias(entry) {
            Some(mime) => mimes.push(mime.to_string()),
            None if MIME_PATTERN.is_match(entry) => mimes.push(entry.to_string()),
            None => {
                return Err(SwagError::malformed(format!(
                    "{} is not a known mime type",
                    entry
                )))
            }
        }
    }
    Ok(mimes)
}

/// Reason phrase for a status code, empty for unknown codes.
pub fn status_text(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

/// `default` or a numeric status code.
fn response_key(code: &str, line: &str) -> Result<(String, Option<u16>)> {
    if code.eq_ignore_ascii_case("default") {
        return Ok(("default".to_string(), None));
    }
    code.parse::<u16>()
        .map(|c| (c.to_string(), Some(c)))
        .map_err(|_| SwagError::malformed(format!("can not parse response comment \"{}\"", line)))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `name(value)` pairs after a parameter's description, names lowercased.
fn parse_attributes(input: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    let mut rest = input;
    while let Some(open) = rest.find('(') {
        let name_start = rest[..open]
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
            .last()
            .map_or(open, |(idx, _)| idx);
        let name = rest[name_start..open].to_ascii_lowercase();

        let mut depth = 0;
        let mut close = None;
        for (idx, ch) in rest[open..].char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + idx);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            break;
        };
        if !name.is_empty() {
            attributes.push((name, rest[open + 1..close].trim().to_string()));
        }
        rest = &rest[close + 1..];
    }
    attributes
}

/// Validation attributes of one `@param` line.
#[derive(Debug, Default)]
struct ParamAttributes {
    enums: Vec<Value>,
    default: Option<Value>,
    example: Option<Value>,
    maximum: Option<f64>,
    minimum: Option<f64>,
    max_length: Option<i64>,
    min_length: Option<i64>,
    format: Option<String>,
    pattern: Option<String>,
    collection_format: Option<String>,
    extensions: Extensions,
}

impl ParamAttributes {
    /// # Arguments
    ///
    /// * `element_type` - the parameter type, or the item type for arrays
    fn parse(input: &str, element_type: &str, is_array: bool) -> Result<Self> {
        let mut attrs = ParamAttributes::default();
        let values = |value: &str, constraint: &str| -> Result<Value> {
            if is_array {
                split_unless_nested(value, ',')
                    .into_iter()
                    .map(|v| define_type(element_type, v.trim(), constraint))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            } else {
                define_type(element_type, value, constraint)
            }
        };

        for (name, value) in parse_attributes(input) {
            match name.as_str() {
                "enums" => {
                    attrs.enums = split_unless_nested(&value, ',')
                        .into_iter()
                        .map(|v| define_type(element_type, v.trim(), "enums"))
                        .collect::<Result<_>>()?;
                }
                "minimum" | "maximum" => {
                    if !matches!(element_type, INTEGER | NUMBER) {
                        return Err(SwagError::mismatch(name.as_str(), element_type));
                    }
                    let number = value.parse::<f64>().map_err(|_| {
                        SwagError::malformed(format!("{} is not a valid number for {}", value, name))
                    })?;
                    if name == "minimum" {
                        attrs.minimum = Some(number);
                    } else {
                        attrs.maximum = Some(number);
                    }
                }
                "minlength" | "maxlength" => {
                    if element_type != STRING {
                        return Err(SwagError::mismatch(name.as_str(), element_type));
                    }
                    let length = value.parse::<i64>().map_err(|_| {
                        SwagError::malformed(format!("{} is not a valid length for {}", value, name))
                    })?;
                    if name == "minlength" {
                        attrs.min_length = Some(length);
                    } else {
                        attrs.max_length = Some(length);
                    }
                }
                "default" => attrs.default = Some(values(&value, "default")?),
                "example" => attrs.example = Some(values(&value, "example")?),
                "format" => attrs.format = non_empty(&value),
                "pattern" => attrs.pattern = non_empty(&value),
                "collectionformat" => {
                    if !is_array {
                        return Err(SwagError::malformed(
                            "collectionFormat is only allowed for array parameters",
                        ));
                    }
                    if !matches!(value.as_str(), "csv" | "ssv" | "tsv" | "pipes" | "multi") {
                        return Err(SwagError::malformed(format!(
                            "{} is not a valid collectionFormat",
                            value
                        )));
                    }
                    attrs.collection_format = Some(value);
                }
                "extensions" => attrs.extensions.extend(parse_extensions(&value)),
                other => debug!("Ignoring unknown param attribute {}", other),
            }
        }
        Ok(attrs)
    }

    fn apply_to_param(self, param: &mut Parameter) {
        if !self.enums.is_empty() {
            match param.items.as_deref_mut() {
                Some(items) => items.enum_values = self.enums,
                None => param.enum_values = self.enums,
            }
        }
        param.default = self.default.or(param.default.take());
        param.example = self.example.or(param.example.take());
        param.maximum = self.maximum.or(param.maximum);
        param.minimum = self.minimum.or(param.minimum);
        param.max_length = self.max_length.or(param.max_length);
        param.min_length = self.min_length.or(param.min_length);
        param.format = self.format.or(param.format.take());
        param.pattern = self.pattern.or(param.pattern.take());
        param.collection_format = self.collection_format.or(param.collection_format.take());
        param.extensions.extend(self.extensions);
    }

    fn apply_to_schema(self, schema: &mut Schema) {
        if !self.enums.is_empty() {
            match schema.items.as_deref_mut() {
                Some(items) => items.enum_values = self.enums,
                None => schema.enum_values = self.enums,
            }
        }
        schema.default = self.default.or(schema.default.take());
        schema.example = self.example.or(schema.example.take());
        schema.maximum = self.maximum.or(schema.maximum);
        schema.minimum = self.minimum.or(schema.minimum);
        schema.max_length = self.max_length.or(schema.max_length);
        schema.min_length = self.min_length.or(schema.min_length);
        schema.format = self.format.or(schema.format.take());
        schema.pattern = self.pattern.or(schema.pattern.take());
        schema.extensions.extend(self.extensions);
    }
}

/// Parses the doc comment of one handler function.
pub struct OperationParser<'a> {
    generator: &'a mut SchemaGenerator,
    assets: &'a dyn DocAssets,
    file: FileId,
    collection_format: String,
    operation: Operation,
}

impl<'a> OperationParser<'a> {
    /// # Arguments
    ///
    /// * `generator` - resolves the types named in annotations
    /// * `assets` - markdown and code-sample source
    /// * `file` - the file the comment belongs to, for import resolution
    pub fn new(generator: &'a mut SchemaGenerator, assets: &'a dyn DocAssets, file: FileId) -> Self {
        let collection_format = generator.config().collection_format_in_query.clone();
        Self {
            generator,
            assets,
            file,
            collection_format,
            operation: Operation::default(),
        }
    }

    /// Default `collectionFormat` of array parameters, set by `@query.collection.format`.
    pub fn with_collection_format(mut self, format: &str) -> Self {
        self.collection_format = format.to_string();
        self
    }

    /// Parses one doc-comment line. Lines that are not directives are ignored.
    pub fn parse_comment(&mut self, comment: &str) -> Result<()> {
        self.parse_directive(comment)
            .map_err(|e| e.in_comment(comment))
    }

    pub fn finish(self) -> Operation {
        self.operation
    }

    fn parse_directive(&mut self, comment: &str) -> Result<()> {
        let line = comment.trim().trim_start_matches('/').trim();
        if !line.starts_with('@') {
            return Ok(());
        }
        let (attribute, rest) = split_attribute(line);
        let lower = attribute.to_ascii_lowercase();
        match lower.as_str() {
            "@description" => self.append_description(rest),
            "@description.markdown" => {
                let text = self.assets.markdown(rest)?;
                self.append_description(&text);
            }
            "@summary" => self.operation.operation.summary = non_empty(rest),
            "@id" => self.operation.operation.operation_id = non_empty(rest),
            "@tags" => self.operation.operation.tags.extend(
                rest.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            ),
            "@accept" => {
                let mimes = parse_mime_types(rest)?;
                self.operation.operation.consumes.extend(mimes);
            }
            "@produce" => {
                let mimes = parse_mime_types(rest)?;
                self.operation.operation.produces.extend(mimes);
            }
            "@param" => self.parse_param(rest)?,
            "@success" | "@failure" | "@response" => self.parse_response(rest)?,
            "@header" => self.parse_header(rest)?,
            "@router" => self.parse_router(rest, false)?,
            "@deprecatedrouter" => self.parse_router(rest, true)?,
            "@security" => self.parse_security(rest),
            "@deprecated" => self.operation.operation.deprecated = true,
            "@x-codesamples" if rest == "file" => self.parse_code_samples(attribute)?,
            _ if lower.starts_with("@x-") => self.parse_extension(attribute, rest)?,
            _ => {}
        }
        Ok(())
    }

    fn append_description(&mut self, text: &str) {
        let description = &mut self.operation.operation.description;
        match description {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(text);
            }
            None => *description = Some(text.to_string()),
        }
    }

    fn parse_router(&mut self, rest: &str, deprecated: bool) -> Result<()> {
        let caps = ROUTER_PATTERN.captures(rest).ok_or_else(|| {
            SwagError::malformed(format!("can not parse router comment \"{}\"", rest))
        })?;
        let method = HttpMethod::parse(&caps[2])
            .ok_or_else(|| SwagError::malformed(format!("invalid method: {}", &caps[2])))?;
        self.operation.routes.push(Route {
            method,
            path: caps[1].to_string(),
            deprecated,
        });
        Ok(())
    }

    /// `A || B[scope1, scope2] && C`: `||` separates alternatives, `&&`
    /// joins schemes into one requirement.
    fn parse_security(&mut self, rest: &str) {
        for alternative in rest.split("||") {
            let mut requirement = SecurityRequirement::new();
            for scheme in alternative.split("&&").map(str::trim).filter(|s| !s.is_empty()) {
                match (scheme.find('['), scheme.rfind(']')) {
                    (Some(open), Some(close)) if open < close => {
                        let scopes = scheme[open + 1..close]
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string);
                        requirement
                            .entry(scheme[..open].trim().to_string())
                            .or_default()
                            .extend(scopes);
                    }
                    _ => {
                        requirement.entry(scheme.to_string()).or_default();
                    }
                }
            }
            if !requirement.is_empty() {
                self.operation.operation.security.push(requirement);
            }
        }
    }

    fn parse_code_samples(&mut self, attribute: &str) -> Result<()> {
        let summary = self.operation.operation.summary.clone().unwrap_or_default();
        let bytes = self.assets.code_samples(&summary)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            SwagError::malformed(format!("invalid code samples for '{}': {}", summary, e))
        })?;
        self.operation
            .operation
            .extensions
            .insert(attribute.trim_start_matches('@').to_string(), value);
        Ok(())
    }

    fn parse_extension(&mut self, attribute: &str, rest: &str) -> Result<()> {
        if rest.is_empty() {
            return Err(SwagError::malformed(format!(
                "annotation {} need a value",
                attribute
            )));
        }
        let value = serde_json::from_str(rest).unwrap_or_else(|_| Value::String(rest.to_string()));
        self.operation
            .operation
            .extensions
            .insert(attribute.trim_start_matches('@').to_string(), value);
        Ok(())
    }

    fn parse_param(&mut self, rest: &str) -> Result<()> {
        let caps = PARAM_PATTERN.captures(rest).ok_or_else(|| {
            SwagError::malformed(format!(
                "missing required param comment parameters \"{}\"",
                rest
            ))
        })?;
        let location = caps[2].to_string();
        let written = caps[3].trim().to_string();
        let required = matches!(caps[4].to_ascii_lowercase().as_str(), "true" | "required");
        let attributes = &rest[caps.get(0).map_or(rest.len(), |m| m.end())..];

        let (kind, ref_type) = match written.strip_prefix("[]") {
            Some(element) => (ParamKind::Array, to_scheme_type(element).to_string()),
            None => {
                let ref_type = to_scheme_type(&written).to_string();
                if is_primitive(&ref_type) || (location == "formData" && ref_type == FILE) {
                    (ParamKind::Primitive, ref_type)
                } else {
                    (ParamKind::Object, ref_type)
                }
            }
        };

        let mut param = Parameter {
            name: caps[1].to_string(),
            location: location.clone(),
            required,
            description: non_empty(&caps[5]),
            ..Parameter::default()
        };

        match location.as_str() {
            "path" | "header" | "query" | "formData" => {
                param.param_type = Some(ref_type.clone());
                match kind {
                    ParamKind::Primitive => {}
                    ParamKind::Array => {
                        let file_array = ref_type == FILE && location == "formData";
                        if !is_primitive(&ref_type) && !file_array {
                            return Err(SwagError::malformed(format!(
                                "{} is not supported array type for {}",
                                ref_type, location
                            )));
                        }
                        param.param_type = Some(ARRAY.to_string());
                        param.collection_format = Some(self.collection_format.clone());
                        param.items = Some(Box::new(Schema::primitive(&ref_type)));
                    }
                    ParamKind::Object => {
                        let schema = self.generator.resolve_type_name(&ref_type, self.file)?;
                        let target = self.flatten_ref(&schema);
                        if is_primitive(target.type_name()) {
                            param.param_type = target.schema_type.clone();
                            param.format = target.format.clone();
                            param.enum_values = target.enum_values.clone();
                            param.extensions.extend(target.extensions.clone());
                        } else if matches!(location.as_str(), "query" | "formData")
                            && (target.is_type(OBJECT) || !target.all_of.is_empty())
                        {
                            return self.expand_struct_params(&location, &target);
                        } else {
                            return Err(SwagError::malformed(format!(
                                "{} is not supported type for {}",
                                ref_type, location
                            )));
                        }
                    }
                }
            }
            "body" => {
                let schema = match kind {
                    ParamKind::Primitive => Schema::primitive(&ref_type),
                    ParamKind::Array => Schema::array(
                        self.object_schema(&written[2..])?
                            .unwrap_or_else(Schema::object),
                    ),
                    ParamKind::Object => self.object_schema(&written)?.unwrap_or_else(Schema::object),
                };
                param.schema = Some(schema);
            }
            other => {
                return Err(SwagError::malformed(format!(
                    "{} is not supported paramType",
                    other
                )))
            }
        }

        let (element_type, is_array) = self.element_type(&param);
        let attrs = ParamAttributes::parse(attributes, &element_type, is_array)?;
        match param.schema.as_mut() {
            Some(schema) => attrs.apply_to_schema(schema),
            None => attrs.apply_to_param(&mut param),
        }
        self.operation.operation.parameters.push(param);
        Ok(())
    }

    /// The type constraint attributes are checked against.
    fn element_type(&self, param: &Parameter) -> (String, bool) {
        if let Some(schema) = &param.schema {
            let target = self.generator.dereference(schema);
            return match target.items.as_deref() {
                Some(items) if target.is_type(ARRAY) => {
                    (self.generator.dereference(items).type_name().to_string(), true)
                }
                _ => (target.type_name().to_string(), false),
            };
        }
        match param.items.as_deref() {
            Some(items) => (items.type_name().to_string(), true),
            None => (param.param_type.clone().unwrap_or_default(), false),
        }
    }

    /// Follows a `$ref`, or an `allOf` holding a single `$ref`.
    fn flatten_ref(&self, schema: &Schema) -> Schema {
        match schema.all_of.as_slice() {
            [only] if schema.schema_type.is_none() => self.generator.dereference(only).clone(),
            _ => self.generator.dereference(schema).clone(),
        }
    }

    /// One query or form parameter per property of a struct.
    fn expand_struct_params(&mut self, location: &str, schema: &Schema) -> Result<()> {
        let mut properties = schema.properties.clone();
        let mut required = schema.required.clone();
        for part in &schema.all_of {
            let part = self.generator.dereference(part);
            properties.extend(part.properties.clone());
            required.extend(part.required.iter().cloned());
        }

        for (name, prop) in properties {
            let target = self.flatten_ref(&prop);
            let mut param = Parameter {
                name: name.clone(),
                location: location.to_string(),
                required: required.contains(&name),
                description: prop.description.clone().or(target.description.clone()),
                ..Parameter::default()
            };
            match target.type_name() {
                ARRAY => {
                    let items = target
                        .items
                        .as_deref()
                        .map(|items| self.generator.dereference(items).clone());
                    match items {
                        Some(items) if is_primitive(items.type_name()) => {
                            param.param_type = Some(ARRAY.to_string());
                            param.collection_format = Some(self.collection_format.clone());
                            param.items = Some(Box::new(items));
                        }
                        _ => {
                            debug!("Skipping field {} not supported for {}", name, location);
                            continue;
                        }
                    }
                }
                t if is_primitive(t) => param.param_type = Some(t.to_string()),
                _ => {
                    debug!("Skipping field {} not supported for {}", name, location);
                    continue;
                }
            }
            param.format = target.format;
            param.default = target.default;
            param.example = target.example;
            param.maximum = target.maximum;
            param.minimum = target.minimum;
            param.max_length = target.max_length;
            param.min_length = target.min_length;
            param.pattern = target.pattern;
            param.enum_values = target.enum_values;
            param.extensions = target.extensions;
            self.operation.operation.parameters.push(param);
        }
        Ok(())
    }

    fn parse_response(&mut self, rest: &str) -> Result<()> {
        let Some(caps) = RESPONSE_PATTERN.captures(rest) else {
            return self.parse_empty_response(rest);
        };
        let description = caps
            .get(4)
            .map_or("", |m| m.as_str().trim().trim_matches('"'))
            .to_string();
        let kind = caps[2].trim_matches(|c| c == '{' || c == '}').to_string();
        let schema = self.api_object_schema(&kind, caps[3].trim())?;

        for code in caps[1].split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (key, status) = response_key(code, rest)?;
            let description = match (description.is_empty(), status) {
                (true, Some(status)) => status_text(status).to_string(),
                _ => description.clone(),
            };
            self.operation.operation.responses.insert(
                key,
                Response {
                    description,
                    schema: schema.clone(),
                    ..Response::default()
                },
            );
        }
        Ok(())
    }

    /// `@success 204` or `@success 204 "description"`.
    fn parse_empty_response(&mut self, rest: &str) -> Result<()> {
        let (codes, description) = split_attribute(rest);
        let (kind, _) = split_attribute(description);
        if kind.len() > 2 && kind.starts_with('{') && kind.ends_with('}') {
            return Err(SwagError::malformed(format!(
                "response comment \"{}\" has no type after {}",
                rest, kind
            )));
        }
        let description = description.trim_matches('"');
        for code in codes.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (key, status) = response_key(code, rest)?;
            let description = match (description.is_empty(), status) {
                (true, Some(status)) => status_text(status).to_string(),
                _ => description.to_string(),
            };
            self.operation.operation.responses.insert(
                key,
                Response {
                    description,
                    ..Response::default()
                },
            );
        }
        Ok(())
    }

    /// Headers attach to responses that are already declared.
    fn parse_header(&mut self, rest: &str) -> Result<()> {
        let caps = RESPONSE_PATTERN.captures(rest).ok_or_else(|| {
            SwagError::malformed(format!("can not parse header comment \"{}\"", rest))
        })?;
        let header = Header {
            header_type: caps[2].trim_matches(|c| c == '{' || c == '}').to_string(),
            format: None,
            description: caps
                .get(4)
                .and_then(|m| non_empty(m.as_str().trim().trim_matches('"'))),
        };
        let name = caps[3].trim().to_string();
        let responses = &mut self.operation.operation.responses;

        if caps[1].eq_ignore_ascii_case("all") {
            for response in responses.values_mut() {
                response.headers.insert(name.clone(), header.clone());
            }
            return Ok(());
        }
        for code in caps[1].split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (key, _) = response_key(code, rest)?;
            match responses.get_mut(&key) {
                Some(response) => {
                    response.headers.insert(name.clone(), header.clone());
                }
                None => debug!("Header {} refers to undeclared response {}", name, key),
            }
        }
        Ok(())
    }

    /// Schema of a response, from its `{kind}` and type.
    fn api_object_schema(&mut self, kind: &str, ref_type: &str) -> Result<Option<Schema>> {
        match kind {
            OBJECT => match ref_type.strip_prefix("[]") {
                Some(element) => Ok(Some(Schema::array(
                    self.object_schema(element)?.unwrap_or_else(Schema::object),
                ))),
                None => self.object_schema(ref_type),
            },
            ARRAY => Ok(Some(Schema::array(
                self.object_schema(ref_type)?.unwrap_or_else(Schema::object),
            ))),
            other => {
                let schema_type = to_scheme_type(other);
                if is_primitive(schema_type) || schema_type == FILE {
                    Ok(Some(Schema::primitive(schema_type)))
                } else {
                    Err(SwagError::malformed(format!(
                        "{{{}}} is not a supported response kind",
                        other
                    )))
                }
            }
        }
    }

    /// Schema of a type written in an annotation, including composites
    /// such as `web.Response{data=[]web.Pet}`. `nil` yields no schema.
    fn object_schema(&mut self, ref_type: &str) -> Result<Option<Schema>> {
        let ref_type = ref_type.trim();
        match ref_type {
            "nil" => return Ok(None),
            "interface{}" | "any" => return Ok(Some(Schema::object())),
            _ => {}
        }
        let schema_type = to_scheme_type(ref_type);
        if is_primitive(schema_type) {
            return Ok(Some(Schema::primitive(schema_type)));
        }
        if let Some(element) = ref_type.strip_prefix("[]") {
            let items = self.object_schema(element)?.unwrap_or_else(Schema::object);
            return Ok(Some(Schema::array(items)));
        }
        if let Some(map) = ref_type.strip_prefix("map[") {
            let close = map_key_end(map)
                .ok_or_else(|| SwagError::malformed(format!("invalid type: {}", ref_type)))?;
            let value = map[close + 1..].trim();
            if matches!(value, "interface{}" | "any") {
                return Ok(Some(Schema::map(Schema::default())));
            }
            let value = self.object_schema(value)?.unwrap_or_else(Schema::object);
            return Ok(Some(Schema::map(value)));
        }
        if ref_type.contains('{') {
            return self.combined_schema(ref_type);
        }
        self.generator.resolve_type_name(ref_type, self.file).map(Some)
    }

    fn combined_schema(&mut self, ref_type: &str) -> Result<Option<Schema>> {
        let caps = COMBINED_PATTERN
            .captures(ref_type)
            .ok_or_else(|| SwagError::malformed(format!("invalid type: {}", ref_type)))?;
        let base = self.object_schema(&caps[1])?.unwrap_or_else(Schema::object);

        let mut properties = BTreeMap::new();
        for field in split_unless_nested(&caps[2], ',') {
            if let Some((key, value)) = field.split_once('=') {
                let schema = self.object_schema(value)?.unwrap_or_else(Schema::object);
                properties.insert(key.trim().to_string(), schema);
            }
        }
        if properties.is_empty() {
            return Ok(Some(base));
        }

        if base.reference.is_none()
            && base.is_type(OBJECT)
            && base.properties.is_empty()
            && base.additional_properties.is_none()
        {
            let mut base = base;
            base.properties = properties;
            return Ok(Some(base));
        }
        let extra = Schema {
            schema_type: Some(OBJECT.to_string()),
            properties,
            ..Schema::default()
        };
        Ok(Some(Schema::all_of(vec![base, extra])))
    }
}

/// Index of the `]` closing a map key, given the text after `map[`.
fn map_key_end(rest: &str) -> Option<usize> {
    let mut depth = 1;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}
