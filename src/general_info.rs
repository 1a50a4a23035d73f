//! Document-level annotations, read from the comments of the main file.

use crate::assets::DocAssets;
use crate::document::{Contact, ExternalDocs, License, SecurityScheme, Swagger, Tag};
use crate::error::{Result, SwagError};
use crate::operation::{parse_mime_types, split_attribute};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

const SECURITY_PREFIX: &str = "@securitydefinitions.";

/// Comment groups holding a `@router` line document an operation, not the API.
pub fn is_general_api_comment(lines: &[String]) -> bool {
    !lines.iter().any(|line| {
        line.trim()
            .trim_start_matches('/')
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("@router")
    })
}

fn json_or_string(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Fills the top-level fields of a [`Swagger`] document.
pub struct GeneralInfoParser<'a> {
    swagger: &'a mut Swagger,
    assets: &'a dyn DocAssets,
    collection_format: Option<String>,
}

impl<'a> GeneralInfoParser<'a> {
    pub fn new(swagger: &'a mut Swagger, assets: &'a dyn DocAssets) -> Self {
        Self {
            swagger,
            assets,
            collection_format: None,
        }
    }

    /// The `@query.collection.format` directive, if one was given.
    pub fn collection_format(&self) -> Option<&str> {
        self.collection_format.as_deref()
    }

    /// Parses the lines of one comment group.
    ///
    /// # Errors
    ///
    /// [`SwagError::MalformedAnnotation`] for unknown mime types, tag
    /// sub-directives without a preceding `@tag.name`, and security
    /// definitions missing a required attribute.
    pub fn parse_lines(&mut self, lines: &[String]) -> Result<()> {
        let mut previous = String::new();
        let mut index = 0;
        while index < lines.len() {
            let line = lines[index].trim();
            index += 1;
            if line.is_empty() {
                continue;
            }
            let (attribute, value) = split_attribute(line);
            let lower = attribute.to_ascii_lowercase();
            let info = &mut self.swagger.info;
            match lower.as_str() {
                "@title" => info.title = value.to_string(),
                "@version" => info.version = value.to_string(),
                "@description" => match &mut info.description {
                    Some(description) if previous == lower => {
                        description.push('\n');
                        description.push_str(value);
                    }
                    description => *description = Some(value.to_string()),
                },
                "@description.markdown" => {
                    info.description = Some(self.assets.markdown("api")?);
                }
                "@termsofservice" => info.terms_of_service = non_empty(value),
                "@contact.name" => contact(&mut info.contact).name = non_empty(value),
                "@contact.url" => contact(&mut info.contact).url = non_empty(value),
                "@contact.email" => contact(&mut info.contact).email = non_empty(value),
                "@license.name" => {
                    info.license.get_or_insert_with(License::default).name = value.to_string()
                }
                "@license.url" => {
                    info.license.get_or_insert_with(License::default).url = non_empty(value)
                }
                "@host" => self.swagger.host = non_empty(value),
                "@basepath" => self.swagger.base_path = non_empty(value),
                "@schemes" => {
                    self.swagger.schemes = value.split_whitespace().map(str::to_string).collect()
                }
                "@accept" => {
                    let mimes = parse_mime_types(value)?;
                    self.swagger.consumes.extend(mimes);
                }
                "@produce" => {
                    let mimes = parse_mime_types(value)?;
                    self.swagger.produces.extend(mimes);
                }
                "@tag.name" => self.swagger.tags.push(Tag {
                    name: value.to_string(),
                    ..Tag::default()
                }),
                "@tag.description" => self.last_tag(attribute)?.description = non_empty(value),
                "@tag.description.markdown" => {
                    let name = self.last_tag(attribute)?.name.clone();
                    let text = self.assets.markdown(&name)?;
                    self.last_tag(attribute)?.description = Some(text);
                }
                "@tag.docs.url" => {
                    self.last_tag(attribute)?.external_docs = Some(ExternalDocs {
                        description: None,
                        url: value.to_string(),
                    })
                }
                "@tag.docs.description" => {
                    let tag = self.last_tag(attribute)?;
                    match tag.external_docs.as_mut() {
                        Some(docs) => docs.description = non_empty(value),
                        None => {
                            return Err(SwagError::malformed(format!(
                                "{} needs to come after a @tag.docs.url",
                                attribute
                            )))
                        }
                    }
                }
                "@externaldocs.description" => {
                    self.swagger
                        .external_docs
                        .get_or_insert_with(ExternalDocs::default)
                        .description = non_empty(value)
                }
                "@externaldocs.url" => {
                    self.swagger
                        .external_docs
                        .get_or_insert_with(ExternalDocs::default)
                        .url = value.to_string()
                }
                "@query.collection.format" => {
                    if !matches!(value, "csv" | "ssv" | "tsv" | "pipes" | "multi") {
                        return Err(SwagError::malformed(format!(
                            "{} is not a valid collection format",
                            value
                        )));
                    }
                    self.collection_format = Some(value.to_string());
                }
                kind if kind.starts_with(SECURITY_PREFIX) => {
                    let (scheme, next) = parse_security_block(kind, value, lines, index)?;
                    debug!("Security definition {} spans lines {}..{}", value, index - 1, next);
                    self.swagger
                        .security_definitions
                        .insert(value.to_string(), scheme);
                    index = next;
                }
                ext if ext.starts_with("@x-") => {
                    if value.is_empty() {
                        return Err(SwagError::malformed(format!(
                            "annotation {} need a value",
                            attribute
                        )));
                    }
                    let name = attribute.trim_start_matches('@').to_string();
                    if name.contains("logo") {
                        info.extensions.insert(name, json_or_string(value));
                    } else {
                        self.swagger.extensions.insert(name, json_or_string(value));
                    }
                }
                _ => {}
            }
            previous = lower;
        }
        Ok(())
    }

    fn last_tag(&mut self, attribute: &str) -> Result<&mut Tag> {
        self.swagger.tags.last_mut().ok_or_else(|| {
            SwagError::malformed(format!("{} needs to come after a @tag.name", attribute))
        })
    }
}

fn contact(contact: &mut Option<Contact>) -> &mut Contact {
    contact.get_or_insert_with(Contact::default)
}

/// Reads a `@securityDefinitions.*` block starting at `index`, the line
/// after the block header. The block ends at the first line that is not
/// one of its sub-directives.
///
/// # Returns
///
/// The scheme and the index of the first line after the block.
fn parse_security_block(
    kind: &str,
    name: &str,
    lines: &[String],
    mut index: usize,
) -> Result<(SecurityScheme, usize)> {
    let (scheme_type, flow, required): (&str, Option<&str>, &[&str]) =
        match &kind[SECURITY_PREFIX.len()..] {
            "basic" => ("basic", None, &[][..]),
            "apikey" => ("apiKey", None, &["@in", "@name"][..]),
            "oauth2.application" => ("oauth2", Some("application"), &["@tokenurl"][..]),
            "oauth2.implicit" => ("oauth2", Some("implicit"), &["@authorizationurl"][..]),
            "oauth2.password" => ("oauth2", Some("password"), &["@tokenurl"][..]),
            "oauth2.accesscode" => (
                "oauth2",
                Some("accessCode"),
                &["@tokenurl", "@authorizationurl"][..],
            ),
            other => {
                return Err(SwagError::malformed(format!(
                    "unknown security definition type {}",
                    other
                )))
            }
        };
    if name.is_empty() {
        return Err(SwagError::malformed(format!("{} needs a name", kind)));
    }

    let mut scheme = SecurityScheme {
        scheme_type: scheme_type.to_string(),
        flow: flow.map(str::to_string),
        ..SecurityScheme::default()
    };
    let mut attributes: BTreeMap<String, String> = BTreeMap::new();
    while index < lines.len() {
        let line = lines[index].trim();
        if line.is_empty() {
            index += 1;
            continue;
        }
        let (attribute, value) = split_attribute(line);
        let lower = attribute.to_ascii_lowercase();
        match lower.as_str() {
            "@in" | "@name" | "@tokenurl" | "@authorizationurl" => {
                attributes.insert(lower, value.to_string());
            }
            "@description" => scheme.description = non_empty(value),
            scope if scope.starts_with("@scope.") => {
                scheme
                    .scopes
                    .insert(attribute["@scope.".len()..].to_string(), value.to_string());
            }
            ext if ext.starts_with("@x-") => {
                scheme
                    .extensions
                    .insert(attribute[1..].to_string(), json_or_string(value));
            }
            _ => break,
        }
        index += 1;
    }

    if let Some(missing) = required.iter().find(|key| !attributes.contains_key(**key)) {
        return Err(SwagError::malformed(format!(
            "{} {} is missing required attribute {}",
            kind, name, missing
        )));
    }
    let mut take = |key: &str| {
        if required.contains(&key) {
            attributes.remove(key)
        } else {
            None
        }
    };
    scheme.location = take("@in");
    scheme.name = take("@name");
    scheme.token_url = take("@tokenurl");
    scheme.authorization_url = take("@authorizationurl");
    Ok((scheme, index))
}
