//! Swagger from Source - Swagger 2.0 documents from annotated Go source trees.
//!
//! This library reads the `@`-annotation comments of a Go web project
//! (general API info in the main file, one block per handler function) and
//! resolves every Go type those annotations mention into a JSON schema. The
//! result is a deterministic [`document::Swagger`] that can be written as
//! JSON or YAML.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Walks search directories and assigns `.go` files to packages
//! 2. [`syntax`] and [`parser`] - Parse Go declarations and comments
//! 3. [`registry`] - Cross-package symbol table with name disambiguation
//! 4. [`const_eval`] - Folds constant declarations into enum values
//! 5. [`generics`] - Instantiates generic types for concrete arguments
//! 6. [`schema_generator`] and [`field_parser`] - Turn Go types into schemas
//! 7. [`general_info`] and [`operation`] - Parse annotation comments
//! 8. [`swagger_builder`] - Assembles the document
//! 9. [`serializer`] - Serializes the document to JSON or YAML
//!
//! # Example Usage
//!
//! ```no_run
//! use swagger_from_source::{
//!     assets::DirAssets,
//!     config::ParserConfig,
//!     scanner::OsFs,
//!     serializer::serialize_json,
//!     swagger_builder::SwaggerBuilder,
//! };
//! use std::path::{Path, PathBuf};
//!
//! let assets = DirAssets::default();
//! let swagger = SwaggerBuilder::new(ParserConfig::default(), &OsFs, &assets)
//!     .build(&[PathBuf::from("./my-service")], Path::new("main.go"))
//!     .unwrap();
//! println!("{}", serialize_json(&swagger).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod assets;
pub mod cli;
pub mod config;
pub mod const_eval;
pub mod document;
pub mod error;
pub mod field_parser;
pub mod general_info;
pub mod generics;
pub mod golist;
pub mod operation;
pub mod parser;
pub mod registry;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod swagger_builder;
pub mod syntax;
pub mod text;
