//! Assembles a complete [`Swagger`] document from a Go source tree.
//!
//! The builder drives the other modules in order: scan and parse the search
//! directories, index dependencies, read the general API info from the main
//! file, collect types, and finally turn every handler doc comment into an
//! operation bound to its routes.

use crate::assets::DocAssets;
use crate::config::ParserConfig;
use crate::document::Swagger;
use crate::error::{Result, SwagError};
use crate::general_info::{is_general_api_comment, GeneralInfoParser};
use crate::golist::DependencyLister;
use crate::operation::{split_attribute, Operation, OperationParser};
use crate::parser::{AstParser, ParsedFile};
use crate::registry::{FileId, ParseFlag, Registry};
use crate::scanner::{FileScanner, SourceFile, SourceFs};
use crate::schema_generator::SchemaGenerator;
use crate::syntax::ast::Decl;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Builds the Swagger 2.0 document for one run.
pub struct SwaggerBuilder<'a> {
    config: ParserConfig,
    fs: &'a dyn SourceFs,
    assets: &'a dyn DocAssets,
    lister: Option<&'a dyn DependencyLister>,
}

impl<'a> SwaggerBuilder<'a> {
    pub fn new(config: ParserConfig, fs: &'a dyn SourceFs, assets: &'a dyn DocAssets) -> Self {
        Self {
            config,
            fs,
            assets,
            lister: None,
        }
    }

    /// Lister consulted when dependency parsing is enabled.
    pub fn with_dependency_lister(mut self, lister: &'a dyn DependencyLister) -> Self {
        self.lister = Some(lister);
        self
    }

    /// Builds the document.
    ///
    /// # Arguments
    ///
    /// * `search_dirs` - Directories to scan; the first one holds the main file
    /// * `main_file` - Path of the file with the general API info, relative to the first search dir
    ///
    /// # Errors
    ///
    /// Any failing declaration aborts the run: unreadable or unparsable
    /// sources, malformed annotations, unresolvable types, and in strict mode
    /// duplicate routes and operation ids.
    pub fn build(&self, search_dirs: &[PathBuf], main_file: &Path) -> Result<Swagger> {
        let first_dir = search_dirs
            .first()
            .ok_or_else(|| SwagError::malformed("at least one search directory is required"))?;

        let mut registry = Registry::new().with_goroot(self.config.goroot.clone());
        for dir in search_dirs {
            self.index_search_dir(&mut registry, dir)?;
        }
        if self.config.parse_dependency {
            match self.lister {
                Some(lister) => self.index_dependencies(&mut registry, lister, first_dir)?,
                None => warn!("Dependency parsing is enabled but no dependency lister is set"),
            }
        }

        let mut swagger = Swagger::default();
        let main_path = first_dir.join(main_file);
        let main_id = self.main_file_id(&mut registry, &main_path)?;
        let collection_format = self.parse_general_info(&mut swagger, &registry, main_id)?;

        registry.parse_types();
        info!("Indexed {} types", registry.type_count());

        let mut generator = SchemaGenerator::new(registry, self.config.clone());
        self.parse_operations(&mut swagger, &mut generator, collection_format.as_deref())?;

        swagger.definitions = generator.into_definitions();
        info!(
            "Generated {} paths and {} definitions",
            swagger.paths.len(),
            swagger.definitions.len()
        );
        Ok(swagger)
    }

    fn index_search_dir(&self, registry: &mut Registry, dir: &Path) -> Result<()> {
        info!("Scanning {}", dir.display());
        let scan = FileScanner::new(dir.to_path_buf())
            .with_vendor(self.config.parse_vendor)
            .with_excludes(self.config.excludes.clone())
            .scan(self.fs)?;
        for warning in &scan.warnings {
            warn!("{}", warning);
        }
        let parsed = AstParser::parse_all(self.fs, &scan.go_files)?;
        debug!("Parsed {} files in module {}", parsed.len(), scan.module_path);
        for unit in parsed {
            registry.index(unit);
        }
        Ok(())
    }

    fn index_dependencies(
        &self,
        registry: &mut Registry,
        lister: &dyn DependencyLister,
        dir: &Path,
    ) -> Result<()> {
        let packages = lister.list(dir)?;
        let mut indexed = 0;
        for package in packages {
            if package.standard || registry.package(&package.import_path).is_some() {
                continue;
            }
            if !self.config.parse_internal && is_internal(&package.import_path) {
                debug!("Skipping internal package {}", package.import_path);
                continue;
            }
            for path in &package.go_files {
                let source = self.fs.read_to_string(path)?;
                registry.parse_file(&package.import_path, path.clone(), &source, ParseFlag::Models)?;
                indexed += 1;
            }
        }
        debug!("Indexed {} dependency files for {}", indexed, dir.display());
        Ok(())
    }

    fn main_file_id(&self, registry: &mut Registry, path: &Path) -> Result<FileId> {
        if let Some(id) = registry.file_id(path) {
            return Ok(id);
        }
        let package_path = path
            .parent()
            .map(|dir| crate::scanner::read_module_path(self.fs, dir))
            .unwrap_or_default();
        let unit = AstParser::parse_file(
            self.fs,
            &SourceFile {
                path: path.to_path_buf(),
                package_path,
                flag: ParseFlag::Models,
            },
        )?;
        Ok(registry.index(unit))
    }

    /// Returns the `@query.collection.format` given in the general info.
    fn parse_general_info(
        &self,
        swagger: &mut Swagger,
        registry: &Registry,
        main: FileId,
    ) -> Result<Option<String>> {
        let unit: &ParsedFile = registry.file(main);
        debug!("Reading general API info from {}", unit.path.display());
        let mut parser = GeneralInfoParser::new(swagger, self.assets);
        for group in &unit.syntax_tree.comments {
            let lines = group.lines();
            if is_general_api_comment(&lines) {
                parser.parse_lines(&lines)?;
            }
        }
        Ok(parser.collection_format().map(str::to_string))
    }

    fn parse_operations(
        &self,
        swagger: &mut Swagger,
        generator: &mut SchemaGenerator,
        collection_format: Option<&str>,
    ) -> Result<()> {
        let mut operation_ids: BTreeMap<String, String> = BTreeMap::new();
        for file in generator.registry().range_files() {
            let docs: Vec<(String, Vec<String>)> = generator
                .registry()
                .file(file)
                .syntax_tree
                .decls
                .iter()
                .filter_map(|decl| match decl {
                    Decl::Func(func) => func.doc.as_ref().map(|doc| (func.name.clone(), doc.lines())),
                    _ => None,
                })
                .collect();

            for (func_name, lines) in docs {
                if is_general_api_comment(&lines) {
                    continue;
                }
                if !self.config.tags.is_empty() && !self.config.tags.allows(&comment_tags(&lines)) {
                    debug!("Tag filter drops {}", func_name);
                    continue;
                }
                let mut parser = OperationParser::new(generator, self.assets, file);
                if let Some(format) = collection_format {
                    parser = parser.with_collection_format(format);
                }
                for line in &lines {
                    parser.parse_comment(line)?;
                }
                let operation = parser.finish();
                if operation.routes.is_empty() {
                    continue;
                }
                self.check_operation_id(&mut operation_ids, &operation, &func_name)?;
                self.bind_routes(swagger, operation)?;
            }
        }
        Ok(())
    }

    fn check_operation_id(
        &self,
        seen: &mut BTreeMap<String, String>,
        operation: &Operation,
        func_name: &str,
    ) -> Result<()> {
        let Some(id) = operation.operation.operation_id.as_ref() else {
            return Ok(());
        };
        if let Some(previous) = seen.get(id) {
            if self.config.strict {
                return Err(SwagError::DuplicateOperationId(id.clone()));
            }
            warn!(
                "duplicated @id annotation '{}' found in {}, previously declared in {}",
                id, func_name, previous
            );
            return Ok(());
        }
        seen.insert(id.clone(), func_name.to_string());
        Ok(())
    }

    fn bind_routes(&self, swagger: &mut Swagger, operation: Operation) -> Result<()> {
        for route in &operation.routes {
            let mut bound = operation.operation.clone();
            bound.deprecated |= route.deprecated;
            let slot = swagger
                .paths
                .entry(route.path.clone())
                .or_default()
                .operation_mut(route.method);
            if slot.is_some() {
                if self.config.strict {
                    return Err(SwagError::DuplicateRoute {
                        method: route.method.as_str().to_string(),
                        path: route.path.clone(),
                    });
                }
                warn!(
                    "route {} {} is declared multiple times",
                    route.method.as_str(),
                    route.path
                );
            }
            debug!("Binding {} {}", route.method.as_str(), route.path);
            *slot = Some(bound);
        }
        Ok(())
    }
}

/// Tags named by the `@Tags` lines of a comment, read before the comment is
/// parsed so that filtered operations never resolve their types.
fn comment_tags(lines: &[String]) -> Vec<String> {
    let mut tags = Vec::new();
    for line in lines {
        let (attribute, rest) = split_attribute(line.trim());
        if attribute.eq_ignore_ascii_case("@tags") {
            tags.extend(
                rest.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            );
        }
    }
    tags
}

fn is_internal(import_path: &str) -> bool {
    import_path.split('/').any(|segment| segment == "internal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagFilter;
    use crate::document::HttpMethod;
    use crate::golist::DependencyPackage;
    use crate::scanner::MemoryFs;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;

    const MAIN: &str = r#"package main

// @title Pet API
// @version 1.0
// @host pets.example.com
// @BasePath /api
// @query.collection.format multi
func main() {}
"#;

    const HANDLERS: &str = r#"package handlers

import "example.com/pets/models"

// ListPets lists pets.
// @Summary List pets
// @Tags pets
// @Param ids query []int false "ids"
// @Success 200 {array} models.Pet
// @Router /pets [get]
func ListPets() {}

// AddPet adds a pet.
// @Summary Add pet
// @Id addPet
// @Tags pets,admin
// @Param pet body models.Pet true "pet"
// @Success 201 {object} models.Pet
// @Router /pets [post]
// @DeprecatedRouter /animals [post]
func AddPet() {}

// helper has no annotations.
func helper() {}
"#;

    const MODELS: &str = r#"package models

type Pet struct {
	ID   int    `json:"id"`
	Name string `json:"name"`
}

type Unused struct {
	Value string `json:"value"`
}
"#;

    struct NoAssets;

    impl DocAssets for NoAssets {
        fn markdown(&self, name: &str) -> Result<String> {
            Err(SwagError::malformed(format!("no markdown {}", name)))
        }

        fn code_samples(&self, summary: &str) -> Result<Vec<u8>> {
            Err(SwagError::malformed(format!("no samples {}", summary)))
        }
    }

    fn pet_store() -> MemoryFs {
        MemoryFs::new()
            .with_file("/src/go.mod", "module example.com/pets\n\ngo 1.21\n")
            .with_file("/src/main.go", MAIN)
            .with_file("/src/handlers/pets.go", HANDLERS)
            .with_file("/src/models/pet.go", MODELS)
    }

    fn build(fs: &MemoryFs, config: ParserConfig) -> Result<Swagger> {
        SwaggerBuilder::new(config, fs, &NoAssets)
            .build(&[PathBuf::from("/src")], Path::new("main.go"))
    }

    #[test]
    fn test_builds_pet_store() {
        let swagger = build(&pet_store(), ParserConfig::default()).unwrap();

        assert_eq!(swagger.info.title, "Pet API");
        assert_eq!(swagger.base_path.as_deref(), Some("/api"));
        assert_eq!(
            swagger.paths.keys().cloned().collect::<Vec<_>>(),
            vec!["/animals".to_string(), "/pets".to_string()]
        );

        let pets = &swagger.paths["/pets"];
        let list = pets.operation(HttpMethod::Get).unwrap();
        assert_eq!(list.summary.as_deref(), Some("List pets"));
        assert_eq!(list.parameters[0].collection_format.as_deref(), Some("multi"));
        assert!(!pets.operation(HttpMethod::Post).unwrap().deprecated);
        assert!(swagger.paths["/animals"]
            .operation(HttpMethod::Post)
            .unwrap()
            .deprecated);

        assert_eq!(
            swagger.definitions.keys().cloned().collect::<Vec<_>>(),
            vec!["models.Pet".to_string()]
        );
        assert_eq!(
            serde_json::to_value(&swagger.definitions["models.Pet"]).unwrap(),
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "name": {"type": "string"}
                }
            })
        );
    }

    #[test]
    fn test_tag_filter_drops_operations() {
        let config = ParserConfig::default().with_tags(TagFilter::parse("!admin"));
        let swagger = build(&pet_store(), config).unwrap();
        let pets = &swagger.paths["/pets"];
        assert!(pets.operation(HttpMethod::Get).is_some());
        assert!(pets.operation(HttpMethod::Post).is_none());
        assert!(!swagger.paths.contains_key("/animals"));
    }

    #[test]
    fn test_duplicate_routes() {
        let fs = pet_store().with_file(
            "/src/handlers/more.go",
            "package handlers\n\n// @Summary Again\n// @Router /pets [get]\nfunc Again() {}\n",
        );

        let swagger = build(&fs, ParserConfig::default()).unwrap();
        let get = swagger.paths["/pets"].operation(HttpMethod::Get).unwrap();
        assert_eq!(get.summary.as_deref(), Some("List pets"));

        let err = build(&fs, ParserConfig::default().with_strict(true)).unwrap_err();
        assert!(matches!(err, SwagError::DuplicateRoute { .. }));
    }

    #[test]
    fn test_duplicate_operation_ids() {
        let fs = pet_store().with_file(
            "/src/handlers/more.go",
            "package handlers\n\n// @Id addPet\n// @Router /pets/again [post]\nfunc Again() {}\n",
        );
        assert!(build(&fs, ParserConfig::default()).is_ok());
        assert!(matches!(
            build(&fs, ParserConfig::default().with_strict(true)),
            Err(SwagError::DuplicateOperationId(id)) if id == "addPet"
        ));
    }

    #[test]
    fn test_malformed_annotation_aborts() {
        let fs = pet_store().with_file(
            "/src/handlers/bad.go",
            "package handlers\n\n// @Param broken\n// @Router /bad [get]\nfunc Bad() {}\n",
        );
        assert!(matches!(
            build(&fs, ParserConfig::default()),
            Err(SwagError::MalformedAnnotation { .. })
        ));
    }

    struct FakeLister(Vec<DependencyPackage>);

    impl DependencyLister for FakeLister {
        fn list(&self, _root: &Path) -> Result<Vec<DependencyPackage>> {
            Ok(self.0.clone())
        }
    }

    fn dependency(import_path: &str, file: &str) -> DependencyPackage {
        DependencyPackage {
            import_path: import_path.to_string(),
            name: "shared".to_string(),
            dir: PathBuf::from(file).parent().map(Path::to_path_buf).unwrap_or_default(),
            go_files: vec![PathBuf::from(file)],
            standard: false,
        }
    }

    #[test]
    fn test_dependencies_are_indexed_for_models() {
        let fs = MemoryFs::new()
            .with_file("/src/go.mod", "module example.com/pets\n")
            .with_file("/src/main.go", MAIN)
            .with_file(
                "/src/api.go",
                "package main\n\nimport \"example.com/shared\"\n\n// @Success 200 {object} shared.Money\n// @Router /price [get]\nfunc Price() {}\n",
            )
            .with_file(
                "/deps/shared/money.go",
                "package shared\n\ntype Money struct {\n\tAmount int `json:\"amount\"`\n}\n\n// @Router /leak [get]\nfunc Leak() {}\n",
            )
            .with_file(
                "/deps/internal/secret.go",
                "package internal\n\ntype Secret struct{}\n",
            );
        let lister = FakeLister(vec![
            dependency("example.com/shared", "/deps/shared/money.go"),
            dependency("example.com/shared/internal", "/deps/internal/secret.go"),
        ]);
        let config = ParserConfig::default().with_parse_dependency(true);
        let swagger = SwaggerBuilder::new(config, &fs, &NoAssets)
            .with_dependency_lister(&lister)
            .build(&[PathBuf::from("/src")], Path::new("main.go"))
            .unwrap();

        assert!(swagger.definitions.contains_key("shared.Money"));
        assert!(swagger.paths.contains_key("/price"));
        assert!(!swagger.paths.contains_key("/leak"));
    }

    struct CountingLister {
        roots: RefCell<Vec<PathBuf>>,
    }

    impl DependencyLister for CountingLister {
        fn list(&self, root: &Path) -> Result<Vec<DependencyPackage>> {
            self.roots.borrow_mut().push(root.to_path_buf());
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_dependency_lister_runs_once_per_build() {
        let fs = MemoryFs::new()
            .with_file("/src/go.mod", "module example.com/pets\n")
            .with_file("/src/main.go", MAIN)
            .with_file("/lib/go.mod", "module example.com/lib\n")
            .with_file(
                "/lib/money.go",
                "package lib\n\ntype Money struct {\n\tAmount int `json:\"amount\"`\n}\n",
            );
        let lister = CountingLister {
            roots: RefCell::new(Vec::new()),
        };
        let config = ParserConfig::default().with_parse_dependency(true);
        SwaggerBuilder::new(config, &fs, &NoAssets)
            .with_dependency_lister(&lister)
            .build(
                &[PathBuf::from("/src"), PathBuf::from("/lib")],
                Path::new("main.go"),
            )
            .unwrap();

        assert_eq!(lister.roots.into_inner(), vec![PathBuf::from("/src")]);
    }

    #[test]
    fn test_comment_tags() {
        let lines: Vec<String> = vec![" @Summary x".into(), " @Tags pets, store".into(), " @tags admin".into()];
        assert_eq!(comment_tags(&lines), vec!["pets", "store", "admin"]);
    }

    #[test]
    fn test_internal_packages() {
        assert!(is_internal("example.com/app/internal/db"));
        assert!(is_internal("internal/db"));
        assert!(!is_internal("example.com/internals"));
    }

    #[test]
    fn test_requires_search_dir() {
        let fs = MemoryFs::new();
        let result = SwaggerBuilder::new(ParserConfig::default(), &fs, &NoAssets)
            .build(&[], Path::new("main.go"));
        assert!(result.is_err());
    }
}
