use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use swagger_from_source::{
    assets::DirAssets,
    config::{ParserConfig, TagFilter},
    document::{HttpMethod, Swagger},
    scanner::OsFs,
    serializer::{serialize_json, serialize_yaml},
    swagger_builder::SwaggerBuilder,
};
use tempfile::TempDir;

const PETSTORE: &[(&str, &str)] = &[
    ("go.mod", include_str!("fixtures/petstore/go.mod")),
    ("main.go", include_str!("fixtures/petstore/main.go")),
    ("handlers/pets.go", include_str!("fixtures/petstore/handlers/pets.go")),
    ("models/pet.go", include_str!("fixtures/petstore/models/pet.go")),
    ("models/status.go", include_str!("fixtures/petstore/models/status.go")),
    ("web/response.go", include_str!("fixtures/petstore/web/response.go")),
];

/// Helper function to create a temporary Go project
fn create_test_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }
    temp_dir
}

fn build(dir: &Path, config: ParserConfig) -> Swagger {
    let assets = DirAssets::default();
    SwaggerBuilder::new(config, &OsFs, &assets)
        .build(&[PathBuf::from(dir)], Path::new("main.go"))
        .expect("Failed to build document")
}

#[test]
fn test_petstore_general_info() {
    let project = create_test_project(PETSTORE);
    let swagger = build(project.path(), ParserConfig::default());
    let doc = serde_json::to_value(&swagger).unwrap();

    assert_eq!(doc["swagger"], "2.0");
    assert_eq!(
        doc["info"],
        json!({
            "title": "Petstore API",
            "version": "1.0.0",
            "description": "A sample pet store.\nGenerated from source annotations.",
            "contact": {"name": "API Support", "email": "support@petstore.example.com"},
            "license": {"name": "MIT"}
        })
    );
    assert_eq!(doc["host"], "petstore.example.com");
    assert_eq!(doc["basePath"], "/api/v1");
    assert_eq!(doc["schemes"], json!(["https"]));
    assert_eq!(doc["consumes"], json!(["application/json"]));
    assert_eq!(doc["produces"], json!(["application/json"]));
    assert_eq!(
        doc["tags"],
        json!([{"name": "pets", "description": "Everything about pets"}])
    );
    assert_eq!(
        doc["securityDefinitions"],
        json!({"ApiKeyAuth": {"type": "apiKey", "in": "header", "name": "Authorization"}})
    );
}

#[test]
fn test_petstore_operations() {
    let project = create_test_project(PETSTORE);
    let swagger = build(project.path(), ParserConfig::default());

    let paths: Vec<&str> = swagger.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/pets", "/pets/{id}"]);

    let list = swagger.paths["/pets"].operation(HttpMethod::Get).unwrap();
    assert_eq!(list.summary.as_deref(), Some("List pets"));
    assert_eq!(list.tags, vec!["pets"]);
    assert_eq!(list.parameters.len(), 2);
    assert_eq!(list.parameters[0].name, "status");
    assert_eq!(list.parameters[0].param_type.as_deref(), Some("string"));
    assert_eq!(
        serde_json::to_value(&list.parameters[1]).unwrap(),
        json!({
            "name": "limit",
            "in": "query",
            "type": "integer",
            "description": "Page size",
            "minimum": 1.0,
            "maximum": 100.0,
            "default": 20
        })
    );
    assert_eq!(
        serde_json::to_value(&list.responses["200"].schema).unwrap(),
        json!({"$ref": "#/definitions/web.Page-models_Pet"})
    );
    assert_eq!(list.responses["500"].description, "Internal Server Error");

    let create = swagger.paths["/pets"].operation(HttpMethod::Post).unwrap();
    assert_eq!(create.operation_id.as_deref(), Some("createPet"));
    assert_eq!(
        serde_json::to_value(&create.parameters[0]).unwrap(),
        json!({
            "name": "pet",
            "in": "body",
            "required": true,
            "description": "The pet to create",
            "schema": {"$ref": "#/definitions/models.Pet"}
        })
    );
    assert_eq!(
        serde_json::to_value(&create.responses["201"].headers).unwrap(),
        json!({"Location": {"type": "string", "description": "URL of the new pet"}})
    );
    assert_eq!(serde_json::to_value(&create.security).unwrap(), json!([{"ApiKeyAuth": []}]));

    let get = swagger.paths["/pets/{id}"].operation(HttpMethod::Get).unwrap();
    assert_eq!(
        serde_json::to_value(&get.parameters[0]).unwrap(),
        json!({"name": "id", "in": "path", "required": true, "type": "integer", "description": "Pet ID"})
    );
    assert_eq!(
        serde_json::to_value(&get.responses["200"].schema).unwrap(),
        json!({"allOf": [
            {"$ref": "#/definitions/web.Envelope"},
            {"type": "object", "properties": {"data": {"$ref": "#/definitions/models.Pet"}}}
        ]})
    );

    let delete = swagger.paths["/pets/{id}"].operation(HttpMethod::Delete).unwrap();
    assert_eq!(delete.responses["204"].description, "No Content");
    assert!(delete.responses["204"].schema.is_none());
}

#[test]
fn test_petstore_definitions() {
    let project = create_test_project(PETSTORE);
    let swagger = build(project.path(), ParserConfig::default());

    let names: Vec<&str> = swagger.definitions.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec![
            "models.Pet",
            "models.Status",
            "web.APIError",
            "web.Envelope",
            "web.Page-models_Pet"
        ]
    );

    let pet = &swagger.definitions["models.Pet"];
    assert_eq!(pet.description.as_deref(), Some("Pet is an animal in the store."));
    assert_eq!(pet.required, vec!["name".to_string()]);
    let properties: Vec<&str> = pet.properties.keys().map(String::as_str).collect();
    assert_eq!(properties, vec!["birth_date", "id", "name", "status", "tags"]);
    assert_eq!(
        serde_json::to_value(&pet.properties["birth_date"]).unwrap(),
        json!({"type": "string", "format": "date-time"})
    );
    assert_eq!(
        serde_json::to_value(&pet.properties["id"]).unwrap(),
        json!({"type": "integer", "format": "int64", "example": 7})
    );

    let status = serde_json::to_value(&swagger.definitions["models.Status"]).unwrap();
    assert_eq!(status["type"], "string");
    assert_eq!(status["enum"], json!(["available", "pending", "sold"]));
    assert_eq!(status["x-enum-varnames"], json!(["Available", "Pending", "Sold"]));
    assert_eq!(status["x-enum-comments"], json!({"Available": "ready for adoption"}));

    let page = &swagger.definitions["web.Page-models_Pet"];
    assert_eq!(
        serde_json::to_value(&page.properties["items"]).unwrap(),
        json!({"type": "array", "items": {"$ref": "#/definitions/models.Pet"}})
    );
}

#[test]
fn test_petstore_output_is_deterministic() {
    let project = create_test_project(PETSTORE);
    let first = build(project.path(), ParserConfig::default());
    let second = build(project.path(), ParserConfig::default());

    let json = serialize_json(&first).unwrap();
    assert_eq!(json, serialize_json(&second).unwrap());
    assert_eq!(serialize_yaml(&first).unwrap(), serialize_yaml(&second).unwrap());

    let from_yaml: Value = serde_yaml::from_str(&serialize_yaml(&first).unwrap()).unwrap();
    let from_json: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(from_yaml, from_json);
}

#[test]
fn test_petstore_output_reads_back() {
    let project = create_test_project(PETSTORE);
    let swagger = build(project.path(), ParserConfig::default());

    let from_json: Swagger = serde_json::from_str(&serialize_json(&swagger).unwrap()).unwrap();
    assert_eq!(from_json, swagger);
    let from_yaml: Swagger = serde_yaml::from_str(&serialize_yaml(&swagger).unwrap()).unwrap();
    assert_eq!(from_yaml, swagger);
}

#[test]
fn test_petstore_tag_filter() {
    let project = create_test_project(PETSTORE);
    let swagger = build(
        project.path(),
        ParserConfig::default().with_tags(TagFilter::parse("pets")),
    );
    let item = &swagger.paths["/pets/{id}"];
    assert!(item.operation(HttpMethod::Get).is_some());
    assert!(item.operation(HttpMethod::Delete).is_none());

    let swagger = build(
        project.path(),
        ParserConfig::default().with_tags(TagFilter::parse("!pets")),
    );
    let paths: Vec<&str> = swagger.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/pets/{id}"]);
    assert!(swagger.definitions.is_empty());
}

#[test]
fn test_petstore_snake_case_strategy() {
    let project = create_test_project(&[
        ("go.mod", "module example.com/naming\n"),
        (
            "main.go",
            "package main\n\n// @title Naming\n// @version 1\nfunc main() {}\n",
        ),
        (
            "api/user.go",
            r#"package api

type User struct {
	UserID    int
	FirstName string
	Email     string `json:"mail"`
}

// @Success 200 {object} api.User
// @Router /user [get]
func GetUser() {}
"#,
        ),
    ]);
    let config = ParserConfig::default().with_naming_strategy(
        swagger_from_source::config::PropNamingStrategy::SnakeCase,
    );
    let swagger = build(project.path(), config);
    let user = &swagger.definitions["api.User"];
    let properties: Vec<&str> = user.properties.keys().map(String::as_str).collect();
    assert_eq!(properties, vec!["first_name", "mail", "user_id"]);
}
