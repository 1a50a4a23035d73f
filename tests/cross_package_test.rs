use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use swagger_from_source::{
    assets::DirAssets,
    config::ParserConfig,
    document::{HttpMethod, Swagger},
    error::{Result, SwagError},
    scanner::OsFs,
    swagger_builder::SwaggerBuilder,
};
use tempfile::TempDir;

const MAIN: &str = "package main\n\n// @title Cross package\n// @version 2.0\nfunc main() {}\n";

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

fn try_build(dir: &Path, config: ParserConfig) -> Result<Swagger> {
    let assets = DirAssets::default();
    SwaggerBuilder::new(config, &OsFs, &assets).build(&[PathBuf::from(dir)], Path::new("main.go"))
}

#[test]
fn test_colliding_type_names_are_qualified() {
    let project = create_test_project(&[
        ("go.mod", "module example.com/app\n"),
        ("main.go", MAIN),
        (
            "v1/model/user.go",
            "package model\n\ntype User struct {\n\tName string `json:\"name\"`\n}\n",
        ),
        (
            "v2/model/user.go",
            "package model\n\ntype User struct {\n\tFullName string `json:\"full_name\"`\n}\n",
        ),
        (
            "api/users.go",
            r#"package api

import (
	"example.com/app/v1/model"
	v2 "example.com/app/v2/model"
)

// @Success 200 {object} model.User
// @Router /v1/users [get]
func ListV1() {}

// @Success 200 {object} v2.User
// @Router /v2/users [get]
func ListV2() {}
"#,
        ),
    ]);
    let swagger = try_build(project.path(), ParserConfig::default()).unwrap();

    let names: Vec<&str> = swagger.definitions.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["example_com_app_v1_model.User", "example_com_app_v2_model.User"]);

    let v2 = swagger.paths["/v2/users"].operation(HttpMethod::Get).unwrap();
    assert_eq!(
        serde_json::to_value(&v2.responses["200"].schema).unwrap(),
        json!({"$ref": "#/definitions/example_com_app_v2_model.User"})
    );
    assert!(swagger.definitions["example_com_app_v2_model.User"]
        .properties
        .contains_key("full_name"));
}

#[test]
fn test_shifted_iota_constants() {
    let project = create_test_project(&[
        ("go.mod", "module example.com/flags\n"),
        ("main.go", MAIN),
        (
            "perm/mask.go",
            r#"package perm

type Mask int

const (
	Mask1 Mask = 0x02 << iota >> 1
	Mask2
	Mask3
	Mask4
)

type Grant struct {
	Mask Mask `json:"mask"`
}

// @Success 200 {object} perm.Grant
// @Router /grant [get]
func GetGrant() {}
"#,
        ),
    ]);
    let swagger = try_build(project.path(), ParserConfig::default()).unwrap();
    let mask = serde_json::to_value(&swagger.definitions["perm.Mask"]).unwrap();
    assert_eq!(mask["type"], "integer");
    assert_eq!(mask["enum"], json!([1, 2, 4, 8]));
    assert_eq!(mask["x-enum-varnames"], json!(["Mask1", "Mask2", "Mask3", "Mask4"]));
}

#[test]
fn test_strict_mode_rejects_duplicate_routes() {
    let project = create_test_project(&[
        ("go.mod", "module example.com/dup\n"),
        ("main.go", MAIN),
        (
            "a/a.go",
            "package a\n\n// @Summary first\n// @Router /items [get]\nfunc First() {}\n",
        ),
        (
            "b/b.go",
            "package b\n\n// @Summary second\n// @Router /items [get]\nfunc Second() {}\n",
        ),
    ]);

    let swagger = try_build(project.path(), ParserConfig::default()).unwrap();
    let get = swagger.paths["/items"].operation(HttpMethod::Get).unwrap();
    assert_eq!(get.summary.as_deref(), Some("second"));

    let err = try_build(project.path(), ParserConfig::default().with_strict(true)).unwrap_err();
    assert_eq!(err.to_string(), "route GET /items is declared multiple times");
}

#[test]
fn test_vendor_and_excludes() {
    let project = create_test_project(&[
        ("go.mod", "module example.com/shop\n"),
        ("main.go", MAIN),
        (
            "vendor/github.com/acme/money/money.go",
            "package money\n\ntype Amount struct {\n\tCents int64 `json:\"cents\"`\n}\n\n// @Router /vendored [get]\nfunc Vendored() {}\n",
        ),
        (
            "api/price.go",
            "package api\n\nimport \"github.com/acme/money\"\n\n// @Success 200 {object} money.Amount\n// @Router /price [get]\nfunc Price() {}\n",
        ),
        (
            "legacy/old.go",
            "package legacy\n\n// @Router /legacy [get]\nfunc Old() {}\n",
        ),
    ]);

    let mut config = ParserConfig::default();
    config.parse_vendor = true;
    config.excludes = vec![PathBuf::from("legacy")];
    let swagger = try_build(project.path(), config).unwrap();

    let paths: Vec<&str> = swagger.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/price"]);
    assert!(swagger.definitions.contains_key("money.Amount"));

    let err = try_build(project.path(), ParserConfig::default()).unwrap_err();
    assert!(matches!(err, SwagError::UnresolvedType(_)));
}

#[test]
fn test_overrides_skip_fields() {
    let project = create_test_project(&[
        ("go.mod", "module example.com/acct\n"),
        ("main.go", MAIN),
        (
            "models/account.go",
            r#"package models

type Secret struct {
	Hash string
}

type Account struct {
	Login  string `json:"login"`
	Secret Secret `json:"secret"`
	Parent ID     `json:"parent"`
}

type ID struct {
	Value string
}

// @Success 200 {object} models.Account
// @Router /account [get]
func GetAccount() {}
"#,
        ),
    ]);
    let overrides = BTreeMap::from([
        ("example.com/acct/models.Secret".to_string(), String::new()),
        ("example.com/acct/models.ID".to_string(), "string".to_string()),
    ]);
    let swagger = try_build(
        project.path(),
        ParserConfig::default().with_overrides(overrides),
    )
    .unwrap();

    let account = &swagger.definitions["models.Account"];
    let properties: Vec<&str> = account.properties.keys().map(String::as_str).collect();
    assert_eq!(properties, vec!["login", "parent"]);
    assert_eq!(
        serde_json::to_value(&account.properties["parent"]).unwrap(),
        json!({"type": "string"})
    );
    assert!(!swagger.definitions.contains_key("models.Secret"));
}
