use std::collections::HashMap;
use std::fs;

use fieldmap_map::{ConfigError, MapperConfig};
use fieldmap_model::SourceField;
use serde_json::json;

const TICKET_SCHEMA: &str = r#"{
  "entity": "ticket",
  "fields": [
    { "name": "TICKET_ID", "data_type": "string", "required": true },
    { "name": "SUBJECT", "data_type": "string" }
  ]
}"#;

#[tokio::test]
async fn file_config_drives_schemas_aliases_and_tiers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schemas = dir.path().join("schemas");
    fs::create_dir(&schemas).expect("schema dir");
    fs::write(schemas.join("ticket.json"), TICKET_SCHEMA).expect("schema");
    let aliases = dir.path().join("aliases.json");
    fs::write(&aliases, r#"{ "TICKET_ID": ["case_ref"] }"#).expect("aliases");

    let config_path = dir.path().join("fieldmap.toml");
    fs::write(
        &config_path,
        format!(
            "aliases_file = {:?}\nschema_dir = {:?}\n\n[semantic]\nenabled = false\n",
            aliases.display().to_string(),
            schemas.display().to_string(),
        ),
    )
    .expect("config");

    let config = MapperConfig::load(&config_path).expect("load");
    let registry = config.build_registry().expect("registry");
    let engine = config.build_engine().expect("engine");
    assert!(engine.semantic().is_none());
    assert!(registry.get("ticket").is_ok());

    let sources = vec![SourceField::new("case_ref"), SourceField::new("Subject")];
    let outcome = engine
        .auto_map_entity(&registry, "ticket", &sources, 0.7, &HashMap::new())
        .await
        .expect("known entity");

    let summary: Vec<_> = outcome
        .mappings
        .iter()
        .map(|m| json!({ "source": m.source, "target": m.target, "method": m.method.as_str() }))
        .collect();
    insta::assert_json_snapshot!(summary, @r#"
    [
      {
        "method": "exact",
        "source": "Subject",
        "target": "SUBJECT"
      },
      {
        "method": "alias",
        "source": "case_ref",
        "target": "TICKET_ID"
      }
    ]
    "#);
    assert!(!outcome.stats.semantic_available);
    assert_eq!(outcome.stats.mapped, 2);
}

#[test]
fn missing_config_file_reports_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let err = MapperConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"), "{err}");
}
