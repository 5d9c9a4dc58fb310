//! Direct serialization of the common schema as YAML or JSON.
//!
//! This is the lossless leg of the converter: the document is the schema
//! itself, so nothing has to be mapped or approximated.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::engine::{Exporter, Parser};
use crate::error::Result;
use crate::schema::CommonSchema;

/// Parse a YAML schema document.
pub fn parse_schema_yaml(text: &str) -> Result<CommonSchema> {
    let schema: CommonSchema = serde_yaml::from_str(text)?;
    Ok(schema)
}

/// Parse a JSON schema document.
pub fn parse_schema_json(text: &str) -> Result<CommonSchema> {
    let schema: CommonSchema = serde_json::from_str(text)?;
    Ok(schema)
}

/// Serialize a schema as YAML.
pub fn export_schema_yaml(schema: &CommonSchema) -> Result<String> {
    Ok(serde_yaml::to_string(schema)?)
}

/// Serialize a schema as pretty-printed JSON.
pub fn export_schema_json(schema: &CommonSchema) -> Result<String> {
    Ok(serde_json::to_string_pretty(schema)?)
}

/// Structured schema format handler.
///
/// The file extension picks the encoding when it is unambiguous; otherwise
/// the handler's own flavor decides, so the registry can offer both a YAML
/// and a JSON entry.
#[derive(Debug, Default)]
pub struct SchemaFormat {
    json: bool,
}

impl SchemaFormat {
    /// YAML-flavored handler.
    #[must_use]
    pub fn yaml() -> Self {
        Self { json: false }
    }

    /// JSON-flavored handler.
    #[must_use]
    pub fn json() -> Self {
        Self { json: true }
    }

    fn use_json(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => true,
            Some("yaml" | "yml") => false,
            _ => self.json,
        }
    }
}

impl Parser for SchemaFormat {
    fn can_parse(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml" | "json") => {
                let Ok(text) = fs::read_to_string(path) else {
                    return false;
                };
                // A schema document always carries a top-level metadata key.
                serde_yaml::from_str::<serde_yaml::Value>(&text)
                    .ok()
                    .and_then(|v| v.get("metadata").map(|_| ()))
                    .is_some()
            }
            _ => false,
        }
    }

    fn parse(&self, path: &Path) -> Result<CommonSchema> {
        let text = fs::read_to_string(path)?;
        let schema = if self.use_json(path) {
            parse_schema_json(&text)?
        } else {
            parse_schema_yaml(&text)?
        };
        debug!(
            links = schema.links.len(),
            joints = schema.joints.len(),
            "parsed schema document"
        );
        Ok(schema)
    }
}

impl Exporter for SchemaFormat {
    fn extension(&self) -> &'static str {
        if self.json { "json" } else { "yaml" }
    }

    fn export(&self, schema: &CommonSchema, path: &Path) -> Result<()> {
        let text = if self.use_json(path) {
            export_schema_json(schema)?
        } else {
            export_schema_yaml(schema)?
        };
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::{Joint, JointType, Link, Metadata};

    fn sample() -> CommonSchema {
        CommonSchema::new(Metadata::new("sample"))
            .with_link(Link::new("base").with_mass(2.0))
            .with_link(Link::new("arm"))
            .with_joint(Joint::new("j1", JointType::Revolute, "base", "arm"))
    }

    #[test]
    fn test_yaml_roundtrip() {
        let schema = sample();
        let yaml = export_schema_yaml(&schema).expect("serialize");
        let back = parse_schema_yaml(&yaml).expect("deserialize");
        assert_eq!(schema, back);
    }

    #[test]
    fn test_json_roundtrip() {
        let schema = sample();
        let json = export_schema_json(&schema).expect("serialize");
        let back = parse_schema_json(&json).expect("deserialize");
        assert_eq!(schema, back);
    }

    #[test]
    fn test_parse_handwritten_yaml() {
        let yaml = r#"
metadata:
  name: minimal
links:
  - name: base
    mass: 1.5
joints: []
"#;
        let schema = parse_schema_yaml(yaml).expect("should parse");
        assert_eq!(schema.metadata.name, "minimal");
        assert_eq!(schema.metadata.version, "1.0");
        assert_eq!(schema.metadata.units, "SI");
        assert_eq!(schema.link("base").map(|l| l.mass), Some(1.5));
    }

    #[test]
    fn test_malformed_yaml_is_decode_error() {
        let result = parse_schema_yaml("links: {not: [valid");
        assert!(matches!(
            result,
            Err(crate::error::ConvertError::Decode(_))
        ));
    }
}
