//! Scene description (SDF) placeholder.
//!
//! SDF support is limited to format detection and a stub export; full
//! semantics are not implemented.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::engine::{Exporter, Parser};
use crate::error::{ConvertError, Result};
use crate::schema::{CommonSchema, Metadata};

/// SDF format handler. Recognizes the format but carries no semantics yet.
#[derive(Debug, Default)]
pub struct SceneFormat;

impl Parser for SceneFormat {
    fn can_parse(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some("sdf") => true,
            Some("xml") => fs::read_to_string(path)
                .map(|s| s.contains("<sdf") || s.contains("<world"))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn parse(&self, path: &Path) -> Result<CommonSchema> {
        let text = fs::read_to_string(path)?;
        if !text.contains("<sdf") && !text.contains("<world") {
            return Err(ConvertError::missing_element("sdf", "SDF document"));
        }

        warn!("SDF import is a stub; links and joints are not read");
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string());
        Ok(CommonSchema::new(
            Metadata::new(name).with_source_format("sdf"),
        ))
    }
}

impl Exporter for SceneFormat {
    fn extension(&self) -> &'static str {
        "sdf"
    }

    fn export(&self, schema: &CommonSchema, path: &Path) -> Result<()> {
        warn!("SDF export is a stub; writing a placeholder document");
        let placeholder = format!(
            "<?xml version=\"1.0\"?>\n<sdf version=\"1.9\">\n  \
             <!-- model '{}': SDF export not implemented -->\n</sdf>\n",
            schema.metadata.name
        );
        fs::write(path, placeholder)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_export_and_reimport() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scene.sdf");

        let schema = CommonSchema::new(Metadata::new("pendulum"));
        SceneFormat.export(&schema, &path).expect("should write");

        let text = fs::read_to_string(&path).expect("should read");
        assert!(text.contains("<sdf"));
        assert!(text.contains("pendulum"));

        let back = SceneFormat.parse(&path).expect("should sniff");
        assert_eq!(back.metadata.source_format.as_deref(), Some("sdf"));
        assert!(back.links.is_empty());
    }

    #[test]
    fn test_non_sdf_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("robot.sdf");
        fs::write(&path, "<robot name='x'/>").expect("write");

        assert!(SceneFormat.parse(&path).is_err());
    }
}
