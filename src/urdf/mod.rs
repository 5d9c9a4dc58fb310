//! URDF format support: parser and exporter.

mod exporter;
mod parser;
mod validation;

use std::path::Path;

use crate::engine::{Exporter, Parser};
use crate::error::Result;
use crate::schema::CommonSchema;

pub use exporter::{export_urdf_file, export_urdf_string};
pub use parser::{parse_urdf_file, parse_urdf_str};

/// URDF format handler.
#[derive(Debug, Default)]
pub struct UrdfFormat;

impl Parser for UrdfFormat {
    fn can_parse(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some("urdf") => true,
            Some("xml") => std::fs::read_to_string(path)
                .map(|s| s.contains("<robot"))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn parse(&self, path: &Path) -> Result<CommonSchema> {
        parse_urdf_file(path)
    }
}

impl Exporter for UrdfFormat {
    fn extension(&self) -> &'static str {
        "urdf"
    }

    fn export(&self, schema: &CommonSchema, path: &Path) -> Result<()> {
        export_urdf_file(schema, path)
    }
}
