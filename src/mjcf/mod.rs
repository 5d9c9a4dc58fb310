//! MJCF format support: parser and exporter.

mod exporter;
mod parser;

use std::path::Path;

use crate::engine::{Exporter, Parser};
use crate::error::Result;
use crate::schema::CommonSchema;

pub use exporter::{export_mjcf_file, export_mjcf_string};
pub use parser::{parse_mjcf_file, parse_mjcf_str};

/// MJCF format handler.
#[derive(Debug, Default)]
pub struct MjcfFormat;

impl Parser for MjcfFormat {
    fn can_parse(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some("mjcf") => true,
            Some("xml") => std::fs::read_to_string(path)
                .map(|s| s.contains("<mujoco"))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn parse(&self, path: &Path) -> Result<CommonSchema> {
        parse_mjcf_file(path)
    }
}

impl Exporter for MjcfFormat {
    fn extension(&self) -> &'static str {
        "mjcf"
    }

    fn export(&self, schema: &CommonSchema, path: &Path) -> Result<()> {
        export_mjcf_file(schema, path)
    }
}
