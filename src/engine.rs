//! Conversion engine: format registry and the convert pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::{ConvertError, Result};
use crate::schema::CommonSchema;

/// A format that can be read into the common schema.
pub trait Parser: Send + Sync {
    /// Cheap check whether this parser handles the file. May open the file
    /// to sniff content when the extension is ambiguous.
    fn can_parse(&self, path: &Path) -> bool;

    /// Parse the file. Fails only for document-level problems; element-level
    /// issues are recorded on the returned schema.
    fn parse(&self, path: &Path) -> Result<CommonSchema>;
}

/// A format the common schema can be written to.
pub trait Exporter: Send + Sync {
    /// Default file extension for this format.
    fn extension(&self) -> &'static str;

    /// Write the schema to the given path.
    fn export(&self, schema: &CommonSchema, path: &Path) -> Result<()>;
}

/// Options controlling a single conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Source format key; detected from the input file when None.
    pub source_format: Option<String>,
    /// Target format key; derived from the output extension when None.
    pub target_format: Option<String>,
    /// Run schema validation between parse and export. On by default; a
    /// non-empty issue list aborts the conversion before anything is written.
    pub validate: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            source_format: None,
            target_format: None,
            validate: true,
        }
    }
}

/// Registry of parsers and exporters plus the conversion pipeline.
///
/// Every conversion is parse → validate → export; formats never talk to each
/// other directly.
#[derive(Default)]
pub struct ConversionEngine {
    parsers: HashMap<String, Box<dyn Parser>>,
    exporters: HashMap<String, Box<dyn Exporter>>,
}

impl ConversionEngine {
    /// Create an empty engine with no formats registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with all built-in formats registered.
    #[must_use]
    pub fn with_default_formats() -> Self {
        let mut engine = Self::new();

        engine.register_parser("urdf", Box::new(crate::urdf::UrdfFormat));
        engine.register_exporter("urdf", Box::new(crate::urdf::UrdfFormat));

        engine.register_parser("mjcf", Box::new(crate::mjcf::MjcfFormat));
        engine.register_exporter("mjcf", Box::new(crate::mjcf::MjcfFormat));
        engine.register_parser("xml", Box::new(crate::mjcf::MjcfFormat));

        for alias in ["schema", "yaml", "yml"] {
            engine.register_parser(alias, Box::new(crate::schema_io::SchemaFormat::yaml()));
            engine.register_exporter(alias, Box::new(crate::schema_io::SchemaFormat::yaml()));
        }
        engine.register_parser("json", Box::new(crate::schema_io::SchemaFormat::json()));
        engine.register_exporter("json", Box::new(crate::schema_io::SchemaFormat::json()));

        engine.register_parser("sdf", Box::new(crate::scene::SceneFormat));
        engine.register_exporter("sdf", Box::new(crate::scene::SceneFormat));

        engine
    }

    /// Register a parser under a format key.
    pub fn register_parser(&mut self, format: &str, parser: Box<dyn Parser>) {
        self.parsers.insert(format.to_lowercase(), parser);
    }

    /// Register an exporter under a format key.
    pub fn register_exporter(&mut self, format: &str, exporter: Box<dyn Exporter>) {
        self.exporters.insert(format.to_lowercase(), exporter);
    }

    /// Registered parser format keys, sorted.
    #[must_use]
    pub fn supported_inputs(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Registered exporter format keys, sorted.
    #[must_use]
    pub fn supported_outputs(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.exporters.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Detect the source format of a file.
    ///
    /// The parser registered under the file's extension is asked first; if it
    /// declines, every registered parser gets a chance to sniff the content.
    pub fn detect_format(&self, path: &Path) -> Result<&str> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        if let Some(ref ext) = ext {
            if let Some((key, parser)) = self.parsers.get_key_value(ext) {
                if parser.can_parse(path) {
                    return Ok(key);
                }
            }
        }

        for (key, parser) in &self.parsers {
            if Some(key.as_str()) != ext.as_deref() && parser.can_parse(path) {
                return Ok(key);
            }
        }

        Err(ConvertError::FormatDetection(path.to_path_buf()))
    }

    /// Convert one file. Returns the intermediate schema that was written.
    pub fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<CommonSchema> {
        if !input.exists() {
            return Err(ConvertError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input file not found: {}", input.display()),
            )));
        }

        let source = match options.source_format {
            Some(ref f) => f.to_lowercase(),
            None => self.detect_format(input)?.to_string(),
        };
        let target = match options.target_format {
            Some(ref f) => f.to_lowercase(),
            None => output
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase)
                .ok_or_else(|| ConvertError::FormatDetection(output.to_path_buf()))?,
        };

        let parser = self
            .parsers
            .get(&source)
            .ok_or_else(|| ConvertError::UnsupportedFormat(source.clone()))?;
        let exporter = self
            .exporters
            .get(&target)
            .ok_or_else(|| ConvertError::UnsupportedFormat(target.clone()))?;

        info!(
            input = %input.display(),
            output = %output.display(),
            source = %source,
            target = %target,
            "converting"
        );

        let schema = parser.parse(input)?;

        if options.validate {
            let issues = schema.validate();
            if !issues.is_empty() {
                return Err(ConvertError::Validation(issues));
            }
        }

        exporter.export(&schema, output)?;
        Ok(schema)
    }

    /// Convert every matching file in a directory.
    ///
    /// Files are independent, so they are converted in parallel. Per-file
    /// failures are logged and skipped; the returned list holds the output
    /// paths that were actually written, sorted.
    pub fn batch_convert(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        source_format: &str,
        target_format: &str,
    ) -> Result<Vec<PathBuf>> {
        let source = source_format.to_lowercase();
        let target = target_format.to_lowercase();
        let extension = self
            .exporters
            .get(&target)
            .map(|e| e.extension())
            .ok_or_else(|| ConvertError::UnsupportedFormat(target.clone()))?;
        let parser = self
            .parsers
            .get(&source)
            .ok_or_else(|| ConvertError::UnsupportedFormat(source.clone()))?;

        std::fs::create_dir_all(output_dir)?;

        // Match by extension, or let the parser sniff files under other
        // extensions (MJCF in a .xml file, for instance).
        let mut inputs: Vec<PathBuf> = std::fs::read_dir(input_dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_lowercase);
                ext.as_deref() == Some(source.as_str()) || parser.can_parse(path)
            })
            .collect();
        inputs.sort();

        let options = ConvertOptions {
            source_format: Some(source),
            target_format: Some(target),
            validate: true,
        };

        let mut outputs: Vec<PathBuf> = inputs
            .par_iter()
            .filter_map(|input| {
                let stem = input.file_stem()?;
                let output = output_dir.join(stem).with_extension(extension);
                match self.convert(input, &output, &options) {
                    Ok(_) => Some(output),
                    Err(err) => {
                        warn!(input = %input.display(), %err, "batch conversion failed");
                        None
                    }
                }
            })
            .collect();
        outputs.sort();

        info!(
            converted = outputs.len(),
            total = inputs.len(),
            "batch conversion finished"
        );
        Ok(outputs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;

    const URDF: &str = r#"
        <robot name="mini">
            <link name="base">
                <inertial>
                    <mass value="1.0"/>
                    <inertia ixx="0.1" iyy="0.1" izz="0.1"/>
                </inertial>
            </link>
            <link name="arm"/>
            <joint name="j1" type="revolute">
                <parent link="base"/>
                <child link="arm"/>
                <axis xyz="0 1 0"/>
            </joint>
        </robot>
    "#;

    #[test]
    fn test_default_formats_registered() {
        let engine = ConversionEngine::with_default_formats();
        assert!(engine.supported_inputs().contains(&"urdf"));
        assert!(engine.supported_inputs().contains(&"mjcf"));
        assert!(engine.supported_inputs().contains(&"yaml"));
        assert!(engine.supported_outputs().contains(&"sdf"));
    }

    #[test]
    fn test_detect_by_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("robot.urdf");
        fs::write(&path, URDF).expect("write");

        let engine = ConversionEngine::with_default_formats();
        assert_eq!(engine.detect_format(&path).expect("detect"), "urdf");
    }

    #[test]
    fn test_detect_by_content_sniff() {
        // A .xml extension maps to the MJCF parser, but URDF content inside
        // should still be detected by the fallback sniff.
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("robot.xml");
        fs::write(&path, URDF).expect("write");

        let engine = ConversionEngine::with_default_formats();
        assert_eq!(engine.detect_format(&path).expect("detect"), "urdf");
    }

    #[test]
    fn test_detect_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("robot.step");
        fs::write(&path, "not a robot").expect("write");

        let engine = ConversionEngine::with_default_formats();
        assert!(matches!(
            engine.detect_format(&path),
            Err(ConvertError::FormatDetection(_))
        ));
    }

    #[test]
    fn test_missing_input() {
        let engine = ConversionEngine::with_default_formats();
        let result = engine.convert(
            Path::new("/nonexistent/robot.urdf"),
            Path::new("/tmp/out.yaml"),
            &ConvertOptions::default(),
        );
        assert!(matches!(result, Err(ConvertError::Io(_))));
    }

    #[test]
    fn test_unsupported_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("robot.urdf");
        fs::write(&input, URDF).expect("write");

        let engine = ConversionEngine::with_default_formats();
        let result = engine.convert(
            &input,
            &dir.path().join("robot.step"),
            &ConvertOptions::default(),
        );
        assert!(matches!(result, Err(ConvertError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_validation_blocks_broken_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("broken.urdf");
        fs::write(
            &input,
            r#"
            <robot name="broken">
                <link name="base"/>
                <link name="base"/>
            </robot>
            "#,
        )
        .expect("write");
        let output = dir.path().join("broken.yaml");

        let engine = ConversionEngine::with_default_formats();
        let result = engine.convert(&input, &output, &ConvertOptions::default());
        match result {
            Err(ConvertError::Validation(issues)) => {
                assert!(issues.iter().any(|i| i.contains("duplicate link")));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("broken.urdf");
        fs::write(
            &input,
            r#"
            <robot name="broken">
                <link name="base"/>
                <link name="base"/>
            </robot>
            "#,
        )
        .expect("write");
        let output = dir.path().join("broken.yaml");

        let engine = ConversionEngine::with_default_formats();
        let options = ConvertOptions {
            validate: false,
            ..ConvertOptions::default()
        };
        engine
            .convert(&input, &output, &options)
            .expect("should convert without validation");
        assert!(output.exists());
    }
}
