//! Step Execution Context
//!
//! Typed replacement for the environment variables a step command reads.
//! Every generated step receives its own context; nothing is carried over
//! between steps, lines, or files.

use serde::{Deserialize, Serialize};

use crate::workflow::model::file_name_of;
use crate::workflow::partition::manifest_json;

pub const INPUT_DIR: &str = "INPUT_DIR";
pub const OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const INPUT_FILE: &str = "INPUT_FILE";
pub const OUTPUT_FILE: &str = "OUTPUT_FILE";
pub const PARTITION_MANIFEST: &str = "PARTITION_MANIFEST";

/// A single environment variable handed to a container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EnvBinding {
    pub name: String,
    pub value: String,
}

impl EnvBinding {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Which files a step processes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// The command runs once against the whole input directory
    WholeDirectory,
    /// The command runs once per entry of the static partition manifest
    Manifest(Vec<String>),
    /// The command runs once per regular file found in the input directory
    /// when the step starts
    DirectoryScan,
}

/// Paths bound for one iteration of a per-file step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    pub input_file: String,
    pub output_file: String,
}

impl FileContext {
    pub fn env_bindings(&self) -> Vec<EnvBinding> {
        vec![
            EnvBinding::new(INPUT_FILE, &self.input_file),
            EnvBinding::new(OUTPUT_FILE, &self.output_file),
        ]
    }
}

/// Input and output locations of one step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub input_dir: String,
    pub output_dir: String,
    pub source: FileSource,
}

impl ExecutionContext {
    pub fn new(input_dir: impl Into<String>, output_dir: impl Into<String>, source: FileSource) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            source,
        }
    }

    /// Whether the command is executed once per file.
    pub fn iterates_files(&self) -> bool {
        !matches!(self.source, FileSource::WholeDirectory)
    }

    /// Static environment of the step container.
    pub fn env_bindings(&self) -> Vec<EnvBinding> {
        let mut bindings = vec![
            EnvBinding::new(INPUT_DIR, &self.input_dir),
            EnvBinding::new(OUTPUT_DIR, &self.output_dir),
        ];

        if let FileSource::Manifest(files) = &self.source {
            bindings.push(EnvBinding::new(PARTITION_MANIFEST, manifest_json(files)));
        }

        bindings
    }

    /// Binds `INPUT_FILE`/`OUTPUT_FILE` for a file reference.
    ///
    /// Only the file name is kept: inputs are resolved inside `input_dir`
    /// and outputs are written under the same name in `output_dir`.
    pub fn for_file(&self, reference: &str) -> FileContext {
        let name = file_name_of(reference);
        FileContext {
            input_file: join_path(&self.input_dir, name),
            output_file: join_path(&self.output_dir, name),
        }
    }
}

/// Joins container paths with a single separator.
pub fn join_path(dir: &str, name: &str) -> String {
    format!(
        "{}/{}",
        dir.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_bindings() {
        let ctx = ExecutionContext::new("/mnt/in", "/mnt/out", FileSource::WholeDirectory);
        let bindings = ctx.env_bindings();

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0], EnvBinding::new(INPUT_DIR, "/mnt/in"));
        assert_eq!(bindings[1], EnvBinding::new(OUTPUT_DIR, "/mnt/out"));
        assert!(!ctx.iterates_files());
    }

    #[test]
    fn test_manifest_binding() {
        let ctx = ExecutionContext::new(
            "/mnt/in",
            "/mnt/out",
            FileSource::Manifest(vec!["https://example.com/a.tif".to_string()]),
        );
        let bindings = ctx.env_bindings();

        assert!(ctx.iterates_files());
        assert_eq!(
            bindings[2],
            EnvBinding::new(PARTITION_MANIFEST, r#"["https://example.com/a.tif"]"#)
        );
    }

    #[test]
    fn test_scan_has_no_manifest() {
        let ctx = ExecutionContext::new("/mnt/in", "/mnt/out", FileSource::DirectoryScan);
        assert!(ctx.iterates_files());
        assert!(ctx
            .env_bindings()
            .iter()
            .all(|b| b.name != PARTITION_MANIFEST));
    }

    #[test]
    fn test_for_file_uses_file_name() {
        let ctx = ExecutionContext::new("/mnt/in/", "/mnt/out", FileSource::DirectoryScan);
        let file = ctx.for_file("https://example.com/data/b.tif");

        assert_eq!(file.input_file, "/mnt/in/b.tif");
        assert_eq!(file.output_file, "/mnt/out/b.tif");
        assert_eq!(file.env_bindings()[0].name, INPUT_FILE);
        assert_eq!(file.env_bindings()[1].name, OUTPUT_FILE);
    }
}
