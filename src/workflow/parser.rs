//! Recipe Loader
//!
//! Loads a recipe directory into a [`RecipeDescription`].
//!
//! A recipe directory holds a `meta.yml` metadata file and, for shell
//! recipes, a shell file with one command per line. Blank lines and lines
//! starting with `#` are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use super::model::{InputParam, OutputPolicy, ParallelConfig, RecipeDescription, WorkflowKind};
use crate::error::RecipeError;

/// Name of the metadata file inside a recipe directory.
pub const RECIPE_CONFIG_FILENAME: &str = "meta.yml";

/// Default shell file name.
pub const DEFAULT_SH_FILE: &str = "recipe.sh";

#[derive(Deserialize, Debug)]
struct RecipeMeta {
    name: String,
    id: String,
    #[serde(default)]
    input: MetaInput,
    #[serde(default)]
    output: OutputPolicy,
    #[serde(default)]
    workflow: MetaWorkflow,
}

#[derive(Deserialize, Debug, Default)]
struct MetaInput {
    #[serde(default)]
    params: Vec<InputParam>,
}

#[derive(Deserialize, Debug)]
struct MetaWorkflow {
    #[serde(rename = "type", default)]
    kind: WorkflowKind,
    #[serde(default = "default_sh_file")]
    sh_file: String,
    #[serde(default)]
    parallel: Option<ParallelConfig>,
}

impl Default for MetaWorkflow {
    fn default() -> Self {
        Self {
            kind: WorkflowKind::Shell,
            sh_file: default_sh_file(),
            parallel: None,
        }
    }
}

fn default_sh_file() -> String {
    DEFAULT_SH_FILE.to_string()
}

/// Loads the recipe stored in `dir`.
///
/// # Example
///
/// ```no_run
/// use recipeflow::workflow::parser::load_recipe;
///
/// let recipe = load_recipe("recipes/ice-basins").unwrap();
/// println!("{} commands", recipe.commands.len());
/// ```
pub fn load_recipe(dir: impl AsRef<Path>) -> Result<RecipeDescription, RecipeError> {
    let dir = dir.as_ref();
    let meta_path = dir.join(RECIPE_CONFIG_FILENAME);
    info!("Loading recipe from: {}", dir.display());

    let content = read(&meta_path)?;
    let meta: RecipeMeta = serde_yaml::from_str(&content).map_err(|source| RecipeError::Yaml {
        path: meta_path.clone(),
        source,
    })?;

    validate_id(&meta.id)?;

    let commands = if meta.workflow.kind.compiles_to_command_dag() {
        let sh_path = dir.join(&meta.workflow.sh_file);
        parse_commands(&read(&sh_path)?)
    } else {
        debug!(
            "Workflow type '{}' has no shell file, skipping commands",
            meta.workflow.kind
        );
        Vec::new()
    };

    let mut recipe = RecipeDescription::new(meta.id, commands)
        .with_name(meta.name)
        .with_inputs(meta.input.params)
        .with_kind(meta.workflow.kind)
        .with_output(meta.output);

    if let Some(parallel) = meta.workflow.parallel {
        recipe = recipe.with_parallel(parallel);
    }

    info!(
        "Loaded recipe '{}': {} commands, {} inputs, parallel={}",
        recipe.id,
        recipe.commands.len(),
        recipe.inputs.len(),
        recipe.parallel_enabled()
    );

    Ok(recipe)
}

/// Extracts commands from shell file content.
pub fn parse_commands(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Checks that `id` is usable in Kubernetes object names.
pub fn validate_id(id: &str) -> Result<(), RecipeError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(RecipeError::InvalidId(id.to_string()))
    }
}

fn read(path: &Path) -> Result<String, RecipeError> {
    fs::read_to_string(path).map_err(|source| RecipeError::Io {
        path: PathBuf::from(path),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::InputKind;
    use tempfile::TempDir;

    fn write_recipe(meta: &str, script: Option<&str>) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(RECIPE_CONFIG_FILENAME), meta).unwrap();
        if let Some(script) = script {
            fs::write(dir.path().join(DEFAULT_SH_FILE), script).unwrap();
        }
        dir
    }

    #[test]
    fn test_parse_commands() {
        let content = "#!/bin/sh\n\n# fetch\ngdalinfo $INPUT_DIR\n   \n  ogr2ogr out in  \n";
        assert_eq!(
            parse_commands(content),
            vec!["gdalinfo $INPUT_DIR", "ogr2ogr out in"]
        );
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("ice-basins.v2").is_ok());
        assert!(validate_id("Ice").is_err());
        assert!(validate_id("ice_basins").is_err());
        assert!(validate_id("").is_err());
    }

    #[test]
    fn test_load_shell_recipe() {
        let dir = write_recipe(
            r#"
name: Ice basins
id: ice-basins
input:
  params:
    - value: https://example.com/a.gpkg
      type: url
    - value: /data/b.gpkg
      type: file_system
output:
  type: temporary
workflow:
  type: shell
  parallel:
    enabled: true
    partition_size: 2
"#,
            Some("# comment\necho one\necho two\n"),
        );

        let recipe = load_recipe(dir.path()).unwrap();

        assert_eq!(recipe.id, "ice-basins");
        assert_eq!(recipe.name, "Ice basins");
        assert_eq!(recipe.commands, vec!["echo one", "echo two"]);
        assert_eq!(recipe.inputs.len(), 2);
        assert_eq!(recipe.inputs[1].kind, InputKind::FileSystem);
        assert_eq!(recipe.output, OutputPolicy::Temporary);
        assert_eq!(recipe.active_parallel_config().unwrap().partition_size, 2);
    }

    #[test]
    fn test_custom_sh_file() {
        let dir = write_recipe(
            "name: r\nid: r\nworkflow:\n  type: shell\n  sh_file: steps.sh\n",
            None,
        );
        fs::write(dir.path().join("steps.sh"), "echo custom\n").unwrap();

        let recipe = load_recipe(dir.path()).unwrap();
        assert_eq!(recipe.commands, vec!["echo custom"]);
        assert_eq!(recipe.output, OutputPolicy::Pvc);
    }

    #[test]
    fn test_visualization_recipe_has_no_commands() {
        let dir = write_recipe("name: viz\nid: viz\nworkflow:\n  type: visualization\n", None);

        let recipe = load_recipe(dir.path()).unwrap();
        assert_eq!(recipe.kind, WorkflowKind::Visualization);
        assert!(recipe.commands.is_empty());
    }

    #[test]
    fn test_missing_meta_file() {
        let dir = TempDir::new().unwrap();
        let result = load_recipe(dir.path());
        assert!(matches!(result, Err(RecipeError::Io { .. })));
    }

    #[test]
    fn test_missing_sh_file() {
        let dir = write_recipe("name: r\nid: r\n", None);
        let err = load_recipe(dir.path()).unwrap_err();
        assert!(err.to_string().contains(DEFAULT_SH_FILE));
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = write_recipe("name: [unclosed", Some("echo\n"));
        let result = load_recipe(dir.path());
        assert!(matches!(result, Err(RecipeError::Yaml { .. })));
    }

    #[test]
    fn test_invalid_id_rejected() {
        let dir = write_recipe("name: r\nid: Not_Valid\n", Some("echo\n"));
        let result = load_recipe(dir.path());
        assert!(matches!(result, Err(RecipeError::InvalidId(_))));
    }

    #[test]
    fn test_unknown_workflow_type_rejected() {
        let dir = write_recipe("name: r\nid: r\nworkflow:\n  type: notebook\n", Some("echo\n"));
        assert!(load_recipe(dir.path()).is_err());
    }
}
