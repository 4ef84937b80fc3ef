//! Workflow Stages
//!
//! Containers that run around the command DAG of a workflow:
//! - `fetch-inputs` stages every recipe input into the shared inputs directory
//! - `publish-output` hands the final task outputs to the output policy
//!
//! Neither stage is a DAG node; the engine backend sequences them before
//! and after the command DAG.

use log::debug;

use super::step::{shell_quote, ContainerTemplate, VolumeMount};
use crate::config::EngineSettings;
use crate::environment::context::{EnvBinding, INPUT_DIR, OUTPUT_DIR};
use crate::workflow::compiler::WorkflowDag;
use crate::workflow::model::{InputKind, InputParam, OutputPolicy};

pub const FETCH_STAGE: &str = "fetch-inputs";
pub const PUBLISH_STAGE: &str = "publish-output";

/// Archive collected as the run's artifact for `temporary` output.
pub const OUTPUT_ARCHIVE: &str = "/tmp/output.zip";

/// Scratch directory the `temporary` archive is built from.
const STAGING_DIR: &str = "/tmp/output";

/// Script downloading or copying each input into `$INPUT_DIR`.
pub fn fetch_script(inputs: &[InputParam]) -> String {
    let mut script = String::from("set -e\n\nmkdir -p \"$INPUT_DIR\"\n");

    for input in inputs {
        let target = format!("\"$INPUT_DIR\"/{}", shell_quote(input.file_name()));
        let source = shell_quote(input.value.trim());

        script.push('\n');
        script.push_str(&format!("echo Fetching {}\n", shell_quote(input.file_name())));
        match input.kind {
            InputKind::Url => {
                script.push_str(&format!("wget -q -O {} {}\n", target, source));
            }
            InputKind::FileSystem | InputKind::PvcMount => {
                script.push_str(&format!("cp -R {} {}\n", source, target));
            }
        }
    }

    script
}

/// Script gathering `sources` into `$OUTPUT_DIR` for an output policy.
///
/// Returns `None` when the policy publishes nothing from inside the run.
pub fn publish_script(output: OutputPolicy, sources: &[&str]) -> Option<String> {
    let mut script = String::from("set -e\n\nmkdir -p \"$OUTPUT_DIR\"\n\n");
    for source in sources {
        script.push_str(&format!("cp -R {}/. \"$OUTPUT_DIR\"/\n", shell_quote(source)));
    }

    match output {
        OutputPolicy::Pvc => Some(script),
        OutputPolicy::Temporary => {
            script.push_str(&format!(
                "\ncd \"$OUTPUT_DIR\"\nzip -qr {} .\n",
                shell_quote(OUTPUT_ARCHIVE)
            ));
            Some(script)
        }
        OutputPolicy::DataOne => None,
    }
}

/// Container staging the recipe inputs before the first command runs.
pub fn fetch_container(dag: &WorkflowDag, settings: &EngineSettings) -> ContainerTemplate {
    debug!(
        "Fetch stage for '{}': {} inputs into {}",
        dag.recipe_id,
        dag.inputs.len(),
        dag.input_root
    );

    ContainerTemplate {
        name: FETCH_STAGE.to_string(),
        image: settings.image.clone(),
        command: vec!["sh".to_string(), "-c".to_string()],
        args: vec![fetch_script(&dag.inputs)],
        env: vec![EnvBinding::new(INPUT_DIR, &dag.input_root)],
        volume_mounts: vec![VolumeMount::shared(settings)],
        output_archive: None,
    }
}

/// Container publishing the outputs of the final tasks, if the output
/// policy publishes anything.
pub fn publish_container(dag: &WorkflowDag, settings: &EngineSettings) -> Option<ContainerTemplate> {
    let sources: Vec<&str> = dag.final_tasks().into_iter().map(|t| t.output_dir()).collect();
    if sources.is_empty() {
        return None;
    }

    let script = publish_script(dag.output, &sources)?;
    let (output_dir, output_archive) = match dag.output {
        OutputPolicy::Temporary => (STAGING_DIR.to_string(), Some(OUTPUT_ARCHIVE.to_string())),
        _ => (dag.publish_dir.clone(), None),
    };

    debug!(
        "Publish stage for '{}': {} sources, {} output",
        dag.recipe_id,
        sources.len(),
        dag.output
    );

    Some(ContainerTemplate {
        name: PUBLISH_STAGE.to_string(),
        image: settings.image.clone(),
        command: vec!["sh".to_string(), "-c".to_string()],
        args: vec![script],
        env: vec![EnvBinding::new(OUTPUT_DIR, output_dir)],
        volume_mounts: vec![VolumeMount::shared(settings)],
        output_archive,
    })
}
