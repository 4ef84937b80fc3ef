//! Argo Workflows Backend
//!
//! Renders submission requests as Argo `Workflow` manifests and talks to
//! the Argo Server REST API:
//! - `POST   /api/v1/workflows/{namespace}` creates a run
//! - `GET    /api/v1/workflows/{namespace}/{name}` reads its phase
//! - `DELETE /api/v1/workflows/{namespace}/{name}` removes it

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::engine::{SubmissionRequest, WorkflowEngine};
use super::stage::{fetch_container, publish_container, FETCH_STAGE, PUBLISH_STAGE};
use super::status::WorkflowStatus;
use super::step::ContainerTemplate;
use crate::config::EngineSettings;
use crate::error::{EngineError, SubmissionError};

pub const API_VERSION: &str = "argoproj.io/v1alpha1";

/// Steps template every run starts from: fetch, command DAG, publish.
pub const ENTRYPOINT: &str = "pipeline";

/// Name of the DAG template holding the recipe commands.
pub const DAG_TEMPLATE: &str = "main";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn container_template(container: &ContainerTemplate) -> Value {
    let env: Vec<Value> = container
        .env
        .iter()
        .map(|b| json!({ "name": b.name, "value": b.value }))
        .collect();
    let mounts: Vec<Value> = container
        .volume_mounts
        .iter()
        .map(|m| json!({ "name": m.name, "mountPath": m.mount_path }))
        .collect();

    let mut template = json!({
        "name": container.name,
        "container": {
            "image": container.image,
            "command": container.command,
            "args": container.args,
            "env": env,
            "volumeMounts": mounts,
        },
    });

    if let Some(path) = &container.output_archive {
        template["outputs"] = json!({
            "artifacts": [{ "name": "output", "path": path, "archive": { "none": {} } }],
        });
    }

    template
}

/// Renders the Argo `Workflow` manifest for a submission.
///
/// The entrypoint runs `fetch-inputs`, then the command DAG, then
/// `publish-output` when the output policy publishes anything.
pub fn render_manifest(request: &SubmissionRequest, settings: &EngineSettings) -> Value {
    let dag = &request.dag;

    let tasks: Vec<Value> = dag
        .nodes
        .iter()
        .map(|node| {
            let mut task = json!({
                "name": node.name,
                "template": node.name,
            });
            let dependencies = dag.dependencies_of(&node.name);
            if !dependencies.is_empty() {
                task["dependencies"] = json!(dependencies);
            }
            task
        })
        .collect();

    let publish = publish_container(dag, settings);

    let mut steps = vec![
        json!([{ "name": FETCH_STAGE, "template": FETCH_STAGE }]),
        json!([{ "name": "run-commands", "template": DAG_TEMPLATE }]),
    ];
    if publish.is_some() {
        steps.push(json!([{ "name": PUBLISH_STAGE, "template": PUBLISH_STAGE }]));
    }

    let mut templates = vec![
        json!({ "name": ENTRYPOINT, "steps": steps }),
        json!({ "name": DAG_TEMPLATE, "dag": { "tasks": tasks } }),
        container_template(&fetch_container(dag, settings)),
    ];
    templates.extend(dag.nodes.iter().map(|node| container_template(&node.container(settings))));
    if let Some(publish) = &publish {
        templates.push(container_template(publish));
    }

    let mut spec = json!({
        "entrypoint": ENTRYPOINT,
        "serviceAccountName": settings.service_account,
        "ttlStrategy": {
            "secondsAfterSuccess": request.ttl_after_success.as_secs(),
        },
        "volumes": [{
            "name": settings.volume_claim,
            "persistentVolumeClaim": { "claimName": settings.volume_claim },
        }],
        "templates": templates,
    });

    if let Some(parallelism) = request.parallelism {
        spec["parallelism"] = json!(parallelism);
    }

    json!({
        "apiVersion": API_VERSION,
        "kind": "Workflow",
        "metadata": {
            "generateName": request.generate_name,
            "namespace": settings.namespace,
            "labels": request.labels,
        },
        "spec": spec,
    })
}

/// Argo Server client.
///
/// # Example
///
/// ```rust,no_run
/// use recipeflow::config::EngineSettings;
/// use recipeflow::execution::argo::ArgoEngine;
/// use recipeflow::execution::WorkflowEngine;
///
/// let engine = ArgoEngine::new(EngineSettings::from_env()).unwrap();
/// let status = engine.status("ice-basins-x7k2p").unwrap();
/// println!("{}", status);
/// ```
pub struct ArgoEngine {
    client: Client,
    settings: EngineSettings,
}

impl ArgoEngine {
    pub fn new(settings: EngineSettings) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        Ok(Self { client, settings })
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/api/v1/workflows/{}",
            self.settings.server_url, self.settings.namespace
        )
    }

    fn workflow_url(&self, name: &str) -> String {
        format!("{}/{}", self.collection_url(), name)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.settings.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Maps a non-success response of a single-run request.
    fn request_error(name: &str, response: Response) -> EngineError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return EngineError::NotFound(name.to_string());
        }
        EngineError::Request {
            status: status.as_u16(),
            message: response.text().unwrap_or_default(),
        }
    }
}

impl WorkflowEngine for ArgoEngine {
    fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmissionError> {
        let manifest = render_manifest(request, &self.settings);
        let url = self.collection_url();
        debug!("POST {}", url);

        let response = self
            .authorize(self.client.post(&url))
            .json(&json!({ "workflow": manifest }))
            .send()
            .map_err(|e| SubmissionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            warn!("Argo rejected workflow '{}': {}", request.generate_name, message);
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))?;

        let name = body["metadata"]["name"]
            .as_str()
            .ok_or_else(|| {
                SubmissionError::InvalidResponse("missing metadata.name".to_string())
            })?
            .to_string();

        info!("Argo created workflow '{}'", name);
        Ok(name)
    }

    fn status(&self, workflow_name: &str) -> Result<WorkflowStatus, EngineError> {
        let url = self.workflow_url(workflow_name);
        debug!("GET {}", url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::request_error(workflow_name, response));
        }

        let body: Value = response
            .json()
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let phase = body["status"]["phase"].as_str().unwrap_or_default();
        Ok(WorkflowStatus::from_phase(phase))
    }

    fn delete(&self, workflow_name: &str) -> Result<(), EngineError> {
        let url = self.workflow_url(workflow_name);
        debug!("DELETE {}", url);

        let response = self
            .authorize(self.client.delete(&url))
            .send()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::request_error(workflow_name, response));
        }

        info!("Argo deleted workflow '{}'", workflow_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::retention::{RetentionPolicy, LABEL_ARCHIVE_STRATEGY, LABEL_PERSIST};
    use crate::workflow::compiler::DagCompiler;
    use crate::workflow::model::{InputParam, OutputPolicy, ParallelConfig, RecipeDescription};

    fn parallel_request() -> SubmissionRequest {
        let recipe = RecipeDescription::new(
            "basins",
            vec![
                "cp $INPUT_FILE $OUTPUT_FILE".to_string(),
                "gzip $INPUT_FILE".to_string(),
            ],
        )
        .with_inputs(vec![
            InputParam::url("https://example.com/a.tif"),
            InputParam::url("https://example.com/b.tif"),
            InputParam::url("https://example.com/c.tif"),
        ])
        .with_parallel(ParallelConfig::files(2).with_max_parallelism(3));

        let dag = DagCompiler::new().compile(&recipe).unwrap();
        SubmissionRequest::new(&dag, RetentionPolicy::new(OutputPolicy::Temporary))
    }

    #[test]
    fn test_manifest_metadata() {
        let settings = EngineSettings::default();
        let manifest = render_manifest(&parallel_request(), &settings);

        assert_eq!(manifest["apiVersion"], API_VERSION);
        assert_eq!(manifest["kind"], "Workflow");
        assert_eq!(manifest["metadata"]["generateName"], "basins-");
        assert_eq!(manifest["metadata"]["namespace"], "argo-helm");
        assert_eq!(manifest["metadata"]["labels"][LABEL_PERSIST], "false");
        assert_eq!(manifest["metadata"]["labels"][LABEL_ARCHIVE_STRATEGY], "false");
    }

    #[test]
    fn test_manifest_spec() {
        let settings = EngineSettings::default();
        let manifest = render_manifest(&parallel_request(), &settings);
        let spec = &manifest["spec"];

        assert_eq!(spec["entrypoint"], ENTRYPOINT);
        assert_eq!(spec["serviceAccountName"], "argo-workflow");
        assert_eq!(spec["parallelism"], 3);
        assert_eq!(spec["ttlStrategy"]["secondsAfterSuccess"], 7 * 86_400);
        assert_eq!(
            spec["volumes"][0]["persistentVolumeClaim"]["claimName"],
            settings.volume_claim
        );
    }

    fn template<'a>(manifest: &'a Value, name: &str) -> &'a Value {
        manifest["spec"]["templates"]
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["name"] == name)
            .unwrap()
    }

    fn stage_names(manifest: &Value) -> Vec<String> {
        template(manifest, ENTRYPOINT)["steps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|group| group[0]["template"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_manifest_keeps_every_node_and_edge() {
        let request = parallel_request();
        let manifest = render_manifest(&request, &EngineSettings::default());
        let templates = manifest["spec"]["templates"].as_array().unwrap();

        // steps entrypoint, command DAG, fetch, one container per task, publish
        assert_eq!(templates.len(), request.dag.node_count() + 4);

        let tasks = template(&manifest, DAG_TEMPLATE)["dag"]["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 4);

        let edge_count: usize = tasks
            .iter()
            .filter_map(|t| t["dependencies"].as_array())
            .map(|d| d.len())
            .sum();
        assert_eq!(edge_count, request.dag.edge_count());

        let consumer = tasks
            .iter()
            .find(|t| t["name"] == "cmd-1-partition-1")
            .unwrap();
        assert_eq!(consumer["dependencies"], json!(["cmd-0-partition-1"]));
    }

    #[test]
    fn test_container_template() {
        let settings = EngineSettings::default();
        let manifest = render_manifest(&parallel_request(), &settings);
        let container = &template(&manifest, "cmd-0-partition-0")["container"];

        assert_eq!(container["image"], settings.image);
        assert_eq!(container["command"], json!(["sh", "-c"]));
        assert!(container["args"][0].as_str().unwrap().starts_with("set -e"));
        assert_eq!(container["env"][0]["name"], "INPUT_DIR");
        assert_eq!(container["env"][0]["value"], "/mnt/workflow/basins/inputs");
        assert_eq!(container["volumeMounts"][0]["mountPath"], "/mnt/workflow");
    }

    #[test]
    fn test_serial_manifest_has_no_parallelism() {
        let recipe = RecipeDescription::new("r", vec!["echo".to_string()]);
        let dag = DagCompiler::new().compile(&recipe).unwrap();
        let request = SubmissionRequest::new(&dag, RetentionPolicy::default());
        let manifest = render_manifest(&request, &EngineSettings::default());

        assert!(manifest["spec"].get("parallelism").is_none());
        assert_eq!(manifest["spec"]["ttlStrategy"]["secondsAfterSuccess"], 86_400);
    }

    #[test]
    fn test_serial_manifest_fetches_inputs_and_publishes_to_pvc() {
        let recipe = RecipeDescription::new(
            "coast",
            vec!["ogr2ogr $OUTPUT_DIR/coast.shp $INPUT_DIR/coast.gpkg".to_string()],
        )
        .with_inputs(vec![
            InputParam::url("https://example.com/coast.gpkg"),
            InputParam::file("/srv/shared/mask.tif"),
        ]);
        let dag = DagCompiler::new().compile(&recipe).unwrap();
        let request = SubmissionRequest::new(&dag, RetentionPolicy::for_recipe(&recipe));
        let manifest = render_manifest(&request, &EngineSettings::default());

        assert_eq!(manifest["spec"]["entrypoint"], ENTRYPOINT);
        assert_eq!(stage_names(&manifest), vec![FETCH_STAGE, DAG_TEMPLATE, PUBLISH_STAGE]);

        let fetch = &template(&manifest, FETCH_STAGE)["container"];
        assert_eq!(fetch["env"][0]["value"], "/mnt/workflow/coast/inputs");
        let script = fetch["args"][0].as_str().unwrap();
        assert!(script.contains("wget -q -O \"$INPUT_DIR\"/'coast.gpkg' 'https://example.com/coast.gpkg'"));
        assert!(script.contains("cp -R '/srv/shared/mask.tif' \"$INPUT_DIR\"/'mask.tif'"));

        // The first command reads what the fetch stage wrote
        let first = &template(&manifest, "cmd-0")["container"];
        assert_eq!(first["env"][0]["value"], fetch["env"][0]["value"]);

        let publish = template(&manifest, PUBLISH_STAGE);
        assert_eq!(publish["container"]["env"][0]["value"], "/mnt/workflow/coast/output");
        assert!(publish["container"]["args"][0]
            .as_str()
            .unwrap()
            .contains("'/mnt/workflow/coast/cmd-0'/."));
        assert!(publish.get("outputs").is_none());

        // Stages stay out of the command DAG
        let tasks = template(&manifest, DAG_TEMPLATE)["dag"]["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn test_parallel_manifest_archives_temporary_output() {
        let manifest = render_manifest(&parallel_request(), &EngineSettings::default());

        assert_eq!(stage_names(&manifest), vec![FETCH_STAGE, DAG_TEMPLATE, PUBLISH_STAGE]);

        let fetch = template(&manifest, FETCH_STAGE)["container"]["args"][0].as_str().unwrap();
        for name in ["a.tif", "b.tif", "c.tif"] {
            assert!(fetch.contains(&format!("\"$INPUT_DIR\"/'{}' 'https://example.com/{}'", name, name)));
        }

        let publish = template(&manifest, PUBLISH_STAGE);
        let script = publish["container"]["args"][0].as_str().unwrap();
        assert!(script.contains("'/mnt/workflow/basins/cmd-1-partition-0'/."));
        assert!(script.contains("'/mnt/workflow/basins/cmd-1-partition-1'/."));
        assert!(script.contains("zip -qr '/tmp/output.zip' ."));
        assert_eq!(publish["outputs"]["artifacts"][0]["path"], "/tmp/output.zip");
    }

    #[test]
    fn test_dataone_manifest_has_no_publish_stage() {
        let recipe = RecipeDescription::new("r", vec!["echo".to_string()])
            .with_output(OutputPolicy::DataOne);
        let dag = DagCompiler::new().compile(&recipe).unwrap();
        let request = SubmissionRequest::new(&dag, RetentionPolicy::for_recipe(&recipe));
        let manifest = render_manifest(&request, &EngineSettings::default());

        assert_eq!(stage_names(&manifest), vec![FETCH_STAGE, DAG_TEMPLATE]);
        assert!(manifest["spec"]["templates"]
            .as_array()
            .unwrap()
            .iter()
            .all(|t| t["name"] != PUBLISH_STAGE));
    }

    #[test]
    fn test_urls() {
        let mut settings = EngineSettings::default();
        settings.namespace = "ns".to_string();
        let engine = ArgoEngine::new(settings).unwrap();

        assert_eq!(
            engine.workflow_url("wf-1"),
            "http://localhost:2746/api/v1/workflows/ns/wf-1"
        );
    }
}
