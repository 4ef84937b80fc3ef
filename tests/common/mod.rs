//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use recipeflow::error::{EngineError, SubmissionError};
use recipeflow::execution::{SubmissionRequest, WorkflowEngine, WorkflowStatus};
use tempfile::TempDir;

/// In-memory engine. Every run walks through the same status script, one
/// step per status query, then stays on the last status.
pub struct MemoryEngine {
    script: Vec<WorkflowStatus>,
    runs: Mutex<HashMap<String, usize>>,
    submissions: Mutex<Vec<SubmissionRequest>>,
    reject: Option<u16>,
}

impl MemoryEngine {
    pub fn new(script: &[WorkflowStatus]) -> Self {
        Self {
            script: script.to_vec(),
            runs: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            reject: None,
        }
    }

    /// Engine answering every submission with the given HTTP status.
    pub fn rejecting(status: u16) -> Self {
        Self {
            reject: Some(status),
            ..Self::new(&[])
        }
    }

    pub fn submissions(&self) -> Vec<SubmissionRequest> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn run_names(&self) -> Vec<String> {
        self.runs.lock().unwrap().keys().cloned().collect()
    }
}

impl WorkflowEngine for MemoryEngine {
    fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmissionError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request.clone());

        if let Some(status) = self.reject {
            return Err(SubmissionError::Rejected {
                status,
                message: "admission webhook denied the request".to_string(),
            });
        }

        let name = format!("{}{:05}", request.generate_name, submissions.len());
        self.runs.lock().unwrap().insert(name.clone(), 0);
        Ok(name)
    }

    fn status(&self, workflow_name: &str) -> Result<WorkflowStatus, EngineError> {
        let mut runs = self.runs.lock().unwrap();
        let polls = runs
            .get_mut(workflow_name)
            .ok_or_else(|| EngineError::NotFound(workflow_name.to_string()))?;

        let index = (*polls).min(self.script.len().saturating_sub(1));
        *polls += 1;
        Ok(self.script.get(index).copied().unwrap_or_default())
    }

    fn delete(&self, workflow_name: &str) -> Result<(), EngineError> {
        self.runs
            .lock()
            .unwrap()
            .remove(workflow_name)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(workflow_name.to_string()))
    }
}

/// Writes a recipe directory with `meta.yml` and `recipe.sh`.
pub fn recipe_dir(meta: &str, script: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("meta.yml"), meta).unwrap();
    fs::write(dir.path().join("recipe.sh"), script).unwrap();
    dir
}
