//! Input Partitioning
//!
//! Splits a recipe's ordered input files into independent partitions of a
//! fixed size. Each partition becomes its own branch of the workflow DAG.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// An ordered, disjoint slice of the recipe input files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Position of the partition in the plan (0-based)
    pub id: usize,
    /// File references, in input order
    pub files: Vec<String>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// JSON list of file references, as handed to a step in `PARTITION_MANIFEST`.
pub fn manifest_json(files: &[String]) -> String {
    serde_json::to_string(files).unwrap_or_else(|_| "[]".to_string())
}

/// Groups `files` into partitions of `size` files each.
///
/// The last partition holds the remainder. No files yields no partitions,
/// and a size larger than the file count yields a single partition.
///
/// # Example
/// ```
/// use recipeflow::workflow::partition::plan;
///
/// let files: Vec<String> = (1..=5).map(|i| format!("file{}.tif", i)).collect();
/// let partitions = plan(&files, 2).unwrap();
/// let sizes: Vec<usize> = partitions.iter().map(|p| p.len()).collect();
/// assert_eq!(sizes, vec![2, 2, 1]);
/// ```
pub fn plan(files: &[String], size: usize) -> Result<Vec<Partition>, CompileError> {
    if size == 0 {
        return Err(CompileError::Configuration(
            "partition_size must be a positive integer".to_string(),
        ));
    }

    let partitions: Vec<Partition> = files
        .chunks(size)
        .enumerate()
        .map(|(id, chunk)| Partition {
            id,
            files: chunk.to_vec(),
        })
        .collect();

    for partition in &partitions {
        debug!("Partition {}: {} files", partition.id, partition.len());
    }

    info!(
        "Created {} partitions from {} files (partition_size={})",
        partitions.len(),
        files.len(),
        size
    );

    Ok(partitions)
}

/// Number of partitions `plan` produces for `file_count` files.
pub fn partition_count(file_count: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    file_count.div_ceil(size)
}
