use crate::errors::TaskFileError;
use crate::types::LabelTask;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Load the phrase → definition mapping from a two-column CSV file.
///
/// Every row with at least two columns is a task; both values are trimmed.
/// A repeated phrase replaces the earlier definition but keeps its position.
pub fn load_tasks<P: AsRef<Path>>(path: P) -> Result<Vec<LabelTask>, TaskFileError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let tasks = read_tasks(reader)?;
    if tasks.is_empty() {
        return Err(TaskFileError::Empty(path.to_path_buf()));
    }

    debug!("Loaded {} tasks from {}", tasks.len(), path.display());
    Ok(tasks)
}

pub fn read_tasks<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<LabelTask>, TaskFileError> {
    let mut tasks: Vec<LabelTask> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in reader.records() {
        let row = row?;
        let (Some(phrase), Some(definition)) = (row.get(0), row.get(1)) else {
            continue;
        };

        let phrase = phrase.trim_start_matches('\u{feff}').trim();
        if phrase.is_empty() {
            warn!("Skipping CSV row with an empty phrase");
            continue;
        }

        let task = LabelTask::new(phrase, definition.trim());
        match positions.get(phrase) {
            Some(&index) => tasks[index] = task,
            None => {
                positions.insert(phrase.to_string(), tasks.len());
                tasks.push(task);
            }
        }
    }

    Ok(tasks)
}
