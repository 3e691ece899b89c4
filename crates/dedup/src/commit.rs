use serde_json::Value;

use casework_store::{value_key, RecordStore};

use crate::error::RunIssue;

#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    pub deleted: usize,
    /// Ids from chunks that failed; still present in the store.
    pub retained: Vec<String>,
    pub failures: Vec<RunIssue>,
}

/// Delete confirmed duplicate persons in chunks of `chunk_size`.
///
/// Best effort and sequential: a failed chunk is recorded and the next chunk
/// is still attempted. Chunks already committed stay deleted.
pub fn delete_duplicates<S: RecordStore + ?Sized>(
    store: &S,
    person_table: &str,
    ids: &[Value],
    chunk_size: usize,
) -> CommitOutcome {
    let mut outcome = CommitOutcome::default();

    for chunk in ids.chunks(chunk_size.max(1)) {
        match store.delete_by_ids(person_table, chunk) {
            Ok(n) => {
                log::debug!("deleted {n} row(s) from {person_table}");
                outcome.deleted += n;
            }
            Err(e) => {
                let chunk_ids: Vec<String> = chunk.iter().filter_map(value_key).collect();
                let failure = RunIssue::delete_batch(person_table, chunk_ids.clone(), &e);
                log::warn!("{failure}");
                outcome.retained.extend(chunk_ids);
                outcome.failures.push(failure);
            }
        }
    }

    outcome
}
