//! Parse many exports at once. Each file is still parsed on one thread;
//! parallelism is across files only.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::info;

use crate::error::IngestError;
use crate::ingest::{read_battle_log, CombatTable};
use crate::parallel::WorkerPool;

/// Parse every path on `pool`. Results line up with `paths` by index.
pub fn parse_files(paths: &[PathBuf], pool: &WorkerPool) -> Vec<Result<CombatTable, IngestError>> {
    let results: Vec<_> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| read_battle_log(path))
            .collect()
    });
    let failed = results.iter().filter(|result| result.is_err()).count();
    info!(files = paths.len(), failed, workers = pool.workers, "batch parse finished");
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_fail_individually_in_input_order() {
        let dir = std::env::temp_dir();
        let present = dir.join(format!("battlelog-batch-{}.tsv", std::process::id()));
        std::fs::write(&present, "Reward Name\tCount\nLatinum\t12\n").expect("write fixture");
        let missing = dir.join("battlelog-batch-does-not-exist.tsv");

        let paths = vec![missing.clone(), present.clone(), missing];
        let results = parse_files(&paths, &WorkerPool::with_workers(2));
        std::fs::remove_file(&present).ok();

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Err(IngestError::Io { .. })));
        let parsed = results[1].as_ref().expect("fixture parses");
        assert_eq!(parsed.loot().number(0, "Count"), Some(12.0));
        assert!(results[2].is_err());
    }
}
