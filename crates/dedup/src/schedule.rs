use rayon::prelude::*;

/// Run independent jobs on at most `workers` threads, preserving input order
/// in the results. `workers <= 1` runs inline on the calling thread.
pub fn run_bounded<T, R, F>(jobs: Vec<T>, workers: usize, job: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    if workers <= 1 || jobs.len() <= 1 {
        return jobs.into_iter().map(job).collect();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| jobs.into_par_iter().map(job).collect()),
        Err(e) => {
            log::warn!("cannot start {workers} workers ({e}); running sequentially");
            jobs.into_iter().map(job).collect()
        }
    }
}
