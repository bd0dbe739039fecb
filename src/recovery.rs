use anyhow::Context;

use crate::dependants::DependantIndex;
use crate::id::JobId;
use crate::job::JobRecord;
use crate::pending::PendingRegistry;
use crate::store::RecordStore;

/// Rebuild the pending registry and dependant index from whatever is
/// persisted in `store`. Performed once at queue construction, before any
/// caller can observe the queue.
///
/// Orphaned jobs (`started_at` set but `finished_at` unset, meaning a
/// worker picked them up before an unclean shutdown) are reset
/// (`started_at` cleared) and re-queued rather than left stranded; see
/// DESIGN.md for why this was chosen over leaving them untouched.
pub(crate) fn recover(
    store: &RecordStore,
    pending_capacity: usize,
) -> anyhow::Result<(PendingRegistry, DependantIndex)> {
    let mut pending = PendingRegistry::new(pending_capacity);
    let mut dependants = DependantIndex::new();

    let ids = store.list().context("list persisted jobs during recovery")?;
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        let record = store
            .read(id)
            .with_context(|| format!("read job {id} during recovery"))?
            .with_context(|| format!("job {id} listed but missing on read during recovery"))?;
        records.push(record);
    }

    for record in &mut records {
        if record.is_running() {
            tracing::warn!(
                job_id = %record.id,
                job_type = %record.job_type,
                "recovering orphaned job that was started but never finished; re-queuing"
            );
            record.started_at = None;
            store
                .write(record)
                .with_context(|| format!("reset orphaned job {} during recovery", record.id))?;
        }
    }

    for record in &records {
        if record.finished_at.is_some() || record.started_at.is_some() {
            continue;
        }

        let finished_count = dependency_finished_count(&records, &record.dependencies);
        if finished_count == record.dependencies.len() {
            pending.push(&record.job_type, record.id);
        } else {
            for dep in &record.dependencies {
                let dep_finished = records
                    .iter()
                    .find(|r| r.id == *dep)
                    .map(JobRecord::is_finished)
                    .unwrap_or_else(|| {
                        tracing::warn!(
                            dependency = %dep,
                            dependant = %record.id,
                            "dependency missing from store during recovery; treating as finished"
                        );
                        true
                    });
                if !dep_finished {
                    dependants.register(*dep, record.id);
                }
            }
        }
    }

    Ok((pending, dependants))
}

fn dependency_finished_count(records: &[JobRecord], deps: &[JobId]) -> usize {
    deps.iter()
        .filter(|dep| {
            records
                .iter()
                .find(|r| r.id == **dep)
                .map(JobRecord::is_finished)
                .unwrap_or(true)
        })
        .count()
}
