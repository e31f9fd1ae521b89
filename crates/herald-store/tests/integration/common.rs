use herald_core::models::{BuildSnapshot, JobResultRecord};
use herald_store::FileStoreFactory;
use tempfile::TempDir;

/// Factory rooted in a fresh temporary directory.
///
/// The `TempDir` must be kept in scope for the test duration.
pub fn setup_factory() -> (FileStoreFactory, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (FileStoreFactory::new(dir.path()), dir)
}

pub fn fired_record(watch_id: &str, number: u64) -> JobResultRecord {
    let mut record = JobResultRecord::new(watch_id);
    record.uid = format!("uid_{watch_id}");
    record.checked_number = number;
    record.triggered_number = Some(number);
    record.build = Some(BuildSnapshot {
        number,
        url: format!("http://ci/job/app/{number}/"),
        result: Some("SUCCESS".into()),
        ..BuildSnapshot::default()
    });
    record
}
