use serde_json::json;
use timetable_core::store::{layout, DocumentStore, Fields, SetMode};
use timetable_core::{
    CoreConfig, InMemoryDocumentStore, ScheduleService, SemesterService, SemesterStatus,
    ServiceError, SqliteDocumentStore, WeekType,
};

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

#[test]
fn no_semester_and_no_pointer_means_no_active_semester() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let semesters = SemesterService::new(&store, &config);

    assert!(semesters.get_active_semester().unwrap().is_none());
    assert!(semesters.get_archived_semesters().unwrap().is_empty());
}

#[test]
fn creating_second_semester_archives_first() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let semesters = SemesterService::new(&store, &config);

    let first = semesters.create_semester("2023 Fall").unwrap();
    let second = semesters.create_semester("2024 Spring").unwrap();

    let active = semesters.get_active_semester().unwrap().unwrap();
    assert_eq!(active.id, second);
    assert_eq!(active.name, "2024 Spring");
    assert!(active.is_active());

    let archived = semesters.get_archived_semesters().unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].id, first);
    assert_eq!(archived[0].status, SemesterStatus::Archived);

    let pointer = store.get(&layout::config().unwrap()).unwrap().unwrap();
    assert_eq!(pointer.fields["activeSemesterId"], json!(second));
}

#[test]
fn new_semester_seeds_default_group_with_empty_shell() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let semester_id = SemesterService::new(&store, &config)
        .create_semester("2024 Spring")
        .unwrap();

    let raw = store
        .get(&layout::group(&semester_id, "758_ITS").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(raw.fields["schedule"], json!({"alt": {}, "ust": {}}));
    assert_eq!(raw.fields["subjects"], json!([]));

    let group = ScheduleService::new(&store)
        .get_group(&semester_id, "758_ITS")
        .unwrap()
        .unwrap();
    assert_eq!(group.id, "758_ITS");
    assert_eq!(group.name, config.default_group.name);
    assert_eq!(group.course, 1);
    assert!(group.schedule.lessons(WeekType::Alt, 0).is_empty());
}

#[test]
fn stale_pointer_does_not_block_creation() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let semesters = SemesterService::new(&store, &config);

    let doomed = semesters.create_semester("2023 Fall").unwrap();
    store.delete(&layout::semester(&doomed).unwrap()).unwrap();

    let next = semesters.create_semester("2024 Spring").unwrap();

    assert_eq!(semesters.get_active_semester().unwrap().unwrap().id, next);
    assert!(semesters.get_archived_semesters().unwrap().is_empty());
    assert!(semesters.get_semester(&doomed).unwrap().is_none());
}

#[test]
fn pointer_write_preserves_other_config_fields() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    store
        .set(
            &layout::config().unwrap(),
            fields(json!({"institution": "ADNSU"})),
            SetMode::Overwrite,
        )
        .unwrap();

    let semester_id = SemesterService::new(&store, &config)
        .create_semester("2024 Spring")
        .unwrap();

    let pointer = store.get(&layout::config().unwrap()).unwrap().unwrap();
    assert_eq!(pointer.fields["institution"], json!("ADNSU"));
    assert_eq!(pointer.fields["activeSemesterId"], json!(semester_id));
}

#[test]
fn missing_pointer_falls_back_to_status_scan() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let semesters = SemesterService::new(&store, &config);

    let semester_id = semesters.create_semester("2024 Spring").unwrap();
    store.delete(&layout::config().unwrap()).unwrap();

    let active = semesters.get_active_semester().unwrap().unwrap();
    assert_eq!(active.id, semester_id);
}

#[test]
fn dangling_pointer_falls_back_to_status_scan() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let semesters = SemesterService::new(&store, &config);

    let semester_id = semesters.create_semester("2024 Spring").unwrap();
    store
        .set(
            &layout::config().unwrap(),
            fields(json!({"activeSemesterId": "ghost"})),
            SetMode::Merge,
        )
        .unwrap();

    let active = semesters.get_active_semester().unwrap().unwrap();
    assert_eq!(active.id, semester_id);
}

#[test]
fn failed_archive_leaves_detectable_double_active_state() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let semesters = SemesterService::new(&store, &config);

    let first = semesters.create_semester("2023 Fall").unwrap();
    // Pointer lost its link to `first`, so the archive step targets a ghost.
    store
        .set(
            &layout::config().unwrap(),
            fields(json!({"activeSemesterId": "ghost"})),
            SetMode::Overwrite,
        )
        .unwrap();
    let second = semesters.create_semester("2024 Spring").unwrap();

    assert_eq!(semesters.get_active_semester().unwrap().unwrap().id, second);
    let candidates: Vec<String> = semesters
        .active_semester_candidates()
        .unwrap()
        .into_iter()
        .map(|semester| semester.id)
        .collect();
    assert_eq!(candidates, [first, second]);
}

#[test]
fn blank_semester_name_is_rejected() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let err = SemesterService::new(&store, &config)
        .create_semester("   ")
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
    assert!(store.get(&layout::config().unwrap()).unwrap().is_none());
}

#[test]
fn lifecycle_works_on_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteDocumentStore::open(dir.path().join("timetable.db")).unwrap();
    let config = CoreConfig::default();
    let semesters = SemesterService::new(&store, &config);

    let first = semesters.create_semester("2023 Fall").unwrap();
    let second = semesters.create_semester("2024 Spring").unwrap();
    let third = semesters.create_semester("2024 Fall").unwrap();

    assert_eq!(semesters.get_active_semester().unwrap().unwrap().id, third);
    let archived: Vec<String> = semesters
        .get_archived_semesters()
        .unwrap()
        .into_iter()
        .map(|semester| semester.id)
        .collect();
    assert_eq!(archived, [first, second]);
    assert_eq!(semesters.active_semester_candidates().unwrap().len(), 1);
}
