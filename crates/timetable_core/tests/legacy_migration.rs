use serde_json::json;
use timetable_core::store::{layout, DocumentStore, Fields};
use timetable_core::{
    AbsenceLogQuery, AbsenceService, CoreConfig, InMemoryDocumentStore, MigrationLogIds,
    MigrationService, SqliteDocumentStore, StudentService,
};

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn seed_legacy(store: &dyn DocumentStore, config: &CoreConfig) {
    let legacy = layout::legacy_absences(&config.legacy_collection).unwrap();
    for record in [
        json!({"usaqAdi": "Aysel Quliyeva", "fenn": "Math", "tarix": "2023-10-01", "timestamp": 1_696_118_400_000_i64}),
        json!({"fenn": "Physics", "tarix": "2023-10-02"}),
        json!({"usaqAdi": "Murad Aliyev", "tarix": "2023-10-03"}),
    ] {
        store.add(&legacy, fields(record)).unwrap();
    }
}

#[test]
fn migration_skips_nameless_records_and_fills_unknowns() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    seed_legacy(&store, &config);

    let migrated = MigrationService::new(&store, &config)
        .migrate_old_absences()
        .unwrap();
    assert_eq!(migrated, 2);

    let log = AbsenceService::new(&store, &config)
        .list_absence_log(&AbsenceLogQuery::default())
        .unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|entry| entry.migrated));
    assert!(log.iter().all(|entry| entry.semester_id.is_none()));

    let aysel = log
        .iter()
        .find(|entry| entry.student_name == "Aysel Quliyeva")
        .unwrap();
    assert_eq!(aysel.subject, "Math");
    assert_eq!(aysel.date, "2023-10-01");
    assert_eq!(aysel.timestamp, 1_696_118_400_000);

    let murad = log
        .iter()
        .find(|entry| entry.student_name == "Murad Aliyev")
        .unwrap();
    assert_eq!(murad.subject, "Unknown");
    assert_eq!(murad.date, "2023-10-03");
    assert!(murad.timestamp > aysel.timestamp);

    let raw = store
        .get(&layout::absence_log_entry(&murad.id).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(raw.fields["migrated"], json!(true));
    assert!(raw.fields.get("usaqAdi").is_none());
}

#[test]
fn migrated_students_land_in_default_group() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    seed_legacy(&store, &config);

    MigrationService::new(&store, &config)
        .migrate_old_absences()
        .unwrap();

    let students = StudentService::new(&store, &config);
    let roster = students.list_students(&config.default_group.id).unwrap();
    assert_eq!(roster.len(), 2);

    let log = AbsenceService::new(&store, &config)
        .list_absence_log(&AbsenceLogQuery::default())
        .unwrap();
    for entry in &log {
        let student = students.get_student(&entry.student_id).unwrap().unwrap();
        assert_eq!(student.full_name, entry.student_name);
    }
}

#[test]
fn rerunning_generated_ids_duplicates_log_but_not_students() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    seed_legacy(&store, &config);
    let migration = MigrationService::new(&store, &config);

    assert_eq!(migration.migrate_old_absences().unwrap(), 2);
    assert_eq!(migration.migrate_old_absences().unwrap(), 2);

    assert_eq!(store.collection_len(&layout::absence_log().unwrap()).unwrap(), 4);
    assert_eq!(store.collection_len(&layout::students().unwrap()).unwrap(), 2);
}

#[test]
fn legacy_derived_ids_make_reruns_idempotent() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig {
        migration_log_ids: MigrationLogIds::FromLegacyId,
        ..CoreConfig::default()
    };
    seed_legacy(&store, &config);
    let migration = MigrationService::new(&store, &config);

    migration.migrate_old_absences().unwrap();
    migration.migrate_old_absences().unwrap();

    let log = AbsenceService::new(&store, &config)
        .list_absence_log(&AbsenceLogQuery::default())
        .unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|entry| entry.id.starts_with("legacy_")));
}

#[test]
fn legacy_collection_is_read_only_and_remapped_on_read() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    seed_legacy(&store, &config);
    let legacy_collection = layout::legacy_absences(&config.legacy_collection).unwrap();
    let before = store
        .query(&legacy_collection, &Default::default())
        .unwrap();

    let migration = MigrationService::new(&store, &config);
    migration.migrate_old_absences().unwrap();

    let after = store
        .query(&legacy_collection, &Default::default())
        .unwrap();
    assert_eq!(before, after);

    let listed = migration.list_legacy_absences().unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].student_name.as_deref(), Some("Aysel Quliyeva"));
    assert_eq!(listed[0].subject.as_deref(), Some("Math"));
    assert!(listed[1].student_name.is_none());
    assert_eq!(listed[2].subject_or_unknown(), "Unknown");
}

#[test]
fn float_legacy_timestamp_is_preserved() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let legacy = layout::legacy_absences(&config.legacy_collection).unwrap();
    store
        .add(
            &legacy,
            fields(json!({"usaqAdi": "Aysel Quliyeva", "fenn": "Math", "timestamp": 1_696_118_400_000.0})),
        )
        .unwrap();

    MigrationService::new(&store, &config)
        .migrate_old_absences()
        .unwrap();

    let log = AbsenceService::new(&store, &config)
        .list_absence_log(&AbsenceLogQuery::default())
        .unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].timestamp, 1_696_118_400_000);
    assert_eq!(log[0].date, "Unknown");
}

#[test]
fn migration_reuses_existing_student_with_untrimmed_name() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let existing = store
        .add(
            &layout::students().unwrap(),
            fields(json!({"fullName": "Ali ", "groupId": "758_ITS", "createdAt": 1})),
        )
        .unwrap();
    store
        .add(
            &layout::legacy_absences(&config.legacy_collection).unwrap(),
            fields(json!({"usaqAdi": "Ali ", "fenn": "Math", "tarix": "2023-10-01"})),
        )
        .unwrap();

    MigrationService::new(&store, &config)
        .migrate_old_absences()
        .unwrap();

    assert_eq!(store.collection_len(&layout::students().unwrap()).unwrap(), 1);
    let log = AbsenceService::new(&store, &config)
        .list_absence_log(&AbsenceLogQuery::default())
        .unwrap();
    assert_eq!(log[0].student_id, existing.id());
    assert_eq!(log[0].student_name, "Ali ");
}

#[test]
fn empty_legacy_collection_migrates_nothing() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    assert_eq!(
        MigrationService::new(&store, &config)
            .migrate_old_absences()
            .unwrap(),
        0
    );
}

#[test]
fn migration_and_student_fan_out_on_sqlite_store() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let config = CoreConfig::default();
    seed_legacy(&store, &config);
    let migration = MigrationService::new(&store, &config);

    assert_eq!(migration.migrate_old_absences().unwrap(), 2);
    assert_eq!(
        migration
            .migrate_students(["Aysel Quliyeva", "Nigar Rzayeva"], "758_ITS")
            .unwrap(),
        2
    );
    assert_eq!(
        StudentService::new(&store, &config)
            .list_students("758_ITS")
            .unwrap()
            .len(),
        3
    );
}
