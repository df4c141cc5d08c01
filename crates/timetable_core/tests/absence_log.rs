use timetable_core::store::{layout, DocumentStore};
use timetable_core::{
    AbsenceLogQuery, AbsenceRequest, AbsenceService, CoreConfig, InMemoryDocumentStore,
    SemesterService, ServiceError, SqliteDocumentStore, StudentService,
};

fn request(semester_id: &str, name: &str, subject: &str, date: &str) -> AbsenceRequest {
    AbsenceRequest {
        semester_id: semester_id.to_string(),
        full_name: name.to_string(),
        group_id: "758_ITS".to_string(),
        subject: subject.to_string(),
        date: date.to_string(),
    }
}

#[test]
fn recording_writes_student_record_and_log_entry() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let semester_id = SemesterService::new(&store, &config)
        .create_semester("2024 Spring")
        .unwrap();
    let absences = AbsenceService::new(&store, &config);

    let receipt = absences
        .record_absence(&request(&semester_id, "Aysel Quliyeva", "Math", "2024-03-04"))
        .unwrap();

    let records = absences
        .list_student_absences(&receipt.student_id, &semester_id)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, receipt.record_id);
    assert_eq!(records[0].subject, "Math");
    assert_eq!(records[0].date, "2024-03-04");
    assert_eq!(records[0].timestamp, receipt.timestamp);

    let log = absences.list_absence_log(&AbsenceLogQuery::default()).unwrap();
    assert_eq!(log.len(), 1);
    let entry = &log[0];
    assert_eq!(entry.id, receipt.log_id);
    assert_eq!(entry.student_id, receipt.student_id);
    assert_eq!(entry.student_name, "Aysel Quliyeva");
    assert_eq!(entry.semester_id.as_deref(), Some(semester_id.as_str()));
    assert_eq!(entry.timestamp, receipt.timestamp);
    assert!(!entry.migrated);
}

#[test]
fn repeated_absences_reuse_the_resolved_student() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let absences = AbsenceService::new(&store, &config);

    let first = absences
        .record_absence(&request("s1", "Murad Aliyev", "Math", "2024-03-04"))
        .unwrap();
    let second = absences
        .record_absence(&request("s1", "Murad Aliyev", "Physics", "2024-03-05"))
        .unwrap();

    assert_eq!(first.student_id, second.student_id);
    assert_eq!(
        StudentService::new(&store, &config)
            .list_students("758_ITS")
            .unwrap()
            .len(),
        1
    );
    let records = absences
        .list_student_absences(&first.student_id, "s1")
        .unwrap();
    let subjects: Vec<&str> = records.iter().map(|record| record.subject.as_str()).collect();
    assert_eq!(subjects, ["Math", "Physics"]);
}

#[test]
fn deleting_log_entry_keeps_student_record() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let absences = AbsenceService::new(&store, &config);

    let receipt = absences
        .record_absence(&request("s1", "Leyla Hasanova", "Math", "2024-03-04"))
        .unwrap();
    absences.delete_absence_log(&receipt.log_id).unwrap();

    assert!(absences
        .list_absence_log(&AbsenceLogQuery::default())
        .unwrap()
        .is_empty());
    assert_eq!(
        absences
            .list_student_absences(&receipt.student_id, "s1")
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn deleting_unknown_log_entry_succeeds() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let absences = AbsenceService::new(&store, &config);

    absences.delete_absence_log("does-not-exist").unwrap();
    assert!(store
        .get(&layout::absence_log_entry("does-not-exist").unwrap())
        .unwrap()
        .is_none());
}

#[test]
fn log_is_newest_first_and_filterable() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let absences = AbsenceService::new(&store, &config);

    absences
        .record_absence(&request("s1", "Aysel", "Math", "2024-03-04"))
        .unwrap();
    let murad = absences
        .record_absence(&request("s1", "Murad", "Physics", "2024-03-05"))
        .unwrap();
    let latest = absences
        .record_absence(&request("s2", "Aysel", "History", "2024-09-10"))
        .unwrap();

    let all = absences.list_absence_log(&AbsenceLogQuery::default()).unwrap();
    let subjects: Vec<&str> = all.iter().map(|entry| entry.subject.as_str()).collect();
    assert_eq!(subjects, ["History", "Physics", "Math"]);

    let first_semester = absences
        .list_absence_log(&AbsenceLogQuery {
            semester_id: Some("s1".to_string()),
            ..AbsenceLogQuery::default()
        })
        .unwrap();
    assert_eq!(first_semester.len(), 2);

    let by_student = absences
        .list_absence_log(&AbsenceLogQuery {
            student_id: Some(murad.student_id.clone()),
            ..AbsenceLogQuery::default()
        })
        .unwrap();
    assert_eq!(by_student.len(), 1);
    assert_eq!(by_student[0].id, murad.log_id);

    let newest = absences
        .list_absence_log(&AbsenceLogQuery {
            limit: Some(1),
            ..AbsenceLogQuery::default()
        })
        .unwrap();
    assert_eq!(newest[0].id, latest.log_id);
}

#[test]
fn blank_fields_are_rejected_before_any_write() {
    let store = InMemoryDocumentStore::new();
    let config = CoreConfig::default();
    let absences = AbsenceService::new(&store, &config);

    for bad in [
        request("s1", "Aysel", "", "2024-03-04"),
        request("s1", "Aysel", "Math", " "),
        request("", "Aysel", "Math", "2024-03-04"),
        request("s1", "", "Math", "2024-03-04"),
    ] {
        let err = absences.record_absence(&bad).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)), "{err}");
    }
    assert_eq!(store.collection_len(&layout::students().unwrap()).unwrap(), 0);
    assert_eq!(store.collection_len(&layout::absence_log().unwrap()).unwrap(), 0);
}

#[test]
fn absence_flow_on_sqlite_store() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let config = CoreConfig::default();
    let absences = AbsenceService::new(&store, &config);

    let receipt = absences
        .record_absence(&request("s1", "Aysel Quliyeva", "Math", "2024-03-04"))
        .unwrap();
    let filtered = absences
        .list_absence_log(&AbsenceLogQuery {
            semester_id: Some("s1".to_string()),
            ..AbsenceLogQuery::default()
        })
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].student_id, receipt.student_id);

    absences.delete_absence_log(&receipt.log_id).unwrap();
    assert!(absences
        .list_absence_log(&AbsenceLogQuery::default())
        .unwrap()
        .is_empty());
}
