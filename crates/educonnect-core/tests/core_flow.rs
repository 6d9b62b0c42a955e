use chrono::{NaiveDate, Utc};
use educonnect_core::forms::{NewGrade, NewStudent};
use educonnect_core::model::{GradeLevel, LetterGrade, Role, Theme};
use educonnect_core::page::{Page, PageRequest, ViewFilter};
use educonnect_core::query::{StudentFilter, compute_gpa, filter_students, grade_distribution};
use educonnect_core::render::render;
use educonnect_core::storage::{FileStore, KeyValueStore};
use educonnect_core::store::{GradeUpsert, StateStore};
use tempfile::tempdir;

#[test]
fn file_backed_store_seeds_mutates_and_reopens() {
    let temp = tempdir().expect("tempdir");
    let port = FileStore::open(temp.path()).expect("open file store");
    let mut store = StateStore::load(port).expect("load store");

    let state = store.state();
    assert_eq!(state.students.len(), 5);
    let alice: Vec<_> = state.grades_for_student(1);
    assert_eq!(alice.len(), 2);
    assert_eq!(state.find_course(alice[0].course_id).expect("course").name, "Mathematics");
    assert_eq!(alice[0].letter_grade, LetterGrade::A);
    assert_eq!(alice[0].score, 92);
    assert_eq!(state.find_course(alice[1].course_id).expect("course").name, "English Literature");
    assert_eq!(alice[1].letter_grade, LetterGrade::BPlus);
    assert_eq!(alice[1].score, 87);

    let bob = filter_students(&state.students, &StudentFilter::new("BOB", None));
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].id, 2);

    let frank = store
        .add_student(NewStudent {
            name: "Frank Moore".to_string(),
            email: "frank@school.edu".to_string(),
            grade_level: GradeLevel::Ninth,
            enrollment_date: NaiveDate::from_ymd_opt(2024, 9, 2).expect("valid date"),
        })
        .expect("add student");
    assert_eq!(frank.id, 6);

    let outcome = store
        .add_grade(NewGrade {
            student_id: 6,
            course_id: 1,
            letter_grade: LetterGrade::BMinus,
            score: 80,
            date_recorded: NaiveDate::from_ymd_opt(2024, 11, 1).expect("valid date"),
            comments: Some("late start".to_string()),
        })
        .expect("add grade");
    assert!(matches!(outcome, GradeUpsert::Inserted(_)));

    let removed = store.delete_student(2).expect("delete").expect("bob existed");
    assert_eq!(removed.cascaded_grades, 2);

    store.login("principal", Role::Admin, Utc::now()).expect("login");
    store.set_theme(Theme::Dark).expect("theme");

    let before = store.state().clone();
    let reopened = StateStore::load(store.into_port()).expect("reopen");
    let state = reopened.state();
    assert_eq!(state.students, before.students);
    assert_eq!(state.courses, before.courses);
    assert_eq!(state.grades, before.grades);
    assert_eq!(state.students.len(), 5);
    assert!(state.find_student(2).is_none());
    assert!(state.grades.iter().all(|g| g.student_id != 2));
    assert_eq!(state.grades.len(), 9);
    assert_eq!(state.theme, Theme::Dark);
    assert_eq!(state.role(), Some(Role::Admin));
    let frank_grade = state.find_grade(6, 1).expect("frank's grade");
    assert_eq!(frank_grade.comments.as_deref(), Some("late start"));

    let raw = reopened
        .port()
        .get("grades")
        .expect("read grades")
        .expect("grades stored");
    assert!(raw.contains("\"dateAdded\":\"2024-11-01\""));
    assert!(raw.contains("\"grade\":\"B-\""));
}

#[test]
fn rendered_pages_follow_the_state() {
    let temp = tempdir().expect("tempdir");
    let mut store = StateStore::load(FileStore::open(temp.path()).expect("open")).expect("load");

    let login = render(&PageRequest::new(Page::Dashboard), store.state());
    assert!(login.contains("login-page"));

    store.login("principal", Role::Admin, Utc::now()).expect("login");
    let dashboard = render(&PageRequest::new(Page::Dashboard), store.state());
    assert!(dashboard.contains("Welcome back, principal!"));
    assert!(dashboard.contains("Total Students"));
    // 10 seed grades: 4 A's, 5 B's, 1 C.
    assert!(dashboard.contains("A: 4 (40%)"));
    assert!(dashboard.contains("B: 5 (50%)"));

    store.delete_course(1).expect("delete course").expect("existed");
    let filtered = render(
        &PageRequest::new(Page::Students).with_filter(ViewFilter {
            grade_level: Some(GradeLevel::Tenth),
            ..ViewFilter::default()
        }),
        store.state(),
    );
    assert!(filtered.contains("Alice Johnson"));
    assert!(filtered.contains("Emma Brown"));
    assert!(!filtered.contains("Carol Davis"));

    let state = store.state();
    assert_eq!(state.grades.len(), 7);
    assert_eq!(grade_distribution(&state.grades).total(), 7);
    assert!(compute_gpa(&state.grades) > 3.0);

    let unknown = render(&PageRequest::new(Page::parse("attendance")), state);
    assert!(unknown.contains(r#"Page "attendance" is under development."#));
}
