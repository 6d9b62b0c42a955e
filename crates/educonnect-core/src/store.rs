use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::forms::{CoursePatch, GradePatch, NewCourse, NewGrade, NewStudent, StudentPatch};
use crate::model::{Course, Grade, Role, Session, Student, Theme};
use crate::query;
use crate::seed::sample_data;
use crate::storage::{
    COURSES_KEY, CURRENT_USER_KEY, GRADES_KEY, KeyValueStore, STUDENTS_KEY, THEME_KEY, load_json,
    save_json,
};

/// Everything the views read. Only [`StateStore`] hands out mutable access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub grades: Vec<Grade>,
    pub session: Option<Session>,
    pub selected_role: Option<Role>,
    pub theme: Theme,
}

impl AppState {
    pub fn find_student(&self, id: u32) -> Option<&Student> {
        query::find_student_by_id(&self.students, id)
    }

    pub fn find_course(&self, id: u32) -> Option<&Course> {
        query::find_course_by_id(&self.courses, id)
    }

    pub fn grades_for_student(&self, student_id: u32) -> Vec<&Grade> {
        query::grades_for_student(&self.grades, student_id)
    }

    pub fn find_grade(&self, student_id: u32, course_id: u32) -> Option<&Grade> {
        self.grades.iter().find(|g| g.is_for(student_id, course_id))
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }
}

/// `max(ids) + 1`, or 1 for an empty collection.
pub fn next_id<I>(ids: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    ids.into_iter().max().unwrap_or(0) + 1
}

#[derive(Debug, Clone, PartialEq)]
pub struct Removed<T> {
    pub entity: T,
    pub cascaded_grades: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradeUpsert {
    Inserted(Grade),
    Replaced { previous: Grade, current: Grade },
}

/// Owns the application state and its persistence port. Every mutation
/// writes the affected keys before it returns; in-memory state only changes
/// once the write succeeded. Rendering afterwards is the caller's job.
#[derive(Debug)]
pub struct StateStore<S: KeyValueStore> {
    state: AppState,
    port: S,
}

impl<S: KeyValueStore> StateStore<S> {
    #[tracing::instrument(skip(port))]
    pub fn load(mut port: S) -> anyhow::Result<Self> {
        let students: Vec<Student> = load_json(&port, STUDENTS_KEY)?.unwrap_or_default();

        let (students, courses, grades) = if students.is_empty() {
            info!("no students stored; loading sample data");
            let sample = sample_data();
            save_json(&mut port, STUDENTS_KEY, &sample.students)?;
            save_json(&mut port, COURSES_KEY, &sample.courses)?;
            save_json(&mut port, GRADES_KEY, &sample.grades)?;
            (sample.students, sample.courses, sample.grades)
        } else {
            let courses: Vec<Course> = load_json(&port, COURSES_KEY)?.unwrap_or_default();
            let grades: Vec<Grade> = load_json(&port, GRADES_KEY)?.unwrap_or_default();
            (students, courses, grades)
        };

        let session: Option<Session> = load_json(&port, CURRENT_USER_KEY)?;
        let theme = match port.get(THEME_KEY)? {
            Some(raw) => raw.parse::<Theme>().unwrap_or_else(|err| {
                warn!(error = %err, "stored theme unreadable; using light");
                Theme::Light
            }),
            None => Theme::Light,
        };

        info!(
            students = students.len(),
            courses = courses.len(),
            grades = grades.len(),
            logged_in = session.is_some(),
            theme = %theme,
            "loaded application state"
        );

        let selected_role = session.as_ref().map(|s| s.role);
        Ok(Self {
            state: AppState {
                students,
                courses,
                grades,
                session,
                selected_role,
                theme,
            },
            port,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn port(&self) -> &S {
        &self.port
    }

    pub fn into_port(self) -> S {
        self.port
    }

    #[tracing::instrument(skip(self, form), fields(name = %form.name))]
    pub fn add_student(&mut self, form: NewStudent) -> anyhow::Result<Student> {
        let student = Student {
            id: next_id(self.state.students.iter().map(|s| s.id)),
            name: form.name,
            email: form.email,
            grade_level: form.grade_level,
            enrollment_date: form.enrollment_date,
        };

        let mut students = self.state.students.clone();
        students.push(student.clone());
        self.commit_students(students)?;

        info!(id = student.id, "student added");
        Ok(student)
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn update_student(
        &mut self,
        id: u32,
        patch: StudentPatch,
    ) -> anyhow::Result<Option<Student>> {
        let mut students = self.state.students.clone();
        let Some(student) = students.iter_mut().find(|s| s.id == id) else {
            warn!(id, "update skipped: no such student");
            return Ok(None);
        };

        if let Some(name) = patch.name {
            student.name = name;
        }
        if let Some(email) = patch.email {
            student.email = email;
        }
        if let Some(level) = patch.grade_level {
            student.grade_level = level;
        }
        if let Some(date) = patch.enrollment_date {
            student.enrollment_date = date;
        }
        let updated = student.clone();

        self.commit_students(students)?;
        info!(id, "student updated");
        Ok(Some(updated))
    }

    /// Removes the student and every grade that references it.
    #[tracing::instrument(skip(self))]
    pub fn delete_student(&mut self, id: u32) -> anyhow::Result<Option<Removed<Student>>> {
        let mut students = self.state.students.clone();
        let Some(idx) = students.iter().position(|s| s.id == id) else {
            warn!(id, "delete skipped: no such student");
            return Ok(None);
        };
        let removed = students.remove(idx);

        let before = self.state.grades.len();
        let grades: Vec<Grade> = self
            .state
            .grades
            .iter()
            .filter(|g| g.student_id != id)
            .cloned()
            .collect();
        let cascaded = before - grades.len();

        write_cascade(
            &mut self.port,
            STUDENTS_KEY,
            &self.state.students,
            &students,
            &grades,
        )?;
        self.state.students = students;
        self.state.grades = grades;

        info!(id, cascaded_grades = cascaded, "student deleted");
        Ok(Some(Removed {
            entity: removed,
            cascaded_grades: cascaded,
        }))
    }

    #[tracing::instrument(skip(self, form), fields(name = %form.name))]
    pub fn add_course(&mut self, form: NewCourse) -> anyhow::Result<Course> {
        let course = Course {
            id: next_id(self.state.courses.iter().map(|c| c.id)),
            name: form.name,
            teacher_name: form.teacher_name,
            enrolled_count: form.enrolled_count,
            description: form.description,
        };

        let mut courses = self.state.courses.clone();
        courses.push(course.clone());
        self.commit_courses(courses)?;

        info!(id = course.id, "course added");
        Ok(course)
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn update_course(
        &mut self,
        id: u32,
        patch: CoursePatch,
    ) -> anyhow::Result<Option<Course>> {
        let mut courses = self.state.courses.clone();
        let Some(course) = courses.iter_mut().find(|c| c.id == id) else {
            warn!(id, "update skipped: no such course");
            return Ok(None);
        };

        if let Some(name) = patch.name {
            course.name = name;
        }
        if let Some(teacher) = patch.teacher_name {
            course.teacher_name = teacher;
        }
        if let Some(count) = patch.enrolled_count {
            course.enrolled_count = count;
        }
        if let Some(description) = patch.description {
            course.description = description;
        }
        let updated = course.clone();

        self.commit_courses(courses)?;
        info!(id, "course updated");
        Ok(Some(updated))
    }

    /// Removes the course and the grades recorded for it.
    #[tracing::instrument(skip(self))]
    pub fn delete_course(&mut self, id: u32) -> anyhow::Result<Option<Removed<Course>>> {
        let mut courses = self.state.courses.clone();
        let Some(idx) = courses.iter().position(|c| c.id == id) else {
            warn!(id, "delete skipped: no such course");
            return Ok(None);
        };
        let removed = courses.remove(idx);

        let before = self.state.grades.len();
        let grades: Vec<Grade> = self
            .state
            .grades
            .iter()
            .filter(|g| g.course_id != id)
            .cloned()
            .collect();
        let cascaded = before - grades.len();

        write_cascade(
            &mut self.port,
            COURSES_KEY,
            &self.state.courses,
            &courses,
            &grades,
        )?;
        self.state.courses = courses;
        self.state.grades = grades;

        info!(id, cascaded_grades = cascaded, "course deleted");
        Ok(Some(Removed {
            entity: removed,
            cascaded_grades: cascaded,
        }))
    }

    /// Records a grade. A grade already stored for the same student and
    /// course is replaced in place, keeping one grade per pair.
    #[tracing::instrument(skip(self, form), fields(student = form.student_id, course = form.course_id))]
    pub fn add_grade(&mut self, form: NewGrade) -> anyhow::Result<GradeUpsert> {
        let grade = Grade {
            student_id: form.student_id,
            course_id: form.course_id,
            letter_grade: form.letter_grade,
            score: form.score,
            date_recorded: form.date_recorded,
            comments: form.comments,
        };

        if self.state.find_student(grade.student_id).is_none() {
            warn!("grade references an unknown student");
        }
        if self.state.find_course(grade.course_id).is_none() {
            warn!("grade references an unknown course");
        }

        let mut grades = self.state.grades.clone();
        let outcome = match grades
            .iter_mut()
            .find(|g| g.is_for(grade.student_id, grade.course_id))
        {
            Some(existing) => {
                let previous = std::mem::replace(existing, grade.clone());
                GradeUpsert::Replaced {
                    previous,
                    current: grade,
                }
            }
            None => {
                grades.push(grade.clone());
                GradeUpsert::Inserted(grade)
            }
        };

        self.commit_grades(grades)?;
        debug!(?outcome, "grade recorded");
        Ok(outcome)
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn update_grade(
        &mut self,
        student_id: u32,
        course_id: u32,
        patch: GradePatch,
    ) -> anyhow::Result<Option<Grade>> {
        let mut grades = self.state.grades.clone();
        let Some(grade) = grades.iter_mut().find(|g| g.is_for(student_id, course_id)) else {
            warn!("update skipped: no such grade");
            return Ok(None);
        };

        if let Some(letter) = patch.letter_grade {
            grade.letter_grade = letter;
        }
        if let Some(score) = patch.score {
            grade.score = score;
        }
        if let Some(date) = patch.date_recorded {
            grade.date_recorded = date;
        }
        if let Some(comments) = patch.comments {
            grade.comments = comments;
        }
        let updated = grade.clone();

        self.commit_grades(grades)?;
        info!("grade updated");
        Ok(Some(updated))
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_grade(
        &mut self,
        student_id: u32,
        course_id: u32,
    ) -> anyhow::Result<Option<Grade>> {
        let mut grades = self.state.grades.clone();
        let Some(idx) = grades.iter().position(|g| g.is_for(student_id, course_id)) else {
            warn!("delete skipped: no such grade");
            return Ok(None);
        };
        let removed = grades.remove(idx);

        self.commit_grades(grades)?;
        info!("grade deleted");
        Ok(Some(removed))
    }

    pub fn select_role(&mut self, role: Role) {
        debug!(%role, "role selected");
        self.state.selected_role = Some(role);
    }

    #[tracing::instrument(skip(self, now))]
    pub fn login(
        &mut self,
        username: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Session> {
        self.select_role(role);
        let session = Session {
            username: username.trim().to_string(),
            role,
            login_timestamp: now,
        };
        save_json(&mut self.port, CURRENT_USER_KEY, &session)?;
        self.state.session = Some(session.clone());
        info!("user logged in");
        Ok(session)
    }

    /// Ends the session; the collections stay as they are.
    #[tracing::instrument(skip(self))]
    pub fn logout(&mut self) -> anyhow::Result<Option<Session>> {
        self.port.remove(CURRENT_USER_KEY)?;
        self.state.selected_role = None;
        let ended = self.state.session.take();
        info!(had_session = ended.is_some(), "user logged out");
        Ok(ended)
    }

    #[tracing::instrument(skip(self))]
    pub fn set_theme(&mut self, theme: Theme) -> anyhow::Result<()> {
        self.port.set(THEME_KEY, theme.as_str())?;
        self.state.theme = theme;
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> anyhow::Result<Theme> {
        let next = self.state.theme.toggled();
        self.set_theme(next)?;
        info!(theme = %next, "theme toggled");
        Ok(next)
    }

    /// Replaces the three collections with the sample dataset.
    #[tracing::instrument(skip(self))]
    pub fn reset_sample_data(&mut self) -> anyhow::Result<()> {
        let sample = sample_data();
        self.commit_students(sample.students)?;
        self.commit_courses(sample.courses)?;
        self.commit_grades(sample.grades)?;
        info!("sample data restored");
        Ok(())
    }

    fn commit_students(&mut self, students: Vec<Student>) -> anyhow::Result<()> {
        save_json(&mut self.port, STUDENTS_KEY, &students)?;
        self.state.students = students;
        Ok(())
    }

    fn commit_courses(&mut self, courses: Vec<Course>) -> anyhow::Result<()> {
        save_json(&mut self.port, COURSES_KEY, &courses)?;
        self.state.courses = courses;
        Ok(())
    }

    fn commit_grades(&mut self, grades: Vec<Grade>) -> anyhow::Result<()> {
        save_json(&mut self.port, GRADES_KEY, &grades)?;
        self.state.grades = grades;
        Ok(())
    }
}

/// Writes an entity collection together with its cascaded grades. If the
/// grades write fails, `key` is put back to `previous` so storage never keeps
/// the entity removed while its grades remain.
fn write_cascade<S, T>(
    port: &mut S,
    key: &str,
    previous: &[T],
    entities: &[T],
    grades: &[Grade],
) -> anyhow::Result<()>
where
    S: KeyValueStore,
    T: Serialize,
{
    save_json(port, key, entities)?;
    if let Err(err) = save_json(port, GRADES_KEY, grades) {
        if let Err(restore_err) = save_json(port, key, previous) {
            error!(key, error = %restore_err, "failed to restore after cascade write failure");
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{GradeUpsert, StateStore, next_id};
    use crate::forms::{GradePatch, NewCourse, NewGrade, NewStudent, StudentPatch};
    use crate::model::{GradeLevel, LetterGrade, Role, Student, Theme};
    use crate::storage::{GRADES_KEY, KeyValueStore, MemoryStore, STUDENTS_KEY, load_json};

    /// Memory port whose grades writes fail once `fail_grades` is set.
    #[derive(Debug, Default)]
    struct GradesWriteFails {
        inner: MemoryStore,
        fail_grades: bool,
    }

    impl KeyValueStore for GradesWriteFails {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
            if self.fail_grades && key == GRADES_KEY {
                anyhow::bail!("disk full");
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> anyhow::Result<()> {
            self.inner.remove(key)
        }
    }

    fn failing_grades_store() -> StateStore<GradesWriteFails> {
        let mut port = StateStore::load(GradesWriteFails::default())
            .expect("seed")
            .into_port();
        port.fail_grades = true;
        StateStore::load(port).expect("reload")
    }

    fn seeded() -> StateStore<MemoryStore> {
        StateStore::load(MemoryStore::new()).expect("load seeded store")
    }

    fn new_student(name: &str) -> NewStudent {
        NewStudent {
            name: name.to_string(),
            email: format!("{}@school.edu", name.to_lowercase()),
            grade_level: GradeLevel::Ninth,
            enrollment_date: NaiveDate::from_ymd_opt(2024, 9, 2).expect("valid date"),
        }
    }

    #[test]
    fn next_id_starts_at_one() {
        assert_eq!(next_id(Vec::<u32>::new()), 1);
        assert_eq!(next_id([3, 7, 5]), 8);
    }

    #[test]
    fn empty_storage_is_seeded() {
        let store = seeded();
        let state = store.state();
        assert_eq!(state.students.len(), 5);
        assert_eq!(state.courses.len(), 5);
        assert_eq!(state.grades.len(), 10);
        assert_eq!(state.theme, Theme::Light);
        assert!(state.session.is_none());
        assert!(store.port().get(STUDENTS_KEY).expect("get").is_some());
    }

    #[test]
    fn add_student_on_empty_collection_gets_id_one() {
        let mut store = seeded();
        for id in 1..=5 {
            store.delete_student(id).expect("delete");
        }
        assert!(store.state().students.is_empty());

        let student = store.add_student(new_student("Zed")).expect("add");
        assert_eq!(student.id, 1);
    }

    #[test]
    fn add_student_uses_max_plus_one() {
        let mut store = seeded();
        store.delete_student(3).expect("delete");
        let student = store.add_student(new_student("Frank")).expect("add");
        assert_eq!(student.id, 6);
    }

    #[test]
    fn update_missing_student_is_a_noop() {
        let mut store = seeded();
        let before = store.state().clone();
        let patch = StudentPatch {
            name: Some("Nobody".to_string()),
            ..StudentPatch::default()
        };
        assert!(store.update_student(42, patch).expect("update").is_none());
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn update_student_merges_present_fields() {
        let mut store = seeded();
        let patch = StudentPatch {
            grade_level: Some(GradeLevel::Eleventh),
            ..StudentPatch::default()
        };
        let updated = store.update_student(1, patch).expect("update").expect("found");
        assert_eq!(updated.name, "Alice Johnson");
        assert_eq!(updated.grade_level, GradeLevel::Eleventh);
    }

    #[test]
    fn delete_student_cascades_to_their_grades_only() {
        let mut store = seeded();
        let removed = store.delete_student(2).expect("delete").expect("found");
        assert_eq!(removed.entity.name, "Bob Smith");
        assert_eq!(removed.cascaded_grades, 2);

        let state = store.state();
        assert_eq!(state.students.len(), 4);
        assert_eq!(state.grades.len(), 8);
        assert!(state.grades.iter().all(|g| g.student_id != 2));
    }

    #[test]
    fn delete_course_cascades_to_its_grades() {
        let mut store = seeded();
        let removed = store.delete_course(1).expect("delete").expect("found");
        assert_eq!(removed.cascaded_grades, 3);
        assert!(store.state().grades.iter().all(|g| g.course_id != 1));
    }

    #[test]
    fn add_course_assigns_next_id() {
        let mut store = seeded();
        let course = store
            .add_course(NewCourse {
                name: "Biology".to_string(),
                teacher_name: "Dr. Patel".to_string(),
                enrolled_count: 0,
                description: "Life sciences".to_string(),
            })
            .expect("add course");
        assert_eq!(course.id, 6);
    }

    #[test]
    fn add_grade_for_existing_pair_replaces_it() {
        let mut store = seeded();
        let outcome = store
            .add_grade(NewGrade {
                student_id: 1,
                course_id: 1,
                letter_grade: LetterGrade::APlus,
                score: 98,
                date_recorded: NaiveDate::from_ymd_opt(2024, 11, 1).expect("valid date"),
                comments: Some("retake".to_string()),
            })
            .expect("add grade");

        match outcome {
            GradeUpsert::Replaced { previous, current } => {
                assert_eq!(previous.score, 92);
                assert_eq!(current.score, 98);
            }
            GradeUpsert::Inserted(_) => panic!("expected replacement"),
        }
        let state = store.state();
        assert_eq!(state.grades.len(), 10);
        assert_eq!(state.grades[0].letter_grade, LetterGrade::APlus);
    }

    #[test]
    fn update_and_delete_grade_by_pair() {
        let mut store = seeded();
        let patch = GradePatch {
            score: Some(90),
            comments: Some(Some("steady".to_string())),
            ..GradePatch::default()
        };
        let updated = store.update_grade(2, 3, patch).expect("update").expect("found");
        assert_eq!(updated.score, 90);
        assert_eq!(updated.comments.as_deref(), Some("steady"));

        assert!(store.update_grade(2, 5, GradePatch::default()).expect("update").is_none());

        let removed = store.delete_grade(2, 3).expect("delete").expect("found");
        assert_eq!(removed.score, 90);
        assert!(store.state().find_grade(2, 3).is_none());
        assert!(store.delete_grade(2, 3).expect("delete").is_none());
    }

    #[test]
    fn login_and_logout_leave_collections_alone() {
        let mut store = seeded();
        let now = Utc.with_ymd_and_hms(2024, 10, 20, 9, 0, 0).single().expect("valid now");
        let session = store.login("alice", Role::Student, now).expect("login");
        assert_eq!(session.role, Role::Student);
        assert!(store.port().get("currentUser").expect("get").is_some());

        let before = (store.state().students.clone(), store.state().grades.clone());
        let ended = store.logout().expect("logout");
        assert_eq!(ended.map(|s| s.username), Some("alice".to_string()));
        assert!(store.state().session.is_none());
        assert!(store.port().get("currentUser").expect("get").is_none());
        assert_eq!(before, (store.state().students.clone(), store.state().grades.clone()));
    }

    #[test]
    fn session_and_theme_survive_reload() {
        let mut store = seeded();
        let now = Utc.with_ymd_and_hms(2024, 10, 20, 9, 0, 0).single().expect("valid now");
        store.login("Ms. Thompson", Role::Teacher, now).expect("login");
        store.toggle_theme().expect("toggle");

        let reloaded = StateStore::load(store.into_port()).expect("reload");
        let state = reloaded.state();
        assert_eq!(state.theme, Theme::Dark);
        let session = state.session.as_ref().expect("session persisted");
        assert_eq!(session.username, "Ms. Thompson");
        assert_eq!(session.login_timestamp, now);
        assert_eq!(state.selected_role, Some(Role::Teacher));
    }

    #[test]
    fn theme_toggle_twice_restores_original() {
        let mut store = seeded();
        store.toggle_theme().expect("toggle");
        store.toggle_theme().expect("toggle");
        assert_eq!(store.state().theme, Theme::Light);
        assert_eq!(store.port().get("theme").expect("get").as_deref(), Some("light"));
    }

    #[test]
    fn failed_cascade_leaves_students_and_grades_untouched() {
        let mut store = failing_grades_store();
        let before = store.state().clone();

        assert!(store.delete_student(2).is_err());
        assert_eq!(store.state(), &before);

        let port = store.into_port();
        let stored: Vec<Student> =
            load_json(&port, STUDENTS_KEY).expect("read").expect("students stored");
        assert_eq!(stored, before.students);
        assert!(stored.iter().any(|s| s.id == 2));
    }

    #[test]
    fn failed_course_cascade_restores_courses() {
        let mut store = failing_grades_store();
        let before = store.state().clone();

        assert!(store.delete_course(1).is_err());
        assert_eq!(store.state(), &before);

        let reloaded = StateStore::load(store.into_port()).expect("reload");
        assert_eq!(reloaded.state().courses, before.courses);
        assert_eq!(reloaded.state().grades, before.grades);
    }

    #[test]
    fn reset_restores_sample_data() {
        let mut store = seeded();
        store.delete_student(1).expect("delete");
        store.reset_sample_data().expect("reset");
        assert_eq!(store.state().students.len(), 5);
        assert_eq!(store.state().grades.len(), 10);
    }
}
