use std::path::Path;

use anyhow::{Context, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cli::{Command, CourseCommand, GradeCommand, RenderArgs, StudentCommand};
use crate::config::{Config, expand_tilde};
use crate::datetime::{format_timestamp, local_today, parse_date_input};
use crate::forms::{
    CoursePatch, GradePatch, LoginForm, NewCourse, NewGrade, NewStudent, StudentPatch,
};
use crate::model::{Course, Grade, Role, Student, Theme};
use crate::page::{Page, PageRequest, ViewFilter, is_available};
use crate::query::{GradeFilter, StudentFilter, filter_grades, filter_students, student_summary};
use crate::render::Renderer;
use crate::storage::{KeyValueStore, write_atomic};
use crate::store::{GradeUpsert, StateStore};

/// Runs one command against the store: a mutation followed by a re-render
/// of the affected page when `render.output` is configured, or a read.
#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch<S: KeyValueStore>(
    store: &mut StateStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let now = Utc::now();

    let affected = match command {
        Command::Login {
            username,
            role,
            password,
        } => cmd_login(store, username, role, password, now)?,
        Command::Logout => cmd_logout(store)?,
        Command::Whoami => return cmd_whoami(store),
        Command::Theme { mode } => cmd_theme(store, mode.as_deref())?,
        Command::Student { action } => cmd_student(store, renderer, action, now)?,
        Command::Course { action } => cmd_course(store, renderer, action)?,
        Command::Grade { action } => cmd_grade(store, renderer, action, now)?,
        Command::Stats { student } => return cmd_stats(store, renderer, student),
        Command::Render(args) => return cmd_render(store, renderer, args),
        Command::Export => return cmd_export(store),
        Command::Reset => cmd_reset(store)?,
    };

    if let Some(page) = affected {
        rerender(store, cfg, renderer, page)?;
    }
    Ok(())
}

/// Writes the affected page for the current session to `render.output`.
fn rerender<S: KeyValueStore>(
    store: &StateStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    page: Page,
) -> anyhow::Result<()> {
    let Some(target) = cfg.get("render.output") else {
        return Ok(());
    };
    let state = store.state();
    let page = match state.role() {
        Some(role) if !is_available(&page, role) => Page::Dashboard,
        _ => page,
    };

    let path = expand_tilde(Path::new(&target));
    let html = renderer.document(&PageRequest::new(page.clone()), state);
    write_atomic(&path, &html)
        .with_context(|| format!("failed to write rendered page to {}", path.display()))?;
    info!(page = %page, file = %path.display(), "page re-rendered");
    Ok(())
}

fn date_or_today(input: Option<&str>, now: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    let today = local_today(now);
    match input {
        Some(raw) => parse_date_input(raw, today),
        None => Ok(today),
    }
}

fn optional_date(input: Option<&str>, now: DateTime<Utc>) -> anyhow::Result<Option<NaiveDate>> {
    input
        .map(|raw| parse_date_input(raw, local_today(now)))
        .transpose()
}

#[instrument(skip(store, password, now))]
fn cmd_login<S: KeyValueStore>(
    store: &mut StateStore<S>,
    username: String,
    role: Role,
    password: String,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<Page>> {
    info!("command login");

    let form = LoginForm { username, password };
    form.validate()?;
    let session = store.login(&form.username, role, now)?;
    println!("Logged in as {} ({}).", session.username, session.role);
    Ok(Some(Page::Dashboard))
}

fn cmd_logout<S: KeyValueStore>(store: &mut StateStore<S>) -> anyhow::Result<Option<Page>> {
    info!("command logout");

    match store.logout()? {
        Some(session) => println!("Logged out {}.", session.username),
        None => println!("No active session."),
    }
    Ok(Some(Page::Dashboard))
}

fn cmd_whoami<S: KeyValueStore>(store: &StateStore<S>) -> anyhow::Result<()> {
    match &store.state().session {
        Some(session) => println!(
            "{} ({}) since {}",
            session.username,
            session.role,
            format_timestamp(session.login_timestamp)
        ),
        None => println!("Not logged in."),
    }
    Ok(())
}

fn cmd_theme<S: KeyValueStore>(
    store: &mut StateStore<S>,
    mode: Option<&str>,
) -> anyhow::Result<Option<Page>> {
    let theme = match mode.map(str::trim) {
        None => {
            println!("{}", store.state().theme);
            return Ok(None);
        }
        Some(raw) if raw.eq_ignore_ascii_case("toggle") => store.toggle_theme()?,
        Some(raw) => {
            let theme: Theme = raw.parse()?;
            store.set_theme(theme)?;
            theme
        }
    };
    println!("Theme: {theme}");
    Ok(Some(Page::Dashboard))
}

#[instrument(skip(store, renderer, action, now))]
fn cmd_student<S: KeyValueStore>(
    store: &mut StateStore<S>,
    renderer: &Renderer,
    action: StudentCommand,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<Page>> {
    match action {
        StudentCommand::Add {
            name,
            email,
            grade_level,
            enrolled,
        } => {
            info!("command student add");
            let form = NewStudent {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
                grade_level,
                enrollment_date: date_or_today(enrolled.as_deref(), now)?,
            };
            form.validate()?;
            let student = store.add_student(form)?;
            println!("Added student {} ({}).", student.id, student.name);
            Ok(Some(Page::Students))
        }
        StudentCommand::Update {
            id,
            name,
            email,
            grade_level,
            enrolled,
        } => {
            info!("command student update");
            let patch = StudentPatch {
                name,
                email,
                grade_level,
                enrollment_date: optional_date(enrolled.as_deref(), now)?,
            };
            if patch.is_empty() {
                bail!("nothing to update: pass at least one of --name, --email, --grade-level, --enrolled");
            }
            patch.validate()?;
            match store.update_student(id, patch)? {
                Some(student) => println!("Updated student {} ({}).", student.id, student.name),
                None => println!("No student with id {id}."),
            }
            Ok(Some(Page::Students))
        }
        StudentCommand::Delete { id } => {
            info!("command student delete");
            match store.delete_student(id)? {
                Some(removed) => println!(
                    "Deleted student {} ({}) and {} grade(s).",
                    removed.entity.id, removed.entity.name, removed.cascaded_grades
                ),
                None => println!("No student with id {id}."),
            }
            Ok(Some(Page::Students))
        }
        StudentCommand::List {
            search,
            grade_level,
        } => {
            let state = store.state();
            let filter = StudentFilter::new(&search, grade_level);
            let visible = filter_students(&state.students, &filter);
            debug!(shown = visible.len(), total = state.students.len(), "student list");
            renderer.print_student_table(&visible)?;
            Ok(None)
        }
        StudentCommand::Show { id } => {
            let state = store.state();
            let Some(student) = state.find_student(id) else {
                warn!(id, "no such student");
                println!("No student with id {id}.");
                return Ok(None);
            };
            renderer.print_student_info(student)?;
            let summary = student_summary(&state.grades, id);
            println!("grades    {}", summary.grade_count);
            println!("average   {}%", summary.average);
            println!("gpa       {:.2}", summary.gpa);
            Ok(None)
        }
        StudentCommand::Grades { id } => {
            let state = store.state();
            if state.find_student(id).is_none() {
                println!("No student with id {id}.");
                return Ok(None);
            }
            renderer.print_grade_table(&state.grades_for_student(id), state)?;
            Ok(None)
        }
    }
}

#[instrument(skip(store, renderer, action))]
fn cmd_course<S: KeyValueStore>(
    store: &mut StateStore<S>,
    renderer: &Renderer,
    action: CourseCommand,
) -> anyhow::Result<Option<Page>> {
    match action {
        CourseCommand::Add {
            name,
            teacher,
            students,
            description,
        } => {
            info!("command course add");
            let form = NewCourse {
                name: name.trim().to_string(),
                teacher_name: teacher.trim().to_string(),
                enrolled_count: students,
                description,
            };
            form.validate()?;
            let course = store.add_course(form)?;
            println!("Added course {} ({}).", course.id, course.name);
            Ok(Some(Page::Courses))
        }
        CourseCommand::Update {
            id,
            name,
            teacher,
            students,
            description,
        } => {
            info!("command course update");
            let patch = CoursePatch {
                name,
                teacher_name: teacher,
                enrolled_count: students,
                description,
            };
            if patch.is_empty() {
                bail!("nothing to update: pass at least one of --name, --teacher, --students, --description");
            }
            patch.validate()?;
            match store.update_course(id, patch)? {
                Some(course) => println!("Updated course {} ({}).", course.id, course.name),
                None => println!("No course with id {id}."),
            }
            Ok(Some(Page::Courses))
        }
        CourseCommand::Delete { id } => {
            info!("command course delete");
            match store.delete_course(id)? {
                Some(removed) => println!(
                    "Deleted course {} ({}) and {} grade(s).",
                    removed.entity.id, removed.entity.name, removed.cascaded_grades
                ),
                None => println!("No course with id {id}."),
            }
            Ok(Some(Page::Courses))
        }
        CourseCommand::List => {
            let state = store.state();
            renderer.print_course_table(&state.courses, &state.grades)?;
            Ok(None)
        }
    }
}

#[instrument(skip(store, renderer, action, now))]
fn cmd_grade<S: KeyValueStore>(
    store: &mut StateStore<S>,
    renderer: &Renderer,
    action: GradeCommand,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<Page>> {
    match action {
        GradeCommand::Add {
            student,
            course,
            letter,
            score,
            date,
            comments,
        } => {
            info!("command grade add");
            let form = NewGrade {
                student_id: student,
                course_id: course,
                letter_grade: letter,
                score,
                date_recorded: date_or_today(date.as_deref(), now)?,
                comments: comments.filter(|c| !c.trim().is_empty()),
            };
            form.validate()?;
            match store.add_grade(form)? {
                GradeUpsert::Inserted(grade) => println!(
                    "Recorded {} ({}%) for student {} in course {}.",
                    grade.letter_grade, grade.score, grade.student_id, grade.course_id
                ),
                GradeUpsert::Replaced { previous, current } => println!(
                    "Replaced {} ({}%) with {} ({}%) for student {} in course {}.",
                    previous.letter_grade,
                    previous.score,
                    current.letter_grade,
                    current.score,
                    current.student_id,
                    current.course_id
                ),
            }
            Ok(Some(Page::Grades))
        }
        GradeCommand::Update {
            student,
            course,
            letter,
            score,
            date,
            comments,
            clear_comments,
        } => {
            info!("command grade update");
            let comments = if clear_comments {
                Some(None)
            } else {
                comments.map(Some)
            };
            let patch = GradePatch {
                letter_grade: letter,
                score,
                date_recorded: optional_date(date.as_deref(), now)?,
                comments,
            };
            if patch.is_empty() {
                bail!("nothing to update: pass at least one of --letter, --score, --date, --comments, --clear-comments");
            }
            patch.validate()?;
            match store.update_grade(student, course, patch)? {
                Some(grade) => println!(
                    "Updated grade for student {} in course {}: {} ({}%).",
                    grade.student_id, grade.course_id, grade.letter_grade, grade.score
                ),
                None => println!("No grade for student {student} in course {course}."),
            }
            Ok(Some(Page::Grades))
        }
        GradeCommand::Delete { student, course } => {
            info!("command grade delete");
            match store.delete_grade(student, course)? {
                Some(grade) => println!(
                    "Deleted {} for student {} in course {}.",
                    grade.letter_grade, grade.student_id, grade.course_id
                ),
                None => println!("No grade for student {student} in course {course}."),
            }
            Ok(Some(Page::Grades))
        }
        GradeCommand::List { search, course } => {
            let state = store.state();
            let filter = GradeFilter::new(&search, course);
            let visible = filter_grades(&state.grades, &state.students, &state.courses, &filter);
            renderer.print_grade_table(&visible, state)?;
            Ok(None)
        }
        GradeCommand::Scale => {
            renderer.print_grade_scale()?;
            Ok(None)
        }
    }
}

#[instrument(skip(store, renderer))]
fn cmd_stats<S: KeyValueStore>(
    store: &StateStore<S>,
    renderer: &Renderer,
    student: Option<u32>,
) -> anyhow::Result<()> {
    info!("command stats");
    let state = store.state();

    match student {
        None => renderer.print_stats("all grades", &state.grades, &state.courses),
        Some(id) => {
            let Some(record) = state.find_student(id) else {
                println!("No student with id {id}.");
                return Ok(());
            };
            let own: Vec<Grade> = state
                .grades_for_student(id)
                .into_iter()
                .cloned()
                .collect();
            renderer.print_stats(
                &format!("student {} ({})", record.id, record.name),
                &own,
                &state.courses,
            )
        }
    }
}

#[instrument(skip(store, renderer, args))]
fn cmd_render<S: KeyValueStore>(
    store: &mut StateStore<S>,
    renderer: &Renderer,
    args: RenderArgs,
) -> anyhow::Result<()> {
    info!(page = %args.page, "command render");

    if let Some(role) = args.role {
        if store.state().session.is_none() {
            store.select_role(role);
        } else {
            warn!("--role only affects the login screen; a session is active");
        }
    }

    let req = PageRequest::new(Page::parse(&args.page)).with_filter(ViewFilter {
        search: args.search,
        grade_level: args.grade_level,
        course_id: args.course,
    });
    let html = if args.fragment {
        renderer.page(&req, store.state())
    } else {
        renderer.document(&req, store.state())
    };

    match args.out {
        Some(path) => write_rendered(&path, &html),
        None => {
            println!("{html}");
            Ok(())
        }
    }
}

fn write_rendered(path: &Path, html: &str) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    write_atomic(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
    info!(file = %path.display(), bytes = html.len(), "page written");
    Ok(())
}

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    students: &'a [Student],
    courses: &'a [Course],
    grades: &'a [Grade],
}

fn cmd_export<S: KeyValueStore>(store: &StateStore<S>) -> anyhow::Result<()> {
    info!("command export");

    let state = store.state();
    let snapshot = Snapshot {
        students: &state.students,
        courses: &state.courses,
        grades: &state.grades,
    };
    let out = serde_json::to_string_pretty(&snapshot)?;
    println!("{out}");
    Ok(())
}

fn cmd_reset<S: KeyValueStore>(store: &mut StateStore<S>) -> anyhow::Result<Option<Page>> {
    info!("command reset");

    store.reset_sample_data()?;
    let state = store.state();
    println!(
        "Restored sample data: {} students, {} courses, {} grades.",
        state.students.len(),
        state.courses.len(),
        state.grades.len()
    );
    Ok(Some(Page::Dashboard))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::dispatch;
    use crate::cli::{Command, CourseCommand, GradeCommand, StudentCommand};
    use crate::config::Config;
    use crate::model::{GradeLevel, LetterGrade, Role, Theme};
    use crate::render::Renderer;
    use crate::storage::MemoryStore;
    use crate::store::StateStore;

    fn seeded() -> StateStore<MemoryStore> {
        StateStore::load(MemoryStore::new()).expect("load store")
    }

    #[test]
    fn login_requires_a_password() {
        let mut store = seeded();
        let err = dispatch(
            &mut store,
            &Config::default(),
            &Renderer::default(),
            Command::Login {
                username: "admin".to_string(),
                role: Role::Admin,
                password: " ".to_string(),
            },
        )
        .expect_err("validation error");
        assert!(err.to_string().contains("please fill in all fields"));
        assert!(store.state().session.is_none());
    }

    #[test]
    fn blank_student_name_is_rejected_before_the_store() {
        let mut store = seeded();
        let result = dispatch(
            &mut store,
            &Config::default(),
            &Renderer::default(),
            Command::Student {
                action: StudentCommand::Add {
                    name: "  ".to_string(),
                    email: "x@school.edu".to_string(),
                    grade_level: GradeLevel::Ninth,
                    enrolled: None,
                },
            },
        );
        assert!(result.is_err());
        assert_eq!(store.state().students.len(), 5);
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let mut store = seeded();
        let result = dispatch(
            &mut store,
            &Config::default(),
            &Renderer::default(),
            Command::Grade {
                action: GradeCommand::Add {
                    student: 1,
                    course: 3,
                    letter: LetterGrade::A,
                    score: 101,
                    date: None,
                    comments: None,
                },
            },
        );
        assert!(result.is_err());
        assert_eq!(store.state().grades.len(), 10);
    }

    #[test]
    fn missing_ids_are_reported_not_errors() {
        let mut store = seeded();
        dispatch(
            &mut store,
            &Config::default(),
            &Renderer::default(),
            Command::Course {
                action: CourseCommand::Delete { id: 42 },
            },
        )
        .expect("no-op delete");
        assert_eq!(store.state().courses.len(), 5);
    }

    #[test]
    fn mutation_rerenders_the_affected_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("page.html");
        let mut cfg = Config::default();
        cfg.apply_overrides([(
            "render.output".to_string(),
            out.display().to_string(),
        )]);
        let renderer = Renderer::new(&cfg).expect("renderer");
        let mut store = seeded();

        dispatch(
            &mut store,
            &cfg,
            &renderer,
            Command::Login {
                username: "principal".to_string(),
                role: Role::Admin,
                password: "secret".to_string(),
            },
        )
        .expect("login");
        dispatch(
            &mut store,
            &cfg,
            &renderer,
            Command::Student {
                action: StudentCommand::Delete { id: 2 },
            },
        )
        .expect("delete");

        let html = fs::read_to_string(&out).expect("rendered page");
        assert!(html.contains("Student Management"));
        assert!(html.contains("All Students (4)"));
        assert!(!html.contains("Bob Smith"));
    }

    #[test]
    fn theme_toggle_ignores_case_and_persists() {
        let mut store = seeded();
        dispatch(
            &mut store,
            &Config::default(),
            &Renderer::default(),
            Command::Theme {
                mode: Some("Toggle".to_string()),
            },
        )
        .expect("toggle");
        assert_eq!(store.state().theme, Theme::Dark);

        let reloaded = StateStore::load(store.into_port()).expect("reload");
        assert_eq!(reloaded.state().theme, Theme::Dark);
    }
}
