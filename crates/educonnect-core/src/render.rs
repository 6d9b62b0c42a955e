use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;

use crate::config::Config;
use crate::datetime::{format_short_date, format_timestamp};
use crate::model::{Course, Grade, LetterGrade, Role, Session, Student, Theme};
use crate::page::{Page, PageRequest, is_available, navigation};
use crate::query::{
    compute_average_score, compute_gpa, course_performance, grade_distribution,
    student_for_username,
};
use crate::store::AppState;

mod charts;
mod html;
mod pages;
mod table;

pub use html::{escape, grade_class};
use html::placeholder;
use pages::View;
use table::write_table;

/// Demo student shown to student-role logins that match no record.
pub const DEFAULT_STUDENT_ID: u32 = 1;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    title: String,
    default_student_id: u32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            color: false,
            title: "EduConnect".to_string(),
            default_student_id: DEFAULT_STUDENT_ID,
        }
    }
}

/// Full document for `req` with default settings.
pub fn render(req: &PageRequest, state: &AppState) -> String {
    Renderer::default().document(req, state)
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };
        let title = cfg
            .get("render.title")
            .unwrap_or_else(|| "EduConnect".to_string());
        let default_student_id = cfg
            .get_u32("student.default_id")?
            .unwrap_or(DEFAULT_STUDENT_ID);

        Ok(Self {
            color,
            title,
            default_student_id,
        })
    }

    /// Record id the student-role pages describe for `session`.
    pub fn student_id_for(&self, state: &AppState, session: &Session) -> u32 {
        student_for_username(&state.students, &session.username, self.default_student_id)
            .map_or(self.default_student_id, |s| s.id)
    }

    /// Complete HTML document: the login screen without a session, else the
    /// dashboard shell around the requested page.
    #[tracing::instrument(skip(self, state), fields(page = %req.page))]
    pub fn document(&self, req: &PageRequest, state: &AppState) -> String {
        let body = match &state.session {
            None => self.login_screen(state),
            Some(session) => self.shell(req, state, session),
        };
        let body_class = match state.theme {
            Theme::Dark => r#" class="dark""#,
            Theme::Light => "",
        };

        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body{body_class}>\n{body}\n</body>\n</html>\n",
            escape(&self.title)
        )
    }

    /// Main body only, for replacing the content pane. Empty without a session.
    #[tracing::instrument(skip(self, state), fields(page = %req.page))]
    pub fn page(&self, req: &PageRequest, state: &AppState) -> String {
        match &state.session {
            Some(session) => self.main_body(req, state, session),
            None => String::new(),
        }
    }

    fn main_body(&self, req: &PageRequest, state: &AppState, session: &Session) -> String {
        let role = session.role;
        if let Page::Unknown(name) = &req.page {
            return placeholder(&format!("Page \"{}\" is under development.", escape(name)));
        }
        if !is_available(&req.page, role) {
            tracing::debug!(page = %req.page, role = %role, "page not in role navigation");
            return not_available(&req.page, role);
        }

        tracing::debug!(filtered = !req.filter.is_empty(), "rendering page body");
        let view = View {
            state,
            session,
            filter: &req.filter,
            student_id: self.student_id_for(state, session),
        };
        match (&req.page, role) {
            (Page::Dashboard, _) => pages::dashboard(&view),
            (Page::Students, Role::Admin) => pages::admin_students(&view),
            (Page::Students, Role::Teacher) => pages::teacher_students(&view),
            (Page::Courses, Role::Admin) => pages::admin_courses(&view),
            (Page::Courses, Role::Student) => pages::student_courses(&view),
            (Page::Teachers, Role::Admin) => pages::teachers_page(&view),
            (Page::Reports, Role::Admin) => pages::reports(&view),
            (Page::MyClasses, Role::Teacher) => pages::teacher_classes(&view),
            (Page::Grades, Role::Teacher) => pages::grade_book(&view),
            (Page::Grades, Role::Student) => pages::student_grades(&view),
            (Page::Profile, Role::Student) => pages::profile(&view),
            (page, role) => not_available(page, role),
        }
    }

    fn shell(&self, req: &PageRequest, state: &AppState, session: &Session) -> String {
        let mut nav = String::new();
        let mut section = "";
        for item in navigation(session.role) {
            if item.section != section {
                if !section.is_empty() {
                    nav.push_str("</div>");
                }
                section = item.section;
                let _ = write!(
                    nav,
                    r#"<div class="nav-section"><div class="nav-section-title">{section}</div>"#
                );
            }
            let active = if item.page == req.page.id() { " active" } else { "" };
            let _ = write!(
                nav,
                r#"<button class="nav-item{active}" data-page="{}"><span class="nav-item-text">{}</span></button>"#,
                item.page, item.label
            );
        }
        if !section.is_empty() {
            nav.push_str("</div>");
        }

        let theme_marker = match state.theme {
            Theme::Dark => "moon",
            Theme::Light => "sun",
        };

        format!(
            r#"<div class="sidebar" id="sidebar"><div class="sidebar-header"><div class="sidebar-logo">{title}</div></div><nav class="sidebar-nav">{nav}</nav><div class="sidebar-footer"><div class="user-profile"><div class="user-avatar">{initial}</div><div class="user-info"><h4>{user}</h4><p>{role}</p><p class="login-time">{since}</p></div></div><button class="logout-btn" data-action="logout">Logout</button></div></div><div class="main-content" id="mainContent"><header class="main-header"><h1 id="pageTitle">{page_title}</h1><div class="header-actions"><button class="theme-toggle" data-action="toggle-theme" data-theme="{theme}">{theme_marker}</button></div></header><main class="main-body" id="mainBody">{main}</main></div>"#,
            title = escape(&self.title),
            initial = escape(&session.initial().to_string()),
            user = escape(&session.username),
            role = session.role,
            since = escape(&format_timestamp(session.login_timestamp)),
            page_title = escape(&req.page.title()),
            theme = state.theme,
            main = self.main_body(req, state, session),
        )
    }

    fn login_screen(&self, state: &AppState) -> String {
        let mut roles = String::new();
        for role in [Role::Admin, Role::Teacher, Role::Student] {
            let active = if state.selected_role == Some(role) { " active" } else { "" };
            let _ = write!(
                roles,
                r#"<button class="role-btn{active}" data-role="{role}">{}</button>"#,
                role.title()
            );
        }
        let submit = match state.selected_role {
            Some(role) => format!("Login as {}", role.title()),
            None => "Login".to_string(),
        };

        format!(
            r#"<div class="login-page" id="loginPage"><div class="login-card"><h1 class="login-title">{}</h1><p>Select your role to continue</p><div class="role-selector">{roles}</div><form class="login-form" id="loginForm"><input type="text" id="username" placeholder="Username" required><input type="password" id="password" placeholder="Password" required><button type="submit" class="btn btn-primary">{submit}</button></form></div></div>"#,
            escape(&self.title)
        )
    }

    #[tracing::instrument(skip(self, students))]
    pub fn print_student_table(&self, students: &[&Student]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = students
            .iter()
            .map(|s| {
                vec![
                    self.paint(&s.id.to_string(), "33"),
                    s.name.clone(),
                    s.email.clone(),
                    s.grade_level.to_string(),
                    format_short_date(s.enrollment_date),
                ]
            })
            .collect();
        write_table(&mut out, &["ID", "Name", "Email", "Grade", "Enrolled"], rows)
    }

    #[tracing::instrument(skip(self, courses, grades))]
    pub fn print_course_table(&self, courses: &[Course], grades: &[Grade]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = course_performance(courses, grades)
            .into_iter()
            .zip(courses)
            .map(|(perf, course)| {
                vec![
                    self.paint(&course.id.to_string(), "33"),
                    course.name.clone(),
                    course.teacher_name.clone(),
                    course.enrolled_count.to_string(),
                    format!("{}%", perf.average),
                    course.description.clone(),
                ]
            })
            .collect();
        write_table(
            &mut out,
            &["ID", "Course", "Teacher", "Students", "Avg", "Description"],
            rows,
        )
    }

    #[tracing::instrument(skip(self, grades, state))]
    pub fn print_grade_table(&self, grades: &[&Grade], state: &AppState) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = grades
            .iter()
            .map(|g| {
                let student = state
                    .find_student(g.student_id)
                    .map_or("Unknown Student", |s| s.name.as_str());
                let course = state
                    .find_course(g.course_id)
                    .map_or("Unknown Course", |c| c.name.as_str());
                let letter = match g.letter_grade.as_str().chars().next() {
                    Some('A') => self.paint(g.letter_grade.as_str(), "32"),
                    Some('D' | 'F') => self.paint(g.letter_grade.as_str(), "31"),
                    _ => g.letter_grade.as_str().to_string(),
                };
                vec![
                    format!("{}/{}", g.student_id, g.course_id),
                    student.to_string(),
                    course.to_string(),
                    letter,
                    format!("{}%", g.score),
                    format_short_date(g.date_recorded),
                    g.comments.clone().unwrap_or_default(),
                ]
            })
            .collect();
        write_table(
            &mut out,
            &["Key", "Student", "Course", "Grade", "Score", "Date", "Comments"],
            rows,
        )
    }

    pub fn print_grade_scale(&self) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = LetterGrade::KNOWN
            .iter()
            .map(|letter| {
                vec![
                    self.paint(letter.as_str(), "33"),
                    letter.score_band().unwrap_or_default().to_string(),
                    format!("{:.1}", letter.points()),
                ]
            })
            .collect();
        write_table(&mut out, &["Grade", "Score", "Points"], rows)
    }

    #[tracing::instrument(skip(self, student))]
    pub fn print_student_info(&self, student: &Student) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "id        {}", student.id)?;
        writeln!(out, "name      {}", student.name)?;
        writeln!(out, "email     {}", student.email)?;
        writeln!(out, "grade     {}", student.grade_level)?;
        writeln!(out, "enrolled  {}", student.enrollment_date.format("%Y-%m-%d"))?;
        Ok(())
    }

    /// GPA, average, distribution and per-course averages over `grades`.
    #[tracing::instrument(skip(self, grades, courses))]
    pub fn print_stats(&self, scope: &str, grades: &[Grade], courses: &[Course]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let dist = grade_distribution(grades);

        writeln!(out, "scope     {scope}")?;
        writeln!(out, "grades    {}", grades.len())?;
        writeln!(out, "gpa       {:.2}", compute_gpa(grades))?;
        writeln!(out, "average   {}%", compute_average_score(grades))?;
        for (letter, count) in dist.buckets() {
            writeln!(out, "  {letter}       {count} ({}%)", dist.percent(count))?;
        }
        if dist.unbucketed > 0 {
            writeln!(out, "  other   {}", dist.unbucketed)?;
        }
        writeln!(out)?;

        let rows = course_performance(courses, grades)
            .into_iter()
            .map(|perf| {
                vec![
                    perf.name,
                    perf.grade_count.to_string(),
                    format!("{}%", perf.average),
                ]
            })
            .collect();
        write_table(&mut out, &["Course", "Grades", "Average"], rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn not_available(page: &Page, role: Role) -> String {
    placeholder(&format!(
        "The {} page is not available to the {role} role.",
        escape(&page.title())
    ))
}
