//! Main-body generators, one per page and role.

use std::fmt::Write as _;

use super::charts::{distribution_chart, performance_chart, progress_chart};
use super::html::{empty_state, escape, grade_class, page_header, selected, stat_card};
use crate::datetime::{format_long_date, format_short_date};
use crate::model::{Course, Grade, GradeLevel, Role, Session, Student};
use crate::page::ViewFilter;
use crate::query::{
    GradeFilter, StudentFilter, compute_average_score, compute_gpa, course_performance,
    courses_taught_by, filter_grades, filter_students, filter_teacher_students,
    grade_distribution, grades_for_course, grades_for_student, monthly_progress, student_summary,
    teachers,
};
use crate::store::AppState;

/// Everything a page body reads.
pub(super) struct View<'a> {
    pub state: &'a AppState,
    pub session: &'a Session,
    pub filter: &'a ViewFilter,
    /// Record shown on the student-role pages.
    pub student_id: u32,
}

impl View<'_> {
    fn course_name(&self, id: u32) -> &str {
        self.state
            .find_course(id)
            .map_or("Unknown Course", |c| c.name.as_str())
    }

    fn student_name(&self, id: u32) -> &str {
        self.state
            .find_student(id)
            .map_or("Unknown Student", |s| s.name.as_str())
    }

    /// Teacher's own courses, or every course when the username matches none.
    fn teacher_courses(&self) -> Vec<&Course> {
        let own = courses_taught_by(&self.state.courses, &self.session.username);
        if own.is_empty() {
            self.state.courses.iter().collect()
        } else {
            own
        }
    }
}

fn gpa_text(grades: &[&Grade]) -> String {
    if grades.is_empty() {
        "0".to_string()
    } else {
        format!("{:.2}", compute_gpa(grades.iter().copied()))
    }
}

fn course_options(courses: &[Course], current: Option<u32>) -> String {
    let mut out = format!(
        r#"<option value=""{}>All Courses</option>"#,
        selected(current.is_none())
    );
    for course in courses {
        let _ = write!(
            out,
            r#"<option value="{}"{}>{}</option>"#,
            course.id,
            selected(current == Some(course.id)),
            escape(&course.name)
        );
    }
    out
}

fn search_input(id: &str, placeholder: &str, value: &str) -> String {
    format!(
        r#"<input type="text" class="search-input" id="{id}" placeholder="{}" value="{}">"#,
        escape(placeholder),
        escape(value)
    )
}

fn level_badge(level: GradeLevel) -> String {
    let level = level.as_str();
    format!(r#"<span class="grade-badge grade-{level}">{level}</span>"#)
}

fn letter_badge(grade: &Grade) -> String {
    format!(
        r#"<span class="grade-badge {}">{}</span>"#,
        grade_class(&grade.letter_grade),
        escape(grade.letter_grade.as_str())
    )
}

fn card(title: &str, body: &str) -> String {
    format!(
        r#"<div class="dashboard-card"><div class="card-header"><h3 class="card-title">{}</h3></div><div class="card-content">{body}</div></div>"#,
        escape(title)
    )
}

fn table(headers: &[&str], rows: &str) -> String {
    let mut head = String::new();
    for header in headers {
        let _ = write!(head, "<th>{}</th>", escape(header));
    }
    format!(
        r#"<table class="data-table"><thead><tr>{head}</tr></thead><tbody>{rows}</tbody></table>"#
    )
}

pub(super) fn dashboard(view: &View<'_>) -> String {
    let state = view.state;
    let role = view.session.role;
    let welcome = card(
        &format!("Welcome back, {}!", view.session.username),
        &format!(
            "<p>You're logged in as {}. Use the navigation menu to access your tools and information.</p>",
            role.title()
        ),
    );

    let everyone = compute_average_score(&state.grades);
    let (stats, charts) = match role {
        Role::Admin => (
            [
                stat_card(&state.students.len().to_string(), "Total Students"),
                stat_card(&state.courses.len().to_string(), "Active Courses"),
                stat_card(&state.grades.len().to_string(), "Total Grades"),
                stat_card(&format!("{everyone}%"), "Average Score"),
            ],
            overview_charts(state),
        ),
        Role::Teacher => (
            [
                stat_card(&view.teacher_courses().len().to_string(), "My Classes"),
                stat_card(&state.students.len().to_string(), "Total Students"),
                stat_card(&state.grades.len().to_string(), "Grades Given"),
                stat_card(&format!("{everyone}%"), "Class Average"),
            ],
            overview_charts(state),
        ),
        Role::Student => {
            let own = grades_for_student(&state.grades, view.student_id);
            let average = compute_average_score(own.iter().copied());
            (
                [
                    stat_card(&state.courses.len().to_string(), "Enrolled Courses"),
                    stat_card(&format!("{average}%"), "Average Score"),
                    stat_card(&gpa_text(&own), "Current GPA"),
                    stat_card(&own.len().to_string(), "Completed Assignments"),
                ],
                progress_chart(&monthly_progress(own.iter().copied())),
            )
        }
    };

    format!(
        r#"<div class="dashboard-grid">{welcome}<div class="stats-grid">{}</div>{charts}</div>"#,
        stats.concat()
    )
}

fn overview_charts(state: &AppState) -> String {
    distribution_chart(&grade_distribution(&state.grades))
        + &performance_chart(&course_performance(&state.courses, &state.grades))
}

pub(super) fn admin_students(view: &View<'_>) -> String {
    let state = view.state;
    let filter = StudentFilter::new(&view.filter.search, view.filter.grade_level);
    let visible = filter_students(&state.students, &filter);

    let mut levels = format!(
        r#"<option value=""{}>All Grades</option>"#,
        selected(view.filter.grade_level.is_none())
    );
    for level in GradeLevel::ALL {
        let _ = write!(
            levels,
            r#"<option value="{level}"{}>{level} Grade</option>"#,
            selected(view.filter.grade_level == Some(level))
        );
    }

    let body = if visible.is_empty() {
        empty_state("No students found", "Add your first student to get started")
    } else {
        let mut rows = String::new();
        for student in &visible {
            let _ = write!(
                rows,
                r#"<tr data-student="{id}"><td>#{id}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
                escape(&student.name),
                escape(&student.email),
                level_badge(student.grade_level),
                format_short_date(student.enrollment_date),
                id = student.id,
            );
        }
        table(&["ID", "Name", "Email", "Grade", "Enrollment Date"], &rows)
    };

    format!(
        r#"<div class="page-content">{}<div class="data-table-container"><div class="table-header"><h3 class="table-title">All Students ({})</h3><div class="table-actions">{}<select class="search-input" id="gradeFilter">{levels}</select></div></div><div id="studentsTableContainer">{body}</div></div></div>"#,
        page_header(
            "Student Management",
            "Manage student records, enrollment, and information"
        ),
        state.students.len(),
        search_input("studentSearch", "Search students...", &view.filter.search),
    )
}

pub(super) fn teacher_students(view: &View<'_>) -> String {
    let state = view.state;
    let mut visible = filter_teacher_students(&state.students, &view.filter.search);
    if let Some(course_id) = view.filter.course_id {
        let in_course = grades_for_course(&state.grades, course_id);
        visible.retain(|s| in_course.iter().any(|g| g.student_id == s.id));
    }

    let body = if visible.is_empty() {
        empty_state(
            "No students found",
            "No students are currently enrolled in your classes",
        )
    } else {
        let mut rows = String::new();
        for student in &visible {
            let summary = student_summary(&state.grades, student.id);
            let _ = write!(
                rows,
                r#"<tr data-student="{}"><td>{}</td><td>{}</td><td>{}</td><td>{}%</td><td>{}</td></tr>"#,
                student.id,
                escape(&student.name),
                escape(&student.email),
                level_badge(student.grade_level),
                summary.average,
                summary.grade_count
            );
        }
        table(
            &["Student", "Email", "Grade Level", "Average Score", "Total Grades"],
            &rows,
        )
    };

    format!(
        r#"<div class="page-content">{}<div class="data-table-container"><div class="table-header"><h3 class="table-title">Students in My Classes</h3><div class="table-actions"><select class="search-input" id="studentCourseFilter">{}</select>{}</div></div><div id="teacherStudentsTableContainer">{body}</div></div></div>"#,
        page_header("My Students", "View and manage students in your classes"),
        course_options(&state.courses, view.filter.course_id),
        search_input(
            "teacherStudentSearch",
            "Search students...",
            &view.filter.search
        ),
    )
}

pub(super) fn admin_courses(view: &View<'_>) -> String {
    let state = view.state;
    let body = if state.courses.is_empty() {
        empty_state("No courses found", "Add a course to get started")
    } else {
        let performance = course_performance(&state.courses, &state.grades);
        let mut rows = String::new();
        for (course, perf) in state.courses.iter().zip(&performance) {
            let _ = write!(
                rows,
                r#"<tr data-course="{id}"><td>#{id}</td><td>{}</td><td>{}</td><td>{}</td><td>{}%</td><td>{}</td></tr>"#,
                escape(&course.name),
                escape(&course.teacher_name),
                course.enrolled_count,
                perf.average,
                escape(&course.description),
                id = course.id,
            );
        }
        table(
            &["ID", "Course", "Teacher", "Students", "Average Score", "Description"],
            &rows,
        )
    };

    format!(
        r#"<div class="page-content">{}<div class="data-table-container"><div class="table-header"><h3 class="table-title">All Courses ({})</h3></div>{body}</div></div>"#,
        page_header(
            "Course Management",
            "Manage courses, assignments, and curriculum"
        ),
        state.courses.len()
    )
}

pub(super) fn student_courses(view: &View<'_>) -> String {
    let mut cards = String::new();
    for course in &view.state.courses {
        let _ = write!(
            cards,
            r#"<div class="dashboard-card" data-course="{}"><div class="card-header"><h3 class="card-title">{}</h3></div><div class="card-content"><p><strong>Teacher:</strong> {}</p><p><strong>Description:</strong> {}</p><p><strong>Students Enrolled:</strong> {}</p></div></div>"#,
            course.id,
            escape(&course.name),
            escape(&course.teacher_name),
            escape(&course.description),
            course.enrolled_count
        );
    }

    format!(
        r#"<div class="page-content">{}<div class="dashboard-grid">{cards}</div></div>"#,
        page_header("My Courses", "View your enrolled courses and course details")
    )
}

pub(super) fn teacher_classes(view: &View<'_>) -> String {
    let mut cards = String::new();
    for course in view.teacher_courses() {
        let _ = write!(
            cards,
            r#"<div class="dashboard-card" data-course="{id}"><div class="card-header"><h3 class="card-title">{}</h3></div><div class="card-content"><p><strong>Teacher:</strong> {}</p><p><strong>Students:</strong> {}</p><p><strong>Description:</strong> {}</p><div class="card-actions"><button class="btn btn-primary btn-sm" data-page="grades" data-course="{id}">View Grades</button><button class="btn btn-secondary btn-sm" data-page="students" data-course="{id}">View Students</button></div></div></div>"#,
            escape(&course.name),
            escape(&course.teacher_name),
            course.enrolled_count,
            escape(&course.description),
            id = course.id,
        );
    }

    format!(
        r#"<div class="page-content">{}<div class="dashboard-grid">{cards}</div></div>"#,
        page_header(
            "My Classes",
            "Manage your assigned classes and course information"
        )
    )
}

pub(super) fn grade_book(view: &View<'_>) -> String {
    let state = view.state;
    let filter = GradeFilter::new(&view.filter.search, view.filter.course_id);
    let visible = filter_grades(&state.grades, &state.students, &state.courses, &filter);

    let body = if visible.is_empty() {
        empty_state("No grades recorded", "Start adding grades for your students")
    } else {
        let mut rows = String::new();
        for grade in &visible {
            let _ = write!(
                rows,
                r#"<tr data-student="{}" data-course="{}"><td>{}</td><td>{}</td><td>{}</td><td>{}%</td><td>{}</td></tr>"#,
                grade.student_id,
                grade.course_id,
                escape(view.student_name(grade.student_id)),
                escape(view.course_name(grade.course_id)),
                letter_badge(grade),
                grade.score,
                format_short_date(grade.date_recorded)
            );
        }
        table(&["Student", "Course", "Grade", "Score", "Date Added"], &rows)
    };

    let charts = card(
        "Grade Distribution",
        &distribution_chart(&grade_distribution(&state.grades)),
    ) + &card(
        "Class Performance",
        &performance_chart(&course_performance(&state.courses, &state.grades)),
    );

    format!(
        r#"<div class="page-content">{}<div class="data-table-container"><div class="table-header"><h3 class="table-title">Grade Book</h3><div class="table-actions"><select class="search-input" id="courseFilter">{}</select>{}</div></div><div id="gradesTableContainer">{body}</div></div><div class="dashboard-grid">{charts}</div></div>"#,
        page_header(
            "Grade Management",
            "Manage student grades and performance tracking"
        ),
        course_options(&state.courses, view.filter.course_id),
        search_input("gradeSearch", "Search students...", &view.filter.search),
    )
}

pub(super) fn student_grades(view: &View<'_>) -> String {
    let own = grades_for_student(&view.state.grades, view.student_id);
    let body = if own.is_empty() {
        empty_state("No grades recorded", "Your grades will appear here once recorded")
    } else {
        let mut rows = String::new();
        for grade in &own {
            let _ = write!(
                rows,
                "<tr><td>{}</td><td>{}</td><td>{}%</td><td>{}</td></tr>",
                escape(view.course_name(grade.course_id)),
                letter_badge(grade),
                grade.score,
                format_long_date(grade.date_recorded)
            );
        }
        table(&["Course", "Grade", "Score", "Date Added"], &rows)
    };

    format!(
        r#"<div class="page-content">{}<div class="data-table-container">{body}</div></div>"#,
        page_header("My Grades", "View your grades and academic performance")
    )
}

pub(super) fn profile(view: &View<'_>) -> String {
    let state = view.state;
    let student = state.find_student(view.student_id);
    let own = grades_for_student(&state.grades, view.student_id);
    let field = |value: Option<String>| value.map_or_else(|| "N/A".to_string(), |v| escape(&v));

    format!(
        r#"<div class="page-content">{}<div class="profile-container"><div class="profile-card"><h3>Personal Information</h3><p><strong>Name:</strong> {}</p><p><strong>Email:</strong> {}</p><p><strong>Grade Level:</strong> {}</p><p><strong>Enrollment Date:</strong> {}</p></div><div class="profile-card"><h3>Academic Performance</h3><p><strong>GPA:</strong> {}</p><p><strong>Total Courses:</strong> {}</p><p><strong>Total Grades:</strong> {}</p></div></div></div>"#,
        page_header("My Profile", "View and manage your profile information"),
        field(student.map(|s| s.name.clone())),
        field(student.map(|s| s.email.clone())),
        field(student.map(|s| s.grade_level.to_string())),
        field(student.map(|s| format_long_date(s.enrollment_date))),
        gpa_text(&own),
        state.courses.len(),
        own.len()
    )
}

pub(super) fn teachers_page(view: &View<'_>) -> String {
    let list = teachers(&view.state.courses);
    let body = if list.is_empty() {
        empty_state("No teachers found", "Teachers appear once courses are assigned")
    } else {
        let mut rows = String::new();
        for teacher in &list {
            let _ = write!(
                rows,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&teacher.name),
                escape(&teacher.courses.join(", ")),
                teacher.enrolled
            );
        }
        table(&["Teacher", "Courses", "Students"], &rows)
    };

    format!(
        r#"<div class="page-content">{}<div class="data-table-container"><div class="table-header"><h3 class="table-title">All Teachers ({})</h3></div>{body}</div></div>"#,
        page_header("Teacher Management", "Manage teacher profiles and assignments"),
        list.len()
    )
}

pub(super) fn reports(view: &View<'_>) -> String {
    let state = view.state;
    let performance = course_performance(&state.courses, &state.grades);

    let mut rows = String::new();
    for perf in &performance {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}%</td></tr>",
            escape(&perf.name),
            perf.grade_count,
            perf.average
        );
    }

    let mut ranking: Vec<(&Student, u32, usize)> = state
        .students
        .iter()
        .map(|s| {
            let summary = student_summary(&state.grades, s.id);
            (s, summary.average, summary.grade_count)
        })
        .filter(|(_, _, count)| *count > 0)
        .collect();
    ranking.sort_by(|a, b| b.1.cmp(&a.1));
    let mut top = String::new();
    for (student, average, count) in ranking.iter().take(5) {
        let _ = write!(
            top,
            "<tr><td>{}</td><td>{count}</td><td>{average}%</td></tr>",
            escape(&student.name)
        );
    }

    let stats = [
        stat_card(
            &format!("{}%", compute_average_score(&state.grades)),
            "Average Score",
        ),
        stat_card(&gpa_text(&state.grades.iter().collect::<Vec<_>>()), "Overall GPA"),
        stat_card(&state.grades.len().to_string(), "Total Grades"),
    ]
    .concat();

    format!(
        r#"<div class="page-content">{}<div class="stats-grid">{stats}</div><div class="dashboard-grid">{}{}</div><div class="data-table-container"><div class="table-header"><h3 class="table-title">Course Averages</h3></div>{}</div><div class="data-table-container"><div class="table-header"><h3 class="table-title">Top Students</h3></div>{}</div></div>"#,
        page_header("Reports & Analytics", "View comprehensive reports and analytics"),
        distribution_chart(&grade_distribution(&state.grades)),
        performance_chart(&performance),
        table(&["Course", "Grades", "Average Score"], &rows),
        table(&["Student", "Grades", "Average Score"], &top),
    )
}
