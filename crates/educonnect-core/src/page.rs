use std::fmt;

use crate::model::{GradeLevel, Role};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Page {
    Dashboard,
    Students,
    Courses,
    Teachers,
    Reports,
    MyClasses,
    Grades,
    Profile,
    /// Anything else; rendered as an "under development" placeholder.
    Unknown(String),
}

impl Page {
    /// Never fails: unrecognized identifiers become [`Page::Unknown`].
    pub fn parse(id: &str) -> Self {
        match id.trim() {
            "dashboard" => Page::Dashboard,
            "students" => Page::Students,
            "courses" => Page::Courses,
            "teachers" => Page::Teachers,
            "reports" => Page::Reports,
            "my-classes" => Page::MyClasses,
            "grades" => Page::Grades,
            "profile" => Page::Profile,
            other => Page::Unknown(other.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Page::Dashboard => "dashboard",
            Page::Students => "students",
            Page::Courses => "courses",
            Page::Teachers => "teachers",
            Page::Reports => "reports",
            Page::MyClasses => "my-classes",
            Page::Grades => "grades",
            Page::Profile => "profile",
            Page::Unknown(id) => id,
        }
    }

    /// Header title: the id capitalised with the dash turned into a space.
    pub fn title(&self) -> String {
        let spaced = self.id().replacen('-', " ", 1);
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub section: &'static str,
    pub label: &'static str,
    pub page: &'static str,
}

const fn item(section: &'static str, label: &'static str, page: &'static str) -> NavItem {
    NavItem {
        section,
        label,
        page,
    }
}

const ADMIN_NAV: &[NavItem] = &[
    item("Main", "Dashboard", "dashboard"),
    item("Management", "Students", "students"),
    item("Management", "Courses", "courses"),
    item("Management", "Teachers", "teachers"),
    item("Analytics", "Reports", "reports"),
];

const TEACHER_NAV: &[NavItem] = &[
    item("Main", "Dashboard", "dashboard"),
    item("Teaching", "My Classes", "my-classes"),
    item("Teaching", "Grade Book", "grades"),
    item("Teaching", "My Students", "students"),
];

const STUDENT_NAV: &[NavItem] = &[
    item("Main", "Dashboard", "dashboard"),
    item("Academics", "My Courses", "courses"),
    item("Academics", "My Grades", "grades"),
    item("Academics", "Profile", "profile"),
];

pub fn navigation(role: Role) -> &'static [NavItem] {
    match role {
        Role::Admin => ADMIN_NAV,
        Role::Teacher => TEACHER_NAV,
        Role::Student => STUDENT_NAV,
    }
}

pub fn is_available(page: &Page, role: Role) -> bool {
    navigation(role).iter().any(|item| item.page == page.id())
}

/// Search and select values of a page's table toolbar, applied at render
/// time so that navigating to a pre-filtered page is a single step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub search: String,
    pub grade_level: Option<GradeLevel>,
    pub course_id: Option<u32>,
}

impl ViewFilter {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty() && self.grade_level.is_none() && self.course_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Page,
    pub filter: ViewFilter,
}

impl PageRequest {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            filter: ViewFilter::default(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: ViewFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{Page, is_available, navigation};
    use crate::model::Role;

    #[test]
    fn unknown_ids_do_not_fail() {
        assert_eq!(Page::parse("attendance"), Page::Unknown("attendance".to_string()));
        assert_eq!(Page::parse("my-classes"), Page::MyClasses);
    }

    #[test]
    fn title_capitalises_and_unhyphenates() {
        assert_eq!(Page::MyClasses.title(), "My classes");
        assert_eq!(Page::Dashboard.title(), "Dashboard");
    }

    #[test]
    fn navigation_is_role_specific() {
        assert!(is_available(&Page::Teachers, Role::Admin));
        assert!(!is_available(&Page::Teachers, Role::Student));
        assert!(is_available(&Page::Profile, Role::Student));
        assert!(!is_available(&Page::Unknown("x".to_string()), Role::Admin));
        assert_eq!(navigation(Role::Teacher)[2].label, "Grade Book");
    }
}
