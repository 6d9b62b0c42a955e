use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GradeLevel {
    #[serde(rename = "9th")]
    Ninth,
    #[serde(rename = "10th")]
    Tenth,
    #[serde(rename = "11th")]
    Eleventh,
    #[serde(rename = "12th")]
    Twelfth,
}

impl GradeLevel {
    pub const ALL: [GradeLevel; 4] = [
        GradeLevel::Ninth,
        GradeLevel::Tenth,
        GradeLevel::Eleventh,
        GradeLevel::Twelfth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GradeLevel::Ninth => "9th",
            GradeLevel::Tenth => "10th",
            GradeLevel::Eleventh => "11th",
            GradeLevel::Twelfth => "12th",
        }
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GradeLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "9" | "9th" => Ok(GradeLevel::Ninth),
            "10" | "10th" => Ok(GradeLevel::Tenth),
            "11" | "11th" => Ok(GradeLevel::Eleventh),
            "12" | "12th" => Ok(GradeLevel::Twelfth),
            other => Err(anyhow!("unknown grade level: {other} (expected 9th, 10th, 11th or 12th)")),
        }
    }
}

/// Letter grade as stored. Values outside the 13 known codes are kept
/// verbatim so that foreign data survives a load/save cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LetterGrade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    DMinus,
    F,
    Unrecognized(String),
}

impl LetterGrade {
    pub const KNOWN: [LetterGrade; 13] = [
        LetterGrade::APlus,
        LetterGrade::A,
        LetterGrade::AMinus,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::BMinus,
        LetterGrade::CPlus,
        LetterGrade::C,
        LetterGrade::CMinus,
        LetterGrade::DPlus,
        LetterGrade::D,
        LetterGrade::DMinus,
        LetterGrade::F,
    ];

    pub fn parse_known(s: &str) -> Option<Self> {
        let grade = match s.trim() {
            "A+" => LetterGrade::APlus,
            "A" => LetterGrade::A,
            "A-" => LetterGrade::AMinus,
            "B+" => LetterGrade::BPlus,
            "B" => LetterGrade::B,
            "B-" => LetterGrade::BMinus,
            "C+" => LetterGrade::CPlus,
            "C" => LetterGrade::C,
            "C-" => LetterGrade::CMinus,
            "D+" => LetterGrade::DPlus,
            "D" => LetterGrade::D,
            "D-" => LetterGrade::DMinus,
            "F" => LetterGrade::F,
            _ => return None,
        };
        Some(grade)
    }

    pub fn as_str(&self) -> &str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::BMinus => "B-",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::CMinus => "C-",
            LetterGrade::DPlus => "D+",
            LetterGrade::D => "D",
            LetterGrade::DMinus => "D-",
            LetterGrade::F => "F",
            LetterGrade::Unrecognized(raw) => raw,
        }
    }

    /// Grade points on the 4.0 scale; unrecognized codes count as 0.0.
    pub fn points(&self) -> f64 {
        match self {
            LetterGrade::APlus | LetterGrade::A => 4.0,
            LetterGrade::AMinus => 3.7,
            LetterGrade::BPlus => 3.3,
            LetterGrade::B => 3.0,
            LetterGrade::BMinus => 2.7,
            LetterGrade::CPlus => 2.3,
            LetterGrade::C => 2.0,
            LetterGrade::CMinus => 1.7,
            LetterGrade::DPlus => 1.3,
            LetterGrade::D => 1.0,
            LetterGrade::DMinus => 0.7,
            LetterGrade::F | LetterGrade::Unrecognized(_) => 0.0,
        }
    }

    /// Score band shown next to the code in grade forms.
    pub fn score_band(&self) -> Option<&'static str> {
        let band = match self {
            LetterGrade::APlus => "97-100",
            LetterGrade::A => "93-96",
            LetterGrade::AMinus => "90-92",
            LetterGrade::BPlus => "87-89",
            LetterGrade::B => "83-86",
            LetterGrade::BMinus => "80-82",
            LetterGrade::CPlus => "77-79",
            LetterGrade::C => "73-76",
            LetterGrade::CMinus => "70-72",
            LetterGrade::DPlus => "67-69",
            LetterGrade::D => "63-66",
            LetterGrade::DMinus => "60-62",
            LetterGrade::F => "0-59",
            LetterGrade::Unrecognized(_) => return None,
        };
        Some(band)
    }
}

impl From<String> for LetterGrade {
    fn from(raw: String) -> Self {
        LetterGrade::parse_known(&raw).unwrap_or(LetterGrade::Unrecognized(raw))
    }
}

impl From<LetterGrade> for String {
    fn from(grade: LetterGrade) -> Self {
        grade.as_str().to_string()
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterGrade {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LetterGrade::parse_known(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| anyhow!("unknown letter grade: {s} (expected A+ through F)"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Teacher => "Teacher",
            Role::Student => "Student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(anyhow!("unknown role: {other} (expected admin, teacher or student)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(anyhow!("unknown theme: {other} (expected light or dark)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: u32,
    pub name: String,
    pub email: String,
    #[serde(rename = "grade")]
    pub grade_level: GradeLevel,
    pub enrollment_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    pub id: u32,
    pub name: String,
    #[serde(rename = "teacher")]
    pub teacher_name: String,
    #[serde(rename = "students")]
    pub enrolled_count: u32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub student_id: u32,
    pub course_id: u32,
    #[serde(rename = "grade")]
    pub letter_grade: LetterGrade,
    pub score: u32,
    #[serde(rename = "dateAdded")]
    pub date_recorded: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl Grade {
    pub fn key(&self) -> (u32, u32) {
        (self.student_id, self.course_id)
    }

    pub fn is_for(&self, student_id: u32, course_id: u32) -> bool {
        self.student_id == student_id && self.course_id == course_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub role: Role,
    #[serde(rename = "loginTime")]
    pub login_timestamp: DateTime<Utc>,
}

impl Session {
    pub fn initial(&self) -> char {
        self.username
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Grade, GradeLevel, LetterGrade, Student, Theme};

    #[test]
    fn student_uses_stored_field_names() {
        let student = Student {
            id: 1,
            name: "Alice Johnson".to_string(),
            email: "alice@school.edu".to_string(),
            grade_level: GradeLevel::Tenth,
            enrollment_date: NaiveDate::from_ymd_opt(2024, 9, 1).expect("valid date"),
        };
        let json = serde_json::to_value(&student).expect("serialize student");
        assert_eq!(json["grade"], "10th");
        assert_eq!(json["enrollmentDate"], "2024-09-01");
    }

    #[test]
    fn unknown_letter_grade_survives_deserialize() {
        let raw = r#"{"studentId":1,"courseId":2,"grade":"E","score":40,"dateAdded":"2024-10-01"}"#;
        let grade: Grade = serde_json::from_str(raw).expect("parse grade");
        assert_eq!(grade.letter_grade, LetterGrade::Unrecognized("E".to_string()));
        assert_eq!(grade.letter_grade.points(), 0.0);

        let back = serde_json::to_string(&grade).expect("serialize grade");
        assert!(back.contains(r#""grade":"E""#));
        assert!(!back.contains("comments"));
    }

    #[test]
    fn strict_parse_rejects_unknown_letter() {
        assert!("Z".parse::<LetterGrade>().is_err());
        assert_eq!("B-".parse::<LetterGrade>().expect("parse"), LetterGrade::BMinus);
        assert_eq!("a+".parse::<LetterGrade>().expect("parse"), LetterGrade::APlus);
    }

    #[test]
    fn theme_toggle_twice_is_identity() {
        assert_eq!(Theme::Light.toggled().toggled(), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}
