//! Input records for store mutations, with the required-field checks the
//! dashboard forms apply before submitting.

use anyhow::{anyhow, bail};
use chrono::NaiveDate;

use crate::model::{GradeLevel, LetterGrade};

pub const MAX_SCORE: u32 = 100;

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub grade_level: GradeLevel,
    pub enrollment_date: NaiveDate,
}

impl NewStudent {
    pub fn validate(&self) -> anyhow::Result<()> {
        require("name", &self.name)?;
        require("email", &self.email)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub grade_level: Option<GradeLevel>,
    pub enrollment_date: Option<NaiveDate>,
}

impl StudentPatch {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(name) = &self.name {
            require("name", name)?;
        }
        if let Some(email) = &self.email {
            require("email", email)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.grade_level.is_none()
            && self.enrollment_date.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub teacher_name: String,
    pub enrolled_count: u32,
    pub description: String,
}

impl NewCourse {
    pub fn validate(&self) -> anyhow::Result<()> {
        require("name", &self.name)?;
        require("teacher", &self.teacher_name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub name: Option<String>,
    pub teacher_name: Option<String>,
    pub enrolled_count: Option<u32>,
    pub description: Option<String>,
}

impl CoursePatch {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(name) = &self.name {
            require("name", name)?;
        }
        if let Some(teacher) = &self.teacher_name {
            require("teacher", teacher)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.teacher_name.is_none()
            && self.enrolled_count.is_none()
            && self.description.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewGrade {
    pub student_id: u32,
    pub course_id: u32,
    pub letter_grade: LetterGrade,
    pub score: u32,
    pub date_recorded: NaiveDate,
    pub comments: Option<String>,
}

impl NewGrade {
    pub fn validate(&self) -> anyhow::Result<()> {
        check_score(self.score)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradePatch {
    pub letter_grade: Option<LetterGrade>,
    pub score: Option<u32>,
    pub date_recorded: Option<NaiveDate>,
    /// `Some(None)` clears the comment.
    pub comments: Option<Option<String>>,
}

impl GradePatch {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.score {
            Some(score) => check_score(score),
            None => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.letter_grade.is_none()
            && self.score.is_none()
            && self.date_recorded.is_none()
            && self.comments.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    /// Login is simulated: both fields must be filled, nothing is checked.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.username.trim().is_empty() || self.password.trim().is_empty() {
            return Err(anyhow!("please fill in all fields"));
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> anyhow::Result<()> {
    if value.trim().is_empty() {
        bail!("{field} is required");
    }
    Ok(())
}

fn check_score(score: u32) -> anyhow::Result<()> {
    if score > MAX_SCORE {
        bail!("score must be between 0 and {MAX_SCORE}, got {score}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{GradePatch, LoginForm, NewGrade, NewStudent};
    use crate::model::{GradeLevel, LetterGrade};

    #[test]
    fn blank_name_is_rejected() {
        let form = NewStudent {
            name: "   ".to_string(),
            email: "x@school.edu".to_string(),
            grade_level: GradeLevel::Ninth,
            enrollment_date: NaiveDate::from_ymd_opt(2024, 9, 1).expect("valid date"),
        };
        let err = form.validate().expect_err("blank name must fail");
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn score_above_hundred_is_rejected() {
        let form = NewGrade {
            student_id: 1,
            course_id: 1,
            letter_grade: LetterGrade::A,
            score: 101,
            date_recorded: NaiveDate::from_ymd_opt(2024, 10, 1).expect("valid date"),
            comments: None,
        };
        assert!(form.validate().is_err());

        let patch = GradePatch {
            score: Some(100),
            ..GradePatch::default()
        };
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn login_requires_both_fields() {
        let form = LoginForm {
            username: "alice".to_string(),
            password: String::new(),
        };
        assert!(form.validate().is_err());
    }
}
