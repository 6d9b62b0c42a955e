//! Sample dataset loaded when storage holds no students.

use chrono::NaiveDate;

use crate::model::{Course, Grade, GradeLevel, LetterGrade, Student};

#[derive(Debug, Clone)]
pub struct SampleData {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub grades: Vec<Grade>,
}

pub fn sample_data() -> SampleData {
    SampleData {
        students: sample_students(),
        courses: sample_courses(),
        grades: sample_grades(),
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn sample_students() -> Vec<Student> {
    let enrolled = date(2024, 9, 1);
    [
        (1, "Alice Johnson", "alice@school.edu", GradeLevel::Tenth),
        (2, "Bob Smith", "bob@school.edu", GradeLevel::Eleventh),
        (3, "Carol Davis", "carol@school.edu", GradeLevel::Ninth),
        (4, "David Wilson", "david@school.edu", GradeLevel::Twelfth),
        (5, "Emma Brown", "emma@school.edu", GradeLevel::Tenth),
    ]
    .into_iter()
    .map(|(id, name, email, grade_level)| Student {
        id,
        name: name.to_string(),
        email: email.to_string(),
        grade_level,
        enrollment_date: enrolled,
    })
    .collect()
}

fn sample_courses() -> Vec<Course> {
    [
        (1, "Mathematics", "Mr. Anderson", 25, "Advanced Mathematics"),
        (2, "English Literature", "Ms. Thompson", 22, "Classic and Modern Literature"),
        (3, "Physics", "Dr. Martinez", 18, "Applied Physics"),
        (4, "Chemistry", "Mrs. Lee", 20, "Organic and Inorganic Chemistry"),
        (5, "History", "Mr. Garcia", 24, "World History"),
    ]
    .into_iter()
    .map(|(id, name, teacher, enrolled, description)| Course {
        id,
        name: name.to_string(),
        teacher_name: teacher.to_string(),
        enrolled_count: enrolled,
        description: description.to_string(),
    })
    .collect()
}

fn sample_grades() -> Vec<Grade> {
    [
        (1, 1, LetterGrade::A, 92, 15),
        (1, 2, LetterGrade::BPlus, 87, 12),
        (2, 1, LetterGrade::B, 84, 15),
        (2, 3, LetterGrade::AMinus, 89, 10),
        (3, 2, LetterGrade::A, 94, 12),
        (3, 4, LetterGrade::BPlus, 88, 14),
        (4, 1, LetterGrade::CPlus, 78, 15),
        (4, 5, LetterGrade::B, 85, 13),
        (5, 2, LetterGrade::AMinus, 91, 12),
        (5, 3, LetterGrade::B, 83, 10),
    ]
    .into_iter()
    .map(|(student_id, course_id, letter_grade, score, day)| Grade {
        student_id,
        course_id,
        letter_grade,
        score,
        date_recorded: date(2024, 10, day),
        comments: None,
    })
    .collect()
}
