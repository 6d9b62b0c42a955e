use std::collections::BTreeMap;

use chrono::Datelike;
use tracing::trace;

use crate::datetime::month_short_name;
use crate::model::{
  Course,
  Grade,
  GradeLevel,
  Student
};

#[must_use]
pub fn find_student_by_id(
  students: &[Student],
  id: u32
) -> Option<&Student> {
  students.iter().find(|s| s.id == id)
}

#[must_use]
pub fn find_course_by_id(
  courses: &[Course],
  id: u32
) -> Option<&Course> {
  courses.iter().find(|c| c.id == id)
}

pub fn grades_for_student(
  grades: &[Grade],
  student_id: u32
) -> Vec<&Grade> {
  grades
    .iter()
    .filter(|g| g.student_id == student_id)
    .collect()
}

pub fn grades_for_course(
  grades: &[Grade],
  course_id: u32
) -> Vec<&Grade> {
  grades
    .iter()
    .filter(|g| g.course_id == course_id)
    .collect()
}

/// Search box plus grade-level select of the student management table.
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
  search:      String,
  grade_level: Option<GradeLevel>
}

impl StudentFilter {
  pub fn new(
    search: &str,
    grade_level: Option<GradeLevel>
  ) -> Self {
    Self {
      search: search.to_lowercase(),
      grade_level
    }
  }

  pub fn is_empty(&self) -> bool {
    self.search.is_empty()
      && self.grade_level.is_none()
  }

  pub fn matches(
    &self,
    student: &Student
  ) -> bool {
    let matches_search = student
      .name
      .to_lowercase()
      .contains(&self.search)
      || student
        .email
        .to_lowercase()
        .contains(&self.search)
      || student
        .id
        .to_string()
        .contains(&self.search);
    let matches_level = self
      .grade_level
      .is_none_or(|level| {
        student.grade_level == level
      });

    trace!(
      id = student.id,
      matches_search,
      matches_level,
      "student filter evaluated"
    );
    matches_search && matches_level
  }
}

#[tracing::instrument(skip(
  students, filter
))]
pub fn filter_students<'a>(
  students: &'a [Student],
  filter: &StudentFilter
) -> Vec<&'a Student> {
  if filter.is_empty() {
    return students.iter().collect();
  }
  students
    .iter()
    .filter(|s| filter.matches(s))
    .collect()
}

/// Teacher "My Students" search: name or email only.
pub fn filter_teacher_students<'a>(
  students: &'a [Student],
  search: &str
) -> Vec<&'a Student> {
  let term = search.to_lowercase();
  students
    .iter()
    .filter(|s| {
      s.name.to_lowercase().contains(&term)
        || s
          .email
          .to_lowercase()
          .contains(&term)
    })
    .collect()
}

/// Grade book search: student name, course name or letter grade, narrowed to
/// one course when set.
#[derive(Debug, Clone, Default)]
pub struct GradeFilter {
  search:    String,
  course_id: Option<u32>
}

impl GradeFilter {
  pub fn new(
    search: &str,
    course_id: Option<u32>
  ) -> Self {
    Self {
      search: search.to_lowercase(),
      course_id
    }
  }

  pub fn matches(
    &self,
    grade: &Grade,
    students: &[Student],
    courses: &[Course]
  ) -> bool {
    let student_hit =
      find_student_by_id(
        students,
        grade.student_id
      )
      .is_some_and(|s| {
        s.name
          .to_lowercase()
          .contains(&self.search)
      });
    let course_hit = find_course_by_id(
      courses,
      grade.course_id
    )
    .is_some_and(|c| {
      c.name
        .to_lowercase()
        .contains(&self.search)
    });
    let letter_hit = grade
      .letter_grade
      .as_str()
      .to_lowercase()
      .contains(&self.search);

    let matches_course = self
      .course_id
      .is_none_or(|id| {
        grade.course_id == id
      });

    (student_hit
      || course_hit
      || letter_hit)
      && matches_course
  }
}

#[tracing::instrument(skip(
  grades, students, courses, filter
))]
pub fn filter_grades<'a>(
  grades: &'a [Grade],
  students: &[Student],
  courses: &[Course],
  filter: &GradeFilter
) -> Vec<&'a Grade> {
  grades
    .iter()
    .filter(|g| {
      filter.matches(
        g, students, courses
      )
    })
    .collect()
}

pub fn courses_taught_by<'a>(
  courses: &'a [Course],
  username: &str
) -> Vec<&'a Course> {
  courses
    .iter()
    .filter(|c| {
      c.teacher_name.contains(username)
    })
    .collect()
}

/// Mean grade points, rounded to two decimals. Empty input yields 0.
pub fn compute_gpa<'a, I>(
  grades: I
) -> f64
where
  I: IntoIterator<Item = &'a Grade>
{
  let mut total = 0.0;
  let mut count = 0usize;
  for grade in grades {
    total += grade.letter_grade.points();
    count += 1;
  }
  if count == 0 {
    return 0.0;
  }
  round_to_hundredths(
    total / count as f64
  )
}

/// Mean score rounded to the nearest integer. Empty input yields 0.
pub fn compute_average_score<'a, I>(
  grades: I
) -> u32
where
  I: IntoIterator<Item = &'a Grade>
{
  let mut total = 0u64;
  let mut count = 0u64;
  for grade in grades {
    total += u64::from(grade.score);
    count += 1;
  }
  if count == 0 {
    return 0;
  }
  (total as f64 / count as f64).round()
    as u32
}

/// Letter buckets keyed by the first character of the grade code.
///
/// Codes starting with anything other than A-F land in `unbucketed`. They
/// are excluded from [`GradeDistribution::total`], so bucket percentages
/// always describe the bucketed grades only.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub struct GradeDistribution {
  pub a:          usize,
  pub b:          usize,
  pub c:          usize,
  pub d:          usize,
  pub f:          usize,
  pub unbucketed: usize
}

impl GradeDistribution {
  pub fn buckets(
    &self
  ) -> [(char, usize); 5] {
    [
      ('A', self.a),
      ('B', self.b),
      ('C', self.c),
      ('D', self.d),
      ('F', self.f)
    ]
  }

  pub fn total(&self) -> usize {
    self.a
      + self.b
      + self.c
      + self.d
      + self.f
  }

  /// Whole-number share of the bucketed total.
  pub fn percent(
    &self,
    count: usize
  ) -> u32 {
    let total = self.total();
    if total == 0 {
      return 0;
    }
    (count as f64 * 100.0
      / total as f64)
      .round() as u32
  }
}

pub fn grade_distribution<'a, I>(
  grades: I
) -> GradeDistribution
where
  I: IntoIterator<Item = &'a Grade>
{
  let mut dist =
    GradeDistribution::default();
  for grade in grades {
    match grade
      .letter_grade
      .as_str()
      .chars()
      .next()
    {
      | Some('A') => dist.a += 1,
      | Some('B') => dist.b += 1,
      | Some('C') => dist.c += 1,
      | Some('D') => dist.d += 1,
      | Some('F') => dist.f += 1,
      | _ => dist.unbucketed += 1
    }
  }
  dist
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoursePerformance {
  pub course_id:   u32,
  pub name:        String,
  pub average:     u32,
  pub grade_count: usize
}

pub fn course_performance(
  courses: &[Course],
  grades: &[Grade]
) -> Vec<CoursePerformance> {
  courses
    .iter()
    .map(|course| {
      let course_grades =
        grades_for_course(
          grades, course.id
        );
      CoursePerformance {
        course_id:   course.id,
        name:        course.name.clone(),
        average:     compute_average_score(
          course_grades.iter().copied()
        ),
        grade_count: course_grades.len()
      }
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyAverage {
  pub year:    i32,
  pub month:   u32,
  pub label:   String,
  pub average: u32
}

/// Average score per calendar month, oldest first. Labels carry the year
/// only when the grades span more than one year.
pub fn monthly_progress<'a, I>(
  grades: I
) -> Vec<MonthlyAverage>
where
  I: IntoIterator<Item = &'a Grade>
{
  let mut months: BTreeMap<
    (i32, u32),
    Vec<&Grade>
  > = BTreeMap::new();
  for grade in grades {
    let date = grade.date_recorded;
    months
      .entry((date.year(), date.month()))
      .or_default()
      .push(grade);
  }

  let multi_year = months
    .keys()
    .map(|(year, _)| *year)
    .min()
    != months
      .keys()
      .map(|(year, _)| *year)
      .max();

  months
    .into_iter()
    .map(|((year, month), bucket)| {
      let short = month_short_name(month);
      let label = if multi_year {
        format!("{short} {year}")
      } else {
        short.to_string()
      };
      MonthlyAverage {
        year,
        month,
        label,
        average: compute_average_score(
          bucket
        )
      }
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudentSummary {
  pub average:     u32,
  pub gpa:         f64,
  pub grade_count: usize
}

pub fn student_summary(
  grades: &[Grade],
  student_id: u32
) -> StudentSummary {
  let own =
    grades_for_student(grades, student_id);
  StudentSummary {
    average:     compute_average_score(
      own.iter().copied()
    ),
    gpa:         compute_gpa(
      own.iter().copied()
    ),
    grade_count: own.len()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherSummary {
  pub name:     String,
  pub courses:  Vec<String>,
  pub enrolled: u32
}

/// Distinct teachers in first-seen order with the courses they teach.
pub fn teachers(
  courses: &[Course]
) -> Vec<TeacherSummary> {
  let mut out: Vec<TeacherSummary> =
    Vec::new();
  for course in courses {
    if let Some(existing) = out
      .iter_mut()
      .find(|t| t.name == course.teacher_name)
    {
      existing
        .courses
        .push(course.name.clone());
      existing.enrolled +=
        course.enrolled_count;
    } else {
      out.push(TeacherSummary {
        name:     course
          .teacher_name
          .clone(),
        courses:  vec![course.name.clone()],
        enrolled: course.enrolled_count
      });
    }
  }
  out
}

/// Student record behind a student-role login: email, email local part or
/// name equal to the username (ignoring case), else `fallback_id`.
pub fn student_for_username<'a>(
  students: &'a [Student],
  username: &str,
  fallback_id: u32
) -> Option<&'a Student> {
  let wanted =
    username.trim().to_lowercase();
  let hit = students.iter().find(|s| {
    let email = s.email.to_lowercase();
    let local = email
      .split('@')
      .next()
      .unwrap_or_default()
      .to_string();
    email == wanted
      || local == wanted
      || s.name.to_lowercase() == wanted
  });
  if hit.is_none() {
    trace!(
      username,
      fallback_id,
      "no student matches login; using fallback"
    );
  }
  hit.or_else(|| {
    find_student_by_id(
      students,
      fallback_id
    )
  })
}

fn round_to_hundredths(x: f64) -> f64 {
  (x * 100.0).round() / 100.0
}
