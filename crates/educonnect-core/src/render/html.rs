use crate::model::LetterGrade;

/// Escapes text for element content and double-quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Badge class by leading letter; anything outside A-D shows as an F.
pub fn grade_class(letter: &LetterGrade) -> &'static str {
    match letter.as_str().chars().next() {
        Some('A') => "grade-a",
        Some('B') => "grade-b",
        Some('C') => "grade-c",
        Some('D') => "grade-d",
        _ => "grade-f",
    }
}

pub fn selected(on: bool) -> &'static str {
    if on { " selected" } else { "" }
}

pub fn stat_card(number: &str, label: &str) -> String {
    format!(
        r#"<div class="stat-card"><div class="stat-number">{}</div><div class="stat-label">{}</div></div>"#,
        escape(number),
        escape(label)
    )
}

pub fn page_header(title: &str, subtitle: &str) -> String {
    format!(
        r#"<div class="page-header"><h2>{}</h2><p>{}</p></div>"#,
        escape(title),
        escape(subtitle)
    )
}

pub fn empty_state(title: &str, hint: &str) -> String {
    format!(
        r#"<div class="empty-state"><h3>{}</h3><p>{}</p></div>"#,
        escape(title),
        escape(hint)
    )
}

/// Wraps already-escaped markup as the whole page body.
pub fn placeholder(message_html: &str) -> String {
    format!(r#"<div class="page-content"><p>{message_html}</p></div>"#)
}
