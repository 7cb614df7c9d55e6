//! Built-in content that keeps the service useful when the oracle is not.

use crate::domain::Question;

/// Absolute last-resort question, served when a run delivered nothing because the oracle was unavailable.
pub fn hard_fallback_question(language: &str) -> Question {
  match language.trim().to_lowercase().as_str() {
    "javascript" | "typescript" | "js" | "ts" => Question {
      title: "Which call adds the value 5 to the end of the array `arr`?".into(),
      options: vec![
        "arr.push(5)".into(),
        "arr.append(5)".into(),
        "arr.add(5)".into(),
        "arr.insert(5)".into(),
      ],
      correct_answer_id: 0,
      explanation: "`Array.prototype.push` appends elements to the end of an array and returns the new length.".into(),
    },
    _ => Question {
      title: "Which call adds the value 5 to the end of the Python list `my_list`?".into(),
      options: vec![
        "my_list.append(5)".into(),
        "my_list.add(5)".into(),
        "my_list.push(5)".into(),
        "my_list.insert(5)".into(),
      ],
      correct_answer_id: 0,
      explanation: "In Python, `append()` adds a single element to the end of a list.".into(),
    },
  }
}
