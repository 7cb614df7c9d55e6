//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Canonical form of a question title for duplicate detection:
/// whitespace runs collapse to one space, case is folded.
pub fn normalize_title(title: &str) -> String {
  title
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

/// Log-safe truncation for large strings (char-boundary aware).
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_replaces_every_occurrence() {
    let out = fill_template("{n} {lang} questions, {n} total", &[("n", "3"), ("lang", "rust")]);
    assert_eq!(out, "3 rust questions, 3 total");
  }

  #[test]
  fn normalize_collapses_whitespace_and_case() {
    assert_eq!(normalize_title("  What  does\n`len` RETURN? "), "what does `len` return?");
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    assert_eq!(trunc_for_log("héllo", 10), "héllo");
    assert!(trunc_for_log("héllo wörld", 3).starts_with("hél…"));
  }
}
