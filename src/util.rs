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

/// Log-safe truncation for large strings, on a char boundary.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  let count = s.chars().count();
  if count <= max_chars {
    s.to_string()
  } else {
    let head: String = s.chars().take(max_chars).collect();
    format!("{}… ({} chars total)", head, count)
  }
}

/// First `max_chars` characters of `s`.
pub fn take_chars(s: &str, max_chars: usize) -> String {
  s.chars().take(max_chars).collect()
}

/// True for the canonical hyphenated UUID form (8-4-4-4-12 hex digits).
pub fn is_hyphenated_uuid(s: &str) -> bool {
  s.len() == 36 && uuid::Uuid::try_parse(s).is_ok()
}

/// The outermost `{...}` span of `s`, for model replies that wrap JSON in prose
/// or markdown fences.
pub fn extract_json_object(s: &str) -> Option<&str> {
  let start = s.find('{')?;
  let end = s.rfind('}')?;
  (end > start).then(|| &s[start..=end])
}

/// Python-style `round()`: halves go to the nearest even integer.
pub fn round_half_even(x: f64) -> i64 {
  x.round_ties_even() as i64
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn uuid_check_requires_hyphens() {
    assert!(is_hyphenated_uuid("123e4567-e89b-12d3-a456-426614174000"));
    assert!(!is_hyphenated_uuid("123e4567e89b12d3a456426614174000"));
    assert!(!is_hyphenated_uuid("sender@example.com"));
  }

  #[test]
  fn json_object_is_found_inside_fences() {
    let reply = "Berikut:\n```json\n{\"questions\": [{\"a\": 1}]}\n```";
    assert_eq!(extract_json_object(reply), Some("{\"questions\": [{\"a\": 1}]}"));
    assert_eq!(extract_json_object("no json here"), None);
  }

  #[test]
  fn rounding_matches_bankers_rule() {
    assert_eq!(round_half_even(8.5), 8);
    assert_eq!(round_half_even(9.5), 10);
    assert_eq!(round_half_even(7.6), 8);
  }

  #[test]
  fn truncation_respects_multibyte_chars() {
    assert_eq!(trunc_for_log("héllo", 10), "héllo");
    assert!(trunc_for_log("héllo wörld", 3).starts_with("hél…"));
  }
}
