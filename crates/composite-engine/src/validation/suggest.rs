//! "Did you mean" suggestions for unknown node types

use std::collections::BTreeSet;

/// Find a known type close to `unknown`
///
/// Tries, in order: case-insensitive match, kebab-case conversion, then
/// adding or stripping a trailing `s`. Returns the first hit.
pub fn suggest_type(unknown: &str, available: &BTreeSet<String>) -> Option<String> {
    if available.is_empty() || unknown.is_empty() {
        return None;
    }

    let folded = unknown.to_lowercase();
    if let Some(hit) = available.iter().find(|t| t.to_lowercase() == folded) {
        return Some(hit.clone());
    }

    let kebab = to_kebab_case(unknown);
    if let Some(hit) = available.iter().find(|t| t.to_lowercase() == kebab) {
        return Some(hit.clone());
    }

    for candidate in plural_variants(&kebab) {
        if let Some(hit) = available.iter().find(|t| t.to_lowercase() == candidate) {
            return Some(hit.clone());
        }
    }

    None
}

/// Convert camelCase, PascalCase, snake_case or spaced names to kebab-case
///
/// Acronym runs stay together: `HTTPRequest` becomes `http-request`.
pub fn to_kebab_case(name: &str) -> String {
    let chars: Vec<char> = name.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == ' ' || c == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }

        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out.trim_end_matches('-').to_string()
}

fn plural_variants(name: &str) -> Vec<String> {
    let mut variants = vec![format!("{}s", name)];
    if let Some(singular) = name.strip_suffix('s') {
        if !singular.is_empty() {
            variants.push(singular.to_string());
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kebab_case() {
        assert_eq!(to_kebab_case("jsonFilter"), "json-filter");
        assert_eq!(to_kebab_case("JsonFilter"), "json-filter");
        assert_eq!(to_kebab_case("json_filter"), "json-filter");
        assert_eq!(to_kebab_case("json filter"), "json-filter");
        assert_eq!(to_kebab_case("HTTPRequest"), "http-request");
        assert_eq!(to_kebab_case("parseURL"), "parse-url");
        assert_eq!(to_kebab_case("already-kebab"), "already-kebab");
    }

    #[test]
    fn test_case_fold_suggestion() {
        let available = types(&["code", "transform"]);
        assert_eq!(suggest_type("Code", &available).as_deref(), Some("code"));
    }

    #[test]
    fn test_kebab_suggestion() {
        let available = types(&["json-filter", "merge"]);
        assert_eq!(suggest_type("jsonFilter", &available).as_deref(), Some("json-filter"));
        assert_eq!(suggest_type("json_filter", &available).as_deref(), Some("json-filter"));
    }

    #[test]
    fn test_plural_suggestion() {
        let available = types(&["merge", "filters"]);
        assert_eq!(suggest_type("merges", &available).as_deref(), Some("merge"));
        assert_eq!(suggest_type("filter", &available).as_deref(), Some("filters"));
    }

    #[test]
    fn test_no_suggestion() {
        let available = types(&["merge"]);
        assert_eq!(suggest_type("llm", &available), None);
        assert_eq!(suggest_type("merge", &BTreeSet::new()), None);
    }
}
