use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_EXPANDED_NAMES: usize = 50;

lazy_static! {
    static ref DIGIT_RUN: Regex = Regex::new(r"\d+").unwrap();
}

/// Canonical comparison form: lowercase with whitespace, hyphens and
/// underscores removed.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect()
}

/// True iff the candidate equals any alias after normalization; never
/// substring-based.
pub fn exact_match(candidate: &str, aliases: &[String]) -> bool {
    let normalized = normalize(candidate);
    aliases.iter().any(|alias| normalize(alias) == normalized)
}

fn push_unique(out: &mut Vec<String>, name: String) {
    if out.len() < MAX_EXPANDED_NAMES && !out.contains(&name) {
        out.push(name);
    }
}

/// Expands an alias set with digit-run hyphen variants: "CCTV5" also matches
/// as "CCTV-5".
pub fn expanded_names(aliases: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    for alias in aliases {
        push_unique(&mut out, (*alias).to_string());
    }

    for alias in aliases {
        if let Some(run) = DIGIT_RUN.find(alias) {
            let variant = format!("{}-{}", &alias[..run.start()], &alias[run.start()..]);
            push_unique(&mut out, variant);
            push_unique(&mut out, (*alias).to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(normalize("CCTV-5"), "cctv5");
        assert_eq!(normalize("cctv_5"), "cctv5");
        assert_eq!(normalize(" CCTV 5 "), "cctv5");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for name in ["CCTV-5", "Beijing Satellite", "湖南卫视", "a_b-c d"] {
            let once = normalize(name);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_exact_match_over_alias_set() {
        let aliases = vec!["CCTV-1".to_string(), "CCTV1".to_string()];
        assert!(exact_match("cctv1", &aliases));
        assert!(exact_match("CCTV_1", &aliases));
        assert!(!exact_match("CCTV-11", &aliases));
    }

    #[test]
    fn test_exact_match_is_order_independent() {
        let ab = vec!["A One".to_string(), "B-2".to_string()];
        let ba = vec!["B-2".to_string(), "A One".to_string()];
        for candidate in ["aone", "b2", "c3"] {
            assert_eq!(exact_match(candidate, &ab), exact_match(candidate, &ba));
        }
    }

    #[test]
    fn test_expanded_names_adds_digit_variant() {
        let expanded = expanded_names(&["CCTV5"]);
        assert!(expanded.contains(&"CCTV5".to_string()));
        assert!(expanded.contains(&"CCTV-5".to_string()));
        assert!(expanded.len() <= MAX_EXPANDED_NAMES);

        let mut deduped = expanded.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), expanded.len());
    }

    #[test]
    fn test_expanded_names_without_digits() {
        let expanded = expanded_names(&["Beijing Satellite"]);
        assert_eq!(expanded, vec!["Beijing Satellite".to_string()]);
    }

    #[test]
    fn test_expanded_names_respects_cap() {
        let owned: Vec<String> = (0..120).map(|i| format!("Channel{i}")).collect();
        let aliases: Vec<&str> = owned.iter().map(String::as_str).collect();
        let expanded = expanded_names(&aliases);
        assert_eq!(expanded.len(), MAX_EXPANDED_NAMES);
    }
}
