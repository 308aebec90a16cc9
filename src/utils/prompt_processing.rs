use std::collections::{HashMap, HashSet};
use regex::{Captures, Regex};
use lazy_static::lazy_static;

lazy_static! {
    pub(crate) static ref PLACEHOLDER_MATCH_RE: Regex = Regex::new(r"\{\[.*?\]\}").unwrap();
}

#[inline]
pub(crate) fn strip_format(key: &str) -> &str {
    //! Strips "{\[" and "\]}" from a matched placeholder like "{\[a\]}".
    &key[2..key.len() - 2]
}

/// Replaces every placeholder that has a filling value in `mapping`. Placeholders without a value are left as is.
///
/// The replacement is a single pass over `original`, so filling values are never scanned for placeholders.
pub(crate) fn replace_all_placeholders(original: &str, mapping: &HashMap<String, Option<String>>) -> String {
    PLACEHOLDER_MATCH_RE
        .replace_all(original, |captures: &Captures| {
            let match_text = &captures[0];
            mapping
                .get(strip_format(match_text))
                .and_then(Option::as_deref)
                .unwrap_or(match_text)
                .to_string()
        })
        .into_owned()
}

pub fn get_placeholders(string: &str) -> HashSet<String> {
    PLACEHOLDER_MATCH_RE.captures_iter(string)
        .map(|captures| strip_format(&captures[0]).to_string())
        .collect()
}

#[cfg(test)]
mod test_prompt_processing {
    use std::collections::{HashMap, HashSet};
    use super::{get_placeholders, replace_all_placeholders};

    #[test]
    fn test_get_keys() {
        let string = "{[a]}";
        let keys = get_placeholders(string);
        let expect_keys = HashSet::from(["a".to_string()]);
        assert_eq!(expect_keys, keys);

        let string = "{[a\n]}";
        let keys = get_placeholders(string);
        assert_eq!(0, keys.len());

        let string = "{[a]}    {[b]}";
        let keys = get_placeholders(string);
        let expect_keys = HashSet::from(["a".to_string(), "b".to_string()]);
        assert_eq!(expect_keys, keys);
    }

    #[test]
    fn test_css_and_script_braces_are_not_placeholders() {
        let string = "body { margin: auto; } input[type=text] { width: 100%; } if (x) { y[0] = 1; }";
        assert!(get_placeholders(string).is_empty());
    }

    #[test]
    fn test_replace() {
        let string = "{[a]} and {[b]} and {[a]}";
        let mapping = HashMap::from([
            ("a".to_string(), Some("alice".to_string())),
            ("b".to_string(), Some("bob".to_string())),
        ]);
        assert_eq!("alice and bob and alice", replace_all_placeholders(string, &mapping));
    }

    #[test]
    fn test_replaced_values_are_not_rescanned() {
        let mapping = HashMap::from([
            ("a".to_string(), Some("{[b]}".to_string())),
            ("b".to_string(), Some("bob".to_string())),
        ]);
        assert_eq!("{[b]} bob", replace_all_placeholders("{[a]} {[b]}", &mapping));
    }

    #[test]
    fn test_unfilled_placeholder_is_kept() {
        let mapping = HashMap::from([("a".to_string(), None)]);
        assert_eq!("x {[a]}", replace_all_placeholders("x {[a]}", &mapping));
    }
}
