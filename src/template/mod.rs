//! # Template Substitution
//!
//! `$name` / `${name}` placeholders resolved against a flat variable map.
//! `$$` is an escaped dollar sign. Substitution is best effort: placeholders
//! without a binding stay in the output exactly as written.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([_A-Za-z][_A-Za-z0-9]*)|\{([_A-Za-z][_A-Za-z0-9]*)\})")
        .expect("placeholder pattern is valid")
});

/// Outcome of a substitution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    /// Every placeholder had a binding.
    Complete(String),
    /// Some placeholders had no binding and were left verbatim.
    Partial {
        text: String,
        unresolved: Vec<String>,
    },
}

impl Substitution {
    pub fn is_complete(&self) -> bool {
        matches!(self, Substitution::Complete(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Substitution::Complete(text) => text,
            Substitution::Partial { text, .. } => text,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Substitution::Complete(text) => text,
            Substitution::Partial { text, .. } => text,
        }
    }
}

pub fn substitute(template: &str, variables: &HashMap<String, String>) -> Substitution {
    let mut unresolved = Vec::new();
    let text = PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match variables.get(name) {
                Some(value) => value.clone(),
                None => {
                    unresolved.push(name.to_string());
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    if unresolved.is_empty() {
        Substitution::Complete(text)
    } else {
        Substitution::Partial { text, unresolved }
    }
}

/// Substitute what can be resolved and keep the rest verbatim.
pub fn safe_substitute(template: &str, variables: &HashMap<String, String>) -> String {
    substitute(template, variables).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_both_placeholder_forms() {
        let variables = vars(&[("host", "example.com"), ("port", "8080")]);
        let result = substitute("https://$host:${port}/api", &variables);
        assert_eq!(result, Substitution::Complete("https://example.com:8080/api".into()));
    }

    #[test]
    fn braces_delimit_names() {
        let variables = vars(&[("id", "7")]);
        assert_eq!(safe_substitute("${id}th", &variables), "7th");
        assert_eq!(safe_substitute("$idth", &variables), "$idth");
    }

    #[test]
    fn unresolved_placeholders_stay_verbatim() {
        let variables = vars(&[("known", "yes")]);
        let result = substitute("$known $unknown ${other}", &variables);
        assert_eq!(
            result,
            Substitution::Partial {
                text: "yes $unknown ${other}".into(),
                unresolved: vec!["unknown".into(), "other".into()],
            }
        );
    }

    #[test]
    fn escaped_dollar_collapses() {
        let variables = vars(&[("amount", "5")]);
        assert_eq!(safe_substitute("$$$amount", &variables), "$5");
    }

    #[test]
    fn text_without_placeholders_is_untouched() {
        let result = substitute("plain text, 100% $ 5", &HashMap::new());
        assert!(result.is_complete());
        assert_eq!(result.as_str(), "plain text, 100% $ 5");
    }
}
