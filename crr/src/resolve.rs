//! Singleton resolution.
//!
//! Every lookup in the engine goes through [`resolve_singleton`]: filter the
//! candidates, then apply one policy. Exactly one match is found. Zero
//! matches either ask the caller to create the resource or fail as not
//! found. More than one match always fails.

use crate::error::{ReconcileError, ResourceKind};
use regex::{Regex, RegexBuilder};

/// What zero matches means for a resolution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnZero {
    Create,
    NotFound,
}

/// Outcome of a resolution that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Found(T),
    /// Only produced under [`OnZero::Create`].
    Missing,
}

/// Resolve exactly one candidate satisfying `predicate`.
pub fn resolve_singleton<T, I, P>(
    kind: ResourceKind,
    key: &str,
    candidates: I,
    on_zero: OnZero,
    predicate: P,
) -> Result<Resolution<T>, ReconcileError>
where
    I: IntoIterator<Item = T>,
    P: FnMut(&T) -> bool,
{
    let matches: Vec<T> = candidates.into_iter().filter(predicate).collect();
    singleton(kind, key, matches, on_zero)
}

/// Like [`resolve_singleton`], but when `primary` matches several
/// candidates they are narrowed with `tiebreak`. The narrowing must leave
/// exactly one; narrowing to none is ambiguity, not absence.
pub fn resolve_with_tiebreak<T, I, P, Q>(
    kind: ResourceKind,
    key: &str,
    candidates: I,
    on_zero: OnZero,
    primary: P,
    mut tiebreak: Q,
) -> Result<Resolution<T>, ReconcileError>
where
    I: IntoIterator<Item = T>,
    P: FnMut(&T) -> bool,
    Q: FnMut(&T) -> bool,
{
    let matches: Vec<T> = candidates.into_iter().filter(primary).collect();
    if matches.len() <= 1 {
        return singleton(kind, key, matches, on_zero);
    }
    let before = matches.len();
    let mut narrowed: Vec<T> = matches.into_iter().filter(|c| tiebreak(c)).collect();
    if narrowed.len() == 1
        && let Some(only) = narrowed.pop()
    {
        return Ok(Resolution::Found(only));
    }
    Err(ReconcileError::Ambiguous {
        kind,
        key: key.to_string(),
        count: if narrowed.is_empty() {
            before
        } else {
            narrowed.len()
        },
    })
}

fn singleton<T>(
    kind: ResourceKind,
    key: &str,
    matches: Vec<T>,
    on_zero: OnZero,
) -> Result<Resolution<T>, ReconcileError> {
    let count = matches.len();
    let mut iter = matches.into_iter();
    match (iter.next(), count) {
        (Some(only), 1) => Ok(Resolution::Found(only)),
        (None, _) => match on_zero {
            OnZero::Create => Ok(Resolution::Missing),
            OnZero::NotFound => Err(ReconcileError::NotFound {
                kind,
                key: key.to_string(),
            }),
        },
        _ => Err(ReconcileError::Ambiguous {
            kind,
            key: key.to_string(),
            count,
        }),
    }
}

/// Case-insensitive name matcher. User-supplied fragments are matched
/// literally.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    fn build(pattern: String) -> Result<Self, ReconcileError> {
        RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map(|regex| Self { regex })
            .map_err(|source| ReconcileError::Pattern { pattern, source })
    }

    /// `<product>:` at the start, `<branch> branch` somewhere after it.
    pub fn plan(product: &str, branch: &str) -> Result<Self, ReconcileError> {
        Self::build(format!(
            "^{}:.*{} branch",
            regex::escape(product),
            regex::escape(branch)
        ))
    }

    /// Name ends with `suffix`.
    pub fn suffix(suffix: &str) -> Result<Self, ReconcileError> {
        Self::build(format!("{}$", regex::escape(suffix)))
    }

    /// Name contains `fragment`.
    pub fn contains(fragment: &str) -> Result<Self, ReconcileError> {
        Self::build(regex::escape(fragment))
    }

    /// Whole name equals `text`.
    pub fn exact(text: &str) -> Result<Self, ReconcileError> {
        Self::build(format!("^{}$", regex::escape(text)))
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_singleton_found() {
        let result =
            resolve_singleton(ResourceKind::Build, "k", vec![1, 2, 3], OnZero::NotFound, |n| {
                *n == 2
            })
            .unwrap();
        assert_eq!(result, Resolution::Found(2));
    }

    #[test]
    fn test_zero_matches_follow_policy() {
        let created =
            resolve_singleton(ResourceKind::Build, "k", vec![1], OnZero::Create, |n| *n == 9)
                .unwrap();
        assert_eq!(created, Resolution::Missing);

        let err =
            resolve_singleton(ResourceKind::TestPlan, "k", vec![1], OnZero::NotFound, |n| {
                *n == 9
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_multiple_matches_always_fail() {
        for policy in [OnZero::Create, OnZero::NotFound] {
            let err =
                resolve_singleton(ResourceKind::Environment, "k", vec![1, 1], policy, |_| true)
                    .unwrap_err();
            assert!(matches!(err, ReconcileError::Ambiguous { count: 2, .. }));
        }
    }

    #[test]
    fn test_tiebreak_narrows_to_one() {
        let names = vec!["main:abc123", "release:abc123", "main:fff000"];
        let result = resolve_with_tiebreak(
            ResourceKind::Build,
            "abc123",
            names,
            OnZero::Create,
            |n| n.contains("abc123"),
            |n| n.starts_with("release"),
        )
        .unwrap();
        assert_eq!(result, Resolution::Found("release:abc123"));
    }

    #[test]
    fn test_tiebreak_to_zero_is_ambiguous() {
        let err = resolve_with_tiebreak(
            ResourceKind::Build,
            "abc123",
            vec!["main:abc123", "release:abc123"],
            OnZero::Create,
            |n| n.contains("abc123"),
            |n| n.starts_with("dunfell"),
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::Ambiguous { count: 2, .. }));
    }

    #[test]
    fn test_tiebreak_not_used_for_single_match() {
        let result = resolve_with_tiebreak(
            ResourceKind::Build,
            "abc123",
            vec!["main:abc123"],
            OnZero::Create,
            |n| n.contains("abc123"),
            |_| false,
        )
        .unwrap();
        assert_eq!(result, Resolution::Found("main:abc123"));
    }

    #[test]
    fn test_plan_matcher() {
        let m = Matcher::plan("Yocto", "master").unwrap();
        assert!(m.is_match("yocto: 2.1 master branch"));
        assert!(m.is_match("YOCTO:Master branch"));
        assert!(!m.is_match("poky yocto: master branch"));
        assert!(!m.is_match("yocto: master"));
    }

    #[test]
    fn test_suffix_and_exact() {
        let env = Matcher::suffix("qemux86").unwrap();
        assert!(env.is_match("placeholder - QEMUX86"));
        assert!(!env.is_match("qemux86-64"));

        let alias = Matcher::exact("boot.login").unwrap();
        assert!(alias.is_match("BOOT.LOGIN"));
        assert!(!alias.is_match("bootXlogin"));
        assert!(!alias.is_match("boot.login.ssh"));
    }

    proptest! {
        #[test]
        fn test_fragments_match_literally(fragment in "[ -~]{1,24}") {
            let m = Matcher::contains(&fragment).unwrap();
            let haystack = format!("prefix {fragment} suffix");
            prop_assert!(m.is_match(&haystack));
        }

        #[test]
        fn test_placeholder_name_found_by_suffix(env in "[a-zA-Z0-9_. -]{1,24}") {
            let m = Matcher::suffix(&env).unwrap();
            let placeholder = format!("placeholder - {env}");
            prop_assert!(m.is_match(&placeholder));
        }

        #[test]
        fn test_exact_is_case_insensitive(alias in "[a-zA-Z0-9_.]{1,24}") {
            let m = Matcher::exact(&alias).unwrap();
            prop_assert!(m.is_match(&alias.to_uppercase()));
            let suffixed = format!("{alias}x");
            prop_assert!(!m.is_match(&suffixed));
        }

        #[test]
        fn test_singleton_never_picks_among_many(n in 2usize..20) {
            let result = resolve_singleton(
                ResourceKind::TestRun, "k", 0..n, OnZero::Create, |_| true,
            );
            let is_ambiguous = matches!(result, Err(ReconcileError::Ambiguous { .. }));
            prop_assert!(is_ambiguous);
        }
    }
}
