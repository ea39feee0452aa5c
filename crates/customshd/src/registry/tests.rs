//! Registry construction and resolution tests.

use std::sync::{Arc, Mutex};

use rstest::rstest;

use super::*;

fn echo_prefix(_: &(), args: &Args<'_>, out: &mut Vec<u8>) -> HandlerResult {
    out.extend_from_slice(args.prefix());
    Ok(())
}

fn registry_of(prefixes: &[&str]) -> ModuleRegistry {
    let mut builder = RegistryBuilder::new();
    {
        let mut binder = builder.unguarded(());
        for prefix in prefixes {
            binder.bind(prefix, echo_prefix);
        }
    }
    builder.finalize().expect("finalize registry")
}

fn resolved(registry: &ModuleRegistry, query: &str) -> Option<String> {
    registry
        .resolve(query.as_bytes())
        .ok()
        .map(|module| String::from_utf8_lossy(module.prefix()).into_owned())
}

fn brute_force(prefixes: &[&str], query: &str) -> Option<String> {
    prefixes
        .iter()
        .filter(|prefix| query.starts_with(**prefix))
        .max_by_key(|prefix| prefix.len())
        .map(|prefix| (*prefix).to_owned())
}

/// Every string over `alphabet` up to `max_len` characters.
fn all_strings(alphabet: &[char], max_len: usize) -> Vec<String> {
    let mut out = vec![String::new()];
    let mut frontier = vec![String::new()];
    for _ in 0..max_len {
        let next: Vec<String> = frontier
            .iter()
            .flat_map(|stem| {
                alphabet.iter().map(move |letter| {
                    let mut grown = stem.clone();
                    grown.push(*letter);
                    grown
                })
            })
            .collect();
        out.extend(next.iter().cloned());
        frontier = next;
    }
    out
}

#[rstest]
#[case::exact("ab", Some("ab"))]
#[case::longer_query("abd", Some("ab"))]
#[case::longest_wins("abcz", Some("abc"))]
#[case::shortest_only("a", Some("a"))]
#[case::too_short("", None)]
#[case::no_common_start("b", None)]
fn resolves_nested_prefixes(#[case] query: &str, #[case] expected: Option<&str>) {
    let registry = registry_of(&["a", "ab", "abc"]);
    assert_eq!(resolved(&registry, query).as_deref(), expected);
}

#[rstest]
#[case("aa", Some("aa"))]
#[case("ab", Some("ab"))]
#[case("abx", Some("ab"))]
#[case("ac", Some("a"))]
#[case("aab", Some("aa"))]
fn resolves_siblings(#[case] query: &str, #[case] expected: Option<&str>) {
    let registry = registry_of(&["a", "aa", "ab", "abc"]);
    assert_eq!(resolved(&registry, query).as_deref(), expected);
}

#[rstest]
#[case::nested(&["a", "ab", "abc"])]
#[case::siblings(&["a", "aa", "ab", "abc"])]
#[case::disjoint(&["ab", "ba", "bbb"])]
#[case::deep_gap(&["a", "abbb", "abab", "b"])]
#[case::catch_all(&["", "ab", "b"])]
fn matches_brute_force_longest_prefix(#[case] prefixes: &[&str]) {
    let registry = registry_of(prefixes);
    for query in all_strings(&['a', 'b', 'c'], 5) {
        assert_eq!(
            resolved(&registry, &query),
            brute_force(prefixes, &query),
            "query {query:?} against {prefixes:?}"
        );
    }
}

#[test]
fn empty_registry_resolves_nothing() {
    let registry = RegistryBuilder::new().finalize().expect("finalize");
    assert!(registry.is_empty());
    assert!(matches!(
        registry.resolve(b"anything"),
        Err(ResolveError::NotFound { .. })
    ));
}

#[test]
fn records_shortest_prefix_length() {
    let registry = registry_of(&["this is a prefix ", "this is a ", "a-this is a "]);
    assert_eq!(registry.min_prefix_len(), "this is a ".len());
    assert_eq!(
        resolved(&registry, "this is a prefix zoo").as_deref(),
        Some("this is a prefix ")
    );
    assert_eq!(
        resolved(&registry, "this is a test").as_deref(),
        Some("this is a ")
    );
    assert_eq!(resolved(&registry, "this is").as_deref(), None);
}

#[test]
fn duplicate_prefix_is_rejected() {
    let mut builder = RegistryBuilder::new();
    builder
        .unguarded(())
        .bind("dup", echo_prefix)
        .bind("dup", echo_prefix);
    let error = builder.finalize().expect_err("duplicates must fail");
    assert_eq!(
        error,
        RegistryError::DuplicatePrefix {
            prefix: "dup".to_owned()
        }
    );
}

#[test]
fn invalid_pattern_is_rejected_at_bind_time() {
    let mut builder = RegistryBuilder::new();
    let result = builder
        .unguarded(())
        .bind_pattern("bad ", "(unclosed", echo_prefix)
        .map(|_| ());
    assert!(matches!(result, Err(RegistryError::InvalidPattern { .. })));
}

#[test]
fn pattern_must_cover_whole_argument() {
    let mut builder = RegistryBuilder::new();
    builder
        .unguarded(())
        .bind_pattern("num ", r"\d+", |_: &(), args: &Args<'_>, out: &mut Vec<u8>| {
            out.extend_from_slice(args.capture(0).unwrap_or_default());
            Ok(())
        })
        .expect("valid pattern");
    let registry = builder.finalize().expect("finalize");
    let module = registry.resolve(b"num 42").expect("resolve");
    assert_eq!(module.convention(), Convention::UnguardedPattern);

    let mut out = Vec::new();
    module.invoke(b"42", &mut out).expect("digits accepted");
    assert_eq!(out, b"42");

    out.clear();
    assert_eq!(
        module.invoke(b"42x", &mut out),
        Err(InvokeError::BadArgument)
    );
    assert!(out.is_empty());
}

#[test]
fn guarded_handler_reports_contention() {
    let state = Arc::new(Mutex::new(0_u32));
    let mut builder = RegistryBuilder::new();
    builder.guarded_shared(Arc::clone(&state)).bind(
        "bump",
        |count: &mut u32, _: &Args<'_>, _: &mut Vec<u8>| {
            *count += 1;
            Ok(())
        },
    );
    let registry = builder.finalize().expect("finalize");
    let module = registry.resolve(b"bump").expect("resolve");
    assert!(module.convention().is_guarded());

    let held = state.lock().expect("lock state");
    assert_eq!(
        module.invoke(b"", &mut Vec::new()),
        Err(InvokeError::Locked)
    );
    drop(held);

    module.invoke(b"", &mut Vec::new()).expect("uncontended call");
    assert_eq!(*state.lock().expect("lock state"), 1);
}

#[test]
fn guarded_pattern_checks_lock_before_argument() {
    let state = Arc::new(Mutex::new(()));
    let mut builder = RegistryBuilder::new();
    builder
        .guarded_shared(Arc::clone(&state))
        .bind_pattern("only ", "ok", |_: &mut (), _: &Args<'_>, _: &mut Vec<u8>| {
            Ok(())
        })
        .expect("valid pattern");
    let registry = builder.finalize().expect("finalize");
    let module = registry.resolve(b"only bad").expect("resolve");

    let held = state.lock().expect("lock state");
    assert_eq!(
        module.invoke(b"bad", &mut Vec::new()),
        Err(InvokeError::Locked)
    );
    drop(held);
    assert_eq!(
        module.invoke(b"bad", &mut Vec::new()),
        Err(InvokeError::BadArgument)
    );
}

#[test]
fn remaining_strips_the_prefix() {
    let registry = registry_of(&["echo "]);
    let module = registry.resolve(b"echo hi").expect("resolve");
    assert_eq!(module.remaining(b"echo hi"), b"hi");
}

#[test]
fn modules_are_listed_in_prefix_order_with_their_conventions() {
    let mut builder = RegistryBuilder::new();
    builder
        .guarded_shared(Arc::new(Mutex::new(())))
        .bind("lock ", |_: &mut (), _: &Args<'_>, _: &mut Vec<u8>| Ok(()));
    builder
        .unguarded(())
        .bind("echo ", echo_prefix)
        .bind_pattern("add ", r"\d+", echo_prefix)
        .expect("valid pattern");
    let registry = builder.finalize().expect("finalize");

    let listed: Vec<(String, bool, bool)> = registry
        .modules()
        .map(|module| {
            let convention = module.convention();
            (
                String::from_utf8_lossy(module.prefix()).into_owned(),
                convention.is_guarded(),
                convention.has_pattern(),
            )
        })
        .collect();
    assert_eq!(
        listed,
        vec![
            ("add ".to_owned(), false, true),
            ("echo ".to_owned(), false, false),
            ("lock ".to_owned(), true, false),
        ]
    );
}
