//! Resource-pattern matching for the authorization engine (spec §4.F).
//!
//! Grounded in the original's `WildcardTrie` (`plugins/authorization_handler/
//! src/wildcard_trie.hpp`), re-expressed as a tokenize-then-backtrack
//! matcher over the pattern string rather than a trie of shared nodes — the
//! trie exists there to let many resources share prefixes cheaply; a single
//! `Vec<Seg>` per pattern, matched with ordinary recursion, gives the same
//! answer for the single-pattern lookups this engine does and needs no
//! `Rc`/`shared_ptr` bookkeeping.

/// How `*`/`+`/`#` are interpreted in a resource pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPolicy {
    /// `*` matches any substring, including across `/`. No `+`/`#`.
    Standard,
    /// `*` as in [`LookupPolicy::Standard`], plus `+` (single level) and
    /// trailing `#` (one or more — in practice zero or more, see below —
    /// trailing levels), each only recognized when bounded by `/` or the
    /// ends of the pattern.
    MqttStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seg {
    Lit(String),
    Star,
    Plus,
    /// Always the last segment when present; matches the remainder of the
    /// input unconditionally (spec/source: `"abc/#"` matches `"abc"` with
    /// zero further levels, as well as `"abc/x/y"` with two).
    Hash,
}

fn tokenize(pattern: &str, policy: LookupPolicy) -> Vec<Seg> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if c == '$'
            && chars.get(i + 1) == Some(&'{')
            && chars.get(i + 3) == Some(&'}')
            && matches!(chars.get(i + 2), Some('*') | Some('$') | Some('?'))
        {
            literal.push(chars[i + 2]);
            i += 4;
            continue;
        }

        if c == '*' {
            flush(&mut literal, &mut out);
            out.push(Seg::Star);
            i += 1;
            continue;
        }

        if policy == LookupPolicy::MqttStyle {
            let at_start = i == 0;
            let at_end = i + 1 == chars.len();
            let prev_is_sep = i > 0 && chars[i - 1] == '/';
            let next_is_sep = !at_end && chars[i + 1] == '/';

            if c == '+' && (at_start || prev_is_sep) && (at_end || next_is_sep) {
                flush(&mut literal, &mut out);
                out.push(Seg::Plus);
                i += 1;
                continue;
            }
            if c == '#' && at_end && (at_start || prev_is_sep) {
                // Drop the separator immediately before '#': Hash matches
                // the remainder unconditionally, slash or no slash.
                if literal.ends_with('/') {
                    literal.pop();
                }
                flush(&mut literal, &mut out);
                out.push(Seg::Hash);
                i += 1;
                continue;
            }
        }

        literal.push(c);
        i += 1;
    }
    flush(&mut literal, &mut out);
    out
}

fn flush(literal: &mut String, out: &mut Vec<Seg>) {
    if !literal.is_empty() {
        out.push(Seg::Lit(std::mem::take(literal)));
    }
}

fn match_segs(segs: &[Seg], input: &str) -> bool {
    match segs {
        [] => input.is_empty(),
        [Seg::Hash] => true,
        [Seg::Lit(s), rest @ ..] => input
            .strip_prefix(s.as_str())
            .is_some_and(|remaining| match_segs(rest, remaining)),
        [Seg::Star, rest @ ..] => {
            if rest.is_empty() {
                return true;
            }
            (0..=input.len())
                .filter(|&i| input.is_char_boundary(i))
                .any(|i| match_segs(rest, &input[i..]))
        }
        [Seg::Plus, rest @ ..] => {
            let boundary = input.find('/').unwrap_or(input.len());
            match_segs(rest, &input[boundary..])
        }
    }
}

/// Does `resource` match `pattern` under `policy`?
pub fn matches(pattern: &str, resource: &str, policy: LookupPolicy) -> bool {
    if pattern == resource {
        return true;
    }
    match_segs(&tokenize(pattern, policy), resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_star_matches_any_substring() {
        assert!(matches("topic/*", "topic/a/b/c", LookupPolicy::Standard));
        assert!(matches("*", "anything", LookupPolicy::Standard));
        assert!(matches("a*c", "abc", LookupPolicy::Standard));
        assert!(!matches("a*c", "abd", LookupPolicy::Standard));
    }

    #[test]
    fn escape_sequences_produce_literal_characters() {
        assert!(matches("literal-${*}-star", "literal-*-star", LookupPolicy::Standard));
        assert!(!matches("literal-${*}-star", "literal-x-star", LookupPolicy::Standard));
    }

    #[test]
    fn mqtt_plus_matches_single_level_only() {
        assert!(matches("topic/+/get", "topic/device42/get", LookupPolicy::MqttStyle));
        assert!(!matches("topic/+/get", "topic/a/b/get", LookupPolicy::MqttStyle));
    }

    #[test]
    fn mqtt_hash_matches_trailing_levels_spec_scenario_5() {
        assert!(matches(
            "topic/+/get/#",
            "topic/device42/get/state/foo",
            LookupPolicy::MqttStyle
        ));
        assert!(!matches(
            "topic/+/get/#",
            "topic/device42/set/state",
            LookupPolicy::MqttStyle
        ));
    }

    #[test]
    fn mqtt_hash_matches_bare_prefix_with_zero_extra_levels() {
        assert!(matches("abc/#", "abc", LookupPolicy::MqttStyle));
        assert!(matches("abc/#", "abc/def/ghi", LookupPolicy::MqttStyle));
    }

    #[test]
    fn standard_mode_does_not_recognize_plus_or_hash() {
        assert!(matches("topic/+", "topic/+", LookupPolicy::Standard));
        assert!(!matches("topic/+", "topic/device", LookupPolicy::Standard));
    }
}
