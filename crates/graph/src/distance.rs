//! Edit distance used to suggest likely intended promises for typos.

/// Number of suggestions reported per unrecognized promise.
pub const SUGGESTION_COUNT: usize = 3;

/// Levenshtein distance between `a` and `b` (unit cost insert/delete/substitute).
///
/// Compares chars, case-sensitively, and keeps a single row of the DP table
/// sized by the shorter input.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let mut short: Vec<char> = a.chars().collect();
    let mut long: Vec<char> = b.chars().collect();
    if short.len() > long.len() {
        std::mem::swap(&mut short, &mut long);
    }

    let mut current: Vec<usize> = (0..=short.len()).collect();
    for (i, long_ch) in long.iter().enumerate() {
        let previous = current.clone();
        current[0] = i + 1;
        for (j, short_ch) in short.iter().enumerate() {
            let add = previous[j + 1] + 1;
            let delete = current[j] + 1;
            let change = previous[j] + usize::from(short_ch != long_ch);
            current[j + 1] = add.min(delete).min(change);
        }
    }

    current[short.len()]
}

/// The `limit` candidates closest to `needle`, by distance then lexicographically.
pub fn closest<'a, I>(needle: &str, candidates: I, limit: usize) -> Vec<(usize, &'a str)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ranked: Vec<(usize, &str)> = candidates
        .into_iter()
        .map(|candidate| (levenshtein(needle, candidate), candidate))
        .collect();
    ranked.sort_unstable();
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("test", "test"), 0);
        assert_eq!(levenshtein("test", "tast"), 1);
        assert_eq!(levenshtein("abcd", "efgh"), 4);
        assert_eq!(levenshtein("abcd", "efghi"), 5);
        assert_eq!(levenshtein("efghi", "abcd"), 5);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn levenshtein_is_case_sensitive() {
        assert_eq!(levenshtein("Code", "code"), 1);
    }

    #[test]
    fn closest_breaks_ties_lexicographically() {
        let vocabulary = ["code_executed", "code_executes", "code_executer", "persistence"];
        let ranked = closest("code_executee", vocabulary, SUGGESTION_COUNT);
        assert_eq!(
            ranked,
            vec![
                (1, "code_executed"),
                (1, "code_executer"),
                (1, "code_executes"),
            ]
        );
    }

    #[test]
    fn closest_returns_fewer_when_vocabulary_is_small() {
        let ranked = closest("x", ["a"], SUGGESTION_COUNT);
        assert_eq!(ranked, vec![(1, "a")]);
    }

    proptest! {
        #[test]
        fn proptest_levenshtein_is_symmetric(a in "[a-z_]{0,12}", b in "[a-z_]{0,12}") {
            prop_assert_eq!(levenshtein(&a, &b), levenshtein(&b, &a));
        }

        #[test]
        fn proptest_levenshtein_bounded_by_longer_input(a in "[a-c]{0,10}", b in "[a-c]{0,10}") {
            let d = levenshtein(&a, &b);
            prop_assert!(d <= a.chars().count().max(b.chars().count()));
            prop_assert_eq!(d == 0, a == b);
        }
    }
}
