//! Natural-order string comparison, registered as a SQLite collation
//!
//! Splits both strings into alternating runs of digits and non-digits,
//! compares digit runs numerically and everything else case-insensitively,
//! so "Episode 2" sorts before "Episode 10".

use std::cmp::Ordering;

/// Name the collation is registered under; queries order with
/// `COLLATE natural_sort`. NATURAL itself is a reserved word in SQLite.
pub const COLLATION_NAME: &str = "natural_sort";

#[derive(Debug, PartialEq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> impl Iterator<Item = Chunk<'_>> {
    let mut rest = s;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let first_is_digit = rest.chars().next().map(|c| c.is_ascii_digit())?;
        let split = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != first_is_digit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(split);
        rest = tail;
        Some(if first_is_digit {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    })
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    // Leading zeros make numeric value independent of run length, so strip
    // them before comparing by length-then-lexicographic.
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare two strings in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Digits(x)), Some(Chunk::Digits(y))) => {
                let ord = compare_digit_runs(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(Chunk::Digits(_)), Some(Chunk::Text(_))) => return Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Digits(_))) => return Ordering::Greater,
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => {
                let ord = x
                    .chars()
                    .flat_map(|c| c.to_lowercase())
                    .cmp(y.chars().flat_map(|c| c.to_lowercase()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_numbers_sort_numerically() {
        let mut names = vec!["Episode 2", "Episode 10", "Episode 1"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["Episode 1", "Episode 2", "Episode 10"]);
    }

    #[test]
    fn test_case_insensitive_text() {
        assert_eq!(natural_cmp("alien", "ALIEN"), Ordering::Equal);
        assert_eq!(natural_cmp("Alpha", "beta"), Ordering::Less);
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(natural_cmp("S01E02", "S1E2"), Ordering::Equal);
        assert_eq!(natural_cmp("007", "8"), Ordering::Less);
    }

    #[test]
    fn test_digits_before_text() {
        assert_eq!(natural_cmp("1 Thing", "A Thing"), Ordering::Less);
    }

    #[test]
    fn test_prefix_is_less() {
        assert_eq!(natural_cmp("Show", "Show 2"), Ordering::Less);
    }
}
