//! Positional alignment of a paper's author list with a parallel list of
//! per-author values (regions or affiliations).
//!
//! The input data is hand-curated and the secondary list is often shorter,
//! longer, a single shared value, or missing. Alignment always yields one
//! value per author; it does not try to be semantically right.

/// Which case of the (authors, secondary) length analysis applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Alignment {
    NoAuthors,
    /// No secondary entries: every author gets the fallback.
    Fallback,
    /// One secondary entry shared by several authors.
    Broadcast,
    /// Same length: one-to-one.
    Positional,
    /// More secondary entries than authors: the extras are ignored.
    Truncated,
    /// Fewer secondary entries: the last known entry fills the rest.
    Padded,
}

impl Alignment {
    pub fn classify(authors: usize, secondary: usize) -> Self {
        match (authors, secondary) {
            (0, _) => Alignment::NoAuthors,
            (_, 0) => Alignment::Fallback,
            (a, 1) if a > 1 => Alignment::Broadcast,
            (a, s) if a == s => Alignment::Positional,
            (a, s) if s > a => Alignment::Truncated,
            _ => Alignment::Padded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::NoAuthors => "no_authors",
            Alignment::Fallback => "fallback",
            Alignment::Broadcast => "broadcast",
            Alignment::Positional => "positional",
            Alignment::Truncated => "truncated",
            Alignment::Padded => "padded",
        }
    }
}

/// Align `secondary` to `authors`, returning exactly `authors.len()` values.
/// Empty secondary entries are replaced by `fallback` one by one.
pub fn align<'a, A, S>(authors: &[A], secondary: &'a [S], fallback: &'a str) -> Vec<&'a str>
where
    S: AsRef<str>,
{
    align_with_case(authors, secondary, fallback).0
}

pub fn align_with_case<'a, A, S>(
    authors: &[A],
    secondary: &'a [S],
    fallback: &'a str,
) -> (Vec<&'a str>, Alignment)
where
    S: AsRef<str>,
{
    let n = authors.len();
    let or_fallback = |s: &'a S| -> &'a str {
        let v = s.as_ref();
        if v.trim().is_empty() {
            fallback
        } else {
            v
        }
    };

    let case = Alignment::classify(n, secondary.len());
    let values = match case {
        Alignment::NoAuthors => Vec::new(),
        Alignment::Fallback => vec![fallback; n],
        Alignment::Broadcast => vec![or_fallback(&secondary[0]); n],
        Alignment::Positional | Alignment::Truncated => {
            secondary[..n].iter().map(or_fallback).collect()
        }
        Alignment::Padded => {
            let last_known = secondary
                .iter()
                .rev()
                .map(|s| s.as_ref())
                .find(|v| !v.trim().is_empty())
                .unwrap_or(fallback);
            let mut values: Vec<&str> = secondary.iter().map(or_fallback).collect();
            values.resize(n, last_known);
            values
        }
    };
    (values, case)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC: [&str; 3] = ["A", "B", "C"];

    #[test]
    fn single_entry_is_broadcast() {
        assert_eq!(align(&ABC, &["X"], "Z"), vec!["X", "X", "X"]);
    }

    #[test]
    fn empty_secondary_uses_fallback() {
        let none: [&str; 0] = [];
        assert_eq!(align(&ABC, &none, "Z"), vec!["Z", "Z", "Z"]);
    }

    #[test]
    fn short_secondary_pads_with_last_known() {
        assert_eq!(align(&ABC, &["X", "Y"], "Z"), vec!["X", "Y", "Y"]);
    }

    #[test]
    fn long_secondary_is_truncated() {
        let (values, case) = align_with_case(&ABC, &["X", "Y", "W", "V"], "Z");
        assert_eq!(values, vec!["X", "Y", "W"]);
        assert_eq!(case, Alignment::Truncated);
    }

    #[test]
    fn equal_lengths_are_positional() {
        assert_eq!(align(&ABC, &["X", "Y", "W"], "Z"), vec!["X", "Y", "W"]);
    }

    #[test]
    fn empty_entries_are_replaced_individually() {
        assert_eq!(align(&ABC, &["X", "", "W"], "Z"), vec!["X", "Z", "W"]);
        assert_eq!(align(&ABC, &[""], "Z"), vec!["Z", "Z", "Z"]);
    }

    #[test]
    fn padding_skips_trailing_empty_entries() {
        let secondary = ["X", "", "Y", ""];
        let authors = ["a", "b", "c", "d", "e", "f"];
        assert_eq!(
            align(&authors, &secondary, "Z"),
            vec!["X", "Z", "Y", "Z", "Y", "Y"]
        );
        assert_eq!(align(&ABC, &["", ""], "Z"), vec!["Z", "Z", "Z"]);
    }

    #[test]
    fn single_author_single_entry_is_positional() {
        let (values, case) = align_with_case(&["A"], &["X"], "Z");
        assert_eq!(values, vec!["X"]);
        assert_eq!(case, Alignment::Positional);
    }

    #[test]
    fn no_authors_yields_nothing() {
        let none: [&str; 0] = [];
        let (values, case) = align_with_case(&none, &["X"], "Z");
        assert!(values.is_empty());
        assert_eq!(case, Alignment::NoAuthors);
    }

    #[test]
    fn output_length_always_matches_authors() {
        let secondaries: [&[&str]; 5] = [&[], &["X"], &["X", "Y"], &["", "Y", ""], &["1", "2", "3", "4", "5"]];
        for n in 0..6 {
            let authors: Vec<String> = (0..n).map(|i| format!("a{}", i)).collect();
            for sec in secondaries {
                assert_eq!(align(&authors, sec, "Z").len(), n);
            }
        }
    }

    #[test]
    fn classify_is_total() {
        assert_eq!(Alignment::classify(0, 0), Alignment::NoAuthors);
        assert_eq!(Alignment::classify(2, 0), Alignment::Fallback);
        assert_eq!(Alignment::classify(2, 1), Alignment::Broadcast);
        assert_eq!(Alignment::classify(2, 2), Alignment::Positional);
        assert_eq!(Alignment::classify(2, 3), Alignment::Truncated);
        assert_eq!(Alignment::classify(3, 2), Alignment::Padded);
    }
}
