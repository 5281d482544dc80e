/// Longest run of one character kept by [`canonicalize`].
pub const MAX_RUN: usize = 4;

/// Letters folded to ASCII before anything else is stripped.
const SUBSTITUTIONS: &[(char, &str)] = &[
    ('Ä', "A"),
    ('Ö', "O"),
    ('Ü', "U"),
    ('ä', "A"),
    ('ö', "O"),
    ('ü', "U"),
    ('ß', "SS"),
    ('ẞ', "SS"),
    ('À', "A"),
    ('Á', "A"),
    ('Â', "A"),
    ('Å', "A"),
    ('à', "A"),
    ('á', "A"),
    ('â', "A"),
    ('å', "A"),
    ('Ç', "C"),
    ('ç', "C"),
    ('È', "E"),
    ('É', "E"),
    ('Ê', "E"),
    ('Ë', "E"),
    ('è', "E"),
    ('é', "E"),
    ('ê', "E"),
    ('ë', "E"),
    ('Ñ', "N"),
    ('ñ', "N"),
    ('Ø', "O"),
    ('ø', "O"),
];

/// Replaces accented letters through the substitution table and upper-cases
/// ASCII; everything else passes through unchanged.
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match SUBSTITUTIONS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c.to_ascii_uppercase()),
        }
    }

    out
}

/// Folded text restricted to `A-Z` and `0-9`.
pub fn strip(text: &str) -> String {
    fold(text)
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Caps every run of a repeated character at [`MAX_RUN`].
pub fn collapse_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = None;
    let mut run = 0;

    for c in text.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }

        if run <= MAX_RUN {
            out.push(c);
        }
    }

    out
}

/// Canonical plate text: folded, stripped to `A-Z0-9`, runs capped.
pub fn canonicalize(text: &str) -> String {
    collapse_runs(&strip(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_non_alphanumerics() {
        assert_eq!(canonicalize("AB-12 34!"), "AB1234");
        assert_eq!(canonicalize("m ab 1234"), "MAB1234");
    }

    #[test]
    fn folds_umlauts_and_sharp_s() {
        assert_eq!(canonicalize("MÜ-ß 12"), "MUSS12");
        assert_eq!(canonicalize("kö äb"), "KOAB");
    }

    #[test]
    fn unmapped_letters_are_dropped_after_folding() {
        assert_eq!(fold("Ж1"), "Ж1");
        assert_eq!(canonicalize("Ж1"), "1");
    }

    #[test]
    fn collapses_long_runs() {
        assert_eq!(canonicalize("AAAAAA1"), "AAAA1");
        assert_eq!(canonicalize("1111"), "1111");
        assert_eq!(canonicalize("B11111111C"), "B1111C");
    }

    #[test]
    fn runs_are_counted_after_stripping() {
        assert_eq!(canonicalize("AA-AA-AA"), "AAAA");
    }

    #[test]
    fn empty_input() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize(" -!"), "");
    }

    #[test]
    fn idempotent() {
        for s in ["AB-12 34!", "ÄÖÜß", "zzzzzzzz9", "", "x1y2z3", "OCR failed"] {
            let once = canonicalize(s);
            assert_eq!(canonicalize(&once), once);
        }
    }
}
