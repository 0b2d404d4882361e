/// Best guess of whether a string (usually an environment variable value) means true.
///
/// The empty string is false. Numbers are true unless they are zero. Anything else is false when
/// it starts with `N` or `F` (case-insensitive), true otherwise.
pub fn str_bool(input: &str) -> bool {
    if input.is_empty() {
        return false;
    }
    if let Ok(number) = input.trim().parse::<f64>() {
        return number != 0.0;
    }
    !input
        .to_uppercase()
        .starts_with(|c: char| c == 'N' || c == 'F')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty("", false)]
    #[case::zero("0", false)]
    #[case::zero_float("0.0", false)]
    #[case::one("1", true)]
    #[case::negative("-3", true)]
    #[case::nan("NaN", true)]
    #[case::true_word("true", true)]
    #[case::yes("Yes", true)]
    #[case::false_word("false", false)]
    #[case::false_upper("FALSE", false)]
    #[case::no("no", false)]
    #[case::nope("Nope", false)]
    #[case::off("off", true)]
    #[case::anything("TRUE", true)]
    fn interprets(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(str_bool(input), expected);
    }
}
