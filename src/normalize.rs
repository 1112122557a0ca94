//! Text normalization applied to every utterance before tokenization.
//!
//! [`BasicNormalizer`] only does the cleanup that holds for any language.
//! [`SpelledNumberNormalizer`] also writes digits out as English words, so a
//! letter vocabulary has something to align "42" against.

/// Rewrites utterance text into the form the scorer's vocabulary expects.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

/// Folds full-width ASCII, drops quotes and commas, collapses whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicNormalizer;

impl TextNormalizer for BasicNormalizer {
    fn normalize(&self, text: &str) -> String {
        let folded: String = text
            .chars()
            .map(fold_full_width)
            .filter(|c| !matches!(c, '"' | ','))
            .collect();
        folded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Maps U+FF01..U+FF5E to ASCII and the ideographic space to a plain space.
fn fold_full_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

/// [`BasicNormalizer`], then every run of ASCII digits spelled in English.
///
/// `3.5` becomes "three point five"; digits after the point are read one
/// at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpelledNumberNormalizer;

impl TextNormalizer for SpelledNumberNormalizer {
    fn normalize(&self, text: &str) -> String {
        let basic = BasicNormalizer.normalize(text);
        let mut out = String::with_capacity(basic.len());
        let mut rest = basic.as_str();
        while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
            out.push_str(&rest[..start]);
            let len = number_len(&rest[start..]);
            out.push(' ');
            out.push_str(&spell_number(&rest[start..start + len]));
            out.push(' ');
            rest = &rest[start + len..];
        }
        out.push_str(rest);
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Byte length of the number at the start of `s`: digits, optionally a
/// point followed by more digits.
fn number_len(s: &str) -> usize {
    let digits = |t: &str| t.bytes().take_while(u8::is_ascii_digit).count();
    let whole = digits(s);
    match s[whole..].strip_prefix('.') {
        Some(after) if digits(after) > 0 => whole + 1 + digits(after),
        _ => whole,
    }
}

fn spell_number(number: &str) -> String {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (number, None),
    };
    let mut words = match whole.parse::<u64>() {
        Ok(n) => integer_to_words(n),
        // Too long for u64: read it digit by digit.
        Err(_) => digits_to_words(whole),
    };
    if let Some(fraction) = fraction {
        words.push_str(" point ");
        words.push_str(&digits_to_words(fraction));
    }
    words
}

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const SCALES: [(u64, &str); 6] = [
    (1_000_000_000_000_000_000, "quintillion"),
    (1_000_000_000_000_000, "quadrillion"),
    (1_000_000_000_000, "trillion"),
    (1_000_000_000, "billion"),
    (1_000_000, "million"),
    (1_000, "thousand"),
];

fn integer_to_words(mut n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }
    let mut parts = Vec::new();
    for (scale, name) in SCALES {
        if n >= scale {
            parts.push(format!("{} {name}", below_thousand(n / scale)));
            n %= scale;
        }
    }
    if n > 0 {
        parts.push(below_thousand(n));
    }
    parts.join(" ")
}

/// Words for 1..=999.
fn below_thousand(n: u64) -> String {
    let mut parts = Vec::new();
    if n >= 100 {
        parts.push(format!("{} hundred", ONES[(n / 100) as usize]));
    }
    let rest = (n % 100) as usize;
    match rest {
        0 => {}
        1..=19 => parts.push(ONES[rest].to_string()),
        _ if rest % 10 == 0 => parts.push(TENS[rest / 10].to_string()),
        _ => parts.push(format!("{} {}", TENS[rest / 10], ONES[rest % 10])),
    }
    parts.join(" ")
}

fn digits_to_words(digits: &str) -> String {
    digits
        .bytes()
        .map(|b| ONES[(b - b'0') as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_quotes_and_commas() {
        assert_eq!(
            BasicNormalizer.normalize(r#"He said, "hello""#),
            "He said hello"
        );
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(BasicNormalizer.normalize("  a \t b\n c  "), "a b c");
    }

    #[test]
    fn test_folds_full_width_ascii() {
        assert_eq!(BasicNormalizer.normalize("ＡＢＣ　１２３"), "ABC 123");
    }

    #[test]
    fn test_keeps_other_scripts() {
        assert_eq!(BasicNormalizer.normalize("こんにちは 世界"), "こんにちは 世界");
    }

    #[test]
    fn test_normalizer_is_object_safe() {
        let n: Box<dyn TextNormalizer> = Box::new(BasicNormalizer);
        assert_eq!(n.normalize("x,y"), "xy");
    }

    #[test]
    fn test_spells_integers() {
        let n = SpelledNumberNormalizer;
        assert_eq!(n.normalize("0"), "zero");
        assert_eq!(n.normalize("15"), "fifteen");
        assert_eq!(n.normalize("40"), "forty");
        assert_eq!(n.normalize("123"), "one hundred twenty three");
        assert_eq!(
            n.normalize("2,024,007"),
            "two million twenty four thousand seven"
        );
    }

    #[test]
    fn test_spells_decimals_digit_by_digit() {
        assert_eq!(
            SpelledNumberNormalizer.normalize("pi is 3.14"),
            "pi is three point one four"
        );
        assert_eq!(
            SpelledNumberNormalizer.normalize("version 2.05"),
            "version two point zero five"
        );
    }

    #[test]
    fn test_trailing_point_is_not_a_decimal() {
        assert_eq!(
            SpelledNumberNormalizer.normalize("chapter 7."),
            "chapter seven ."
        );
    }

    #[test]
    fn test_numbers_glued_to_words_are_separated() {
        assert_eq!(
            SpelledNumberNormalizer.normalize("room 12b on floor３"),
            "room twelve b on floor three"
        );
    }

    #[test]
    fn test_oversized_number_is_read_digit_by_digit() {
        let spelled = SpelledNumberNormalizer.normalize("99999999999999999999");
        assert_eq!(spelled.split(' ').count(), 20);
        assert!(spelled.split(' ').all(|w| w == "nine"));
    }

    #[test]
    fn test_largest_integer_spells() {
        let spelled = SpelledNumberNormalizer.normalize(&u64::MAX.to_string());
        assert!(spelled.starts_with("eighteen quintillion"));
        assert!(spelled.ends_with("six hundred fifteen"));
    }
}
