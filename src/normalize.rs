use serde::Serialize;
use std::fmt;

const CURRENCY_SYMBOLS: [char; 5] = ['$', '€', '£', '¥', '₹'];

/// Lookup key derived from a menu line: prices and numerals removed,
/// trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NutritionQuery(String);

impl NutritionQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NutritionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NutritionQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn normalize(text: &str) -> NutritionQuery {
    let stripped = strip_prices(text);
    NutritionQuery(stripped.trim().to_lowercase())
}

/// Removes every `(currency)?digits(.digits)?` run. Digits are any Unicode
/// numeric character, so full-width and Devanagari prices go too. A currency symbol that is
/// not followed by a digit is kept, as is a trailing dot without fraction digits.
fn strip_prices(text: &str) -> String {
    let chars = text.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(text.len());
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        let digits_start = if CURRENCY_SYMBOLS.contains(&ch) {
            i + 1
        } else {
            i
        };
        let digits_end = scan_digits(&chars, digits_start);
        if digits_end == digits_start {
            out.push(ch);
            i += 1;
            continue;
        }
        i = digits_end;
        if i < chars.len() && chars[i] == '.' {
            let fraction_end = scan_digits(&chars, i + 1);
            if fraction_end > i + 1 {
                i = fraction_end;
            }
        }
    }
    out
}

fn scan_digits(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while end < chars.len() && chars[end].is_numeric() {
        end += 1;
    }
    end
}

pub(crate) fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_price_with_currency() {
        assert_eq!(normalize("Cheeseburger $12.50").as_str(), "cheeseburger");
    }

    #[test]
    fn strips_bare_numerals_and_other_currencies() {
        assert_eq!(normalize("Iced Coffee 3").as_str(), "iced coffee");
        assert_eq!(normalize("  €7 Soupe du jour ").as_str(), "soupe du jour");
        assert_eq!(normalize("2 Eggs £4.5").as_str(), "eggs");
    }

    #[test]
    fn strips_non_ascii_digits() {
        assert_eq!(normalize("Ramen ８００").as_str(), "ramen");
        assert_eq!(normalize("चाय ५०").as_str(), "चाय");
        assert_eq!(normalize("¥１２.５０ Gyoza").as_str(), "gyoza");
        assert_eq!(normalize("₹१२०.५० Masala Dosa").as_str(), "masala dosa");
    }

    #[test]
    fn keeps_text_without_digits() {
        assert_eq!(normalize("  Caesar Salad ").as_str(), "caesar salad");
        assert_eq!(normalize("Fish & Chips").as_str(), "fish & chips");
    }

    #[test]
    fn lone_currency_symbol_and_trailing_dot_survive() {
        assert_eq!(normalize("Tea $").as_str(), "tea $");
        assert_eq!(normalize("Tea 12.").as_str(), "tea .");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "Cheeseburger $12.50",
            "Iced Coffee 3",
            "  $ 5 Hot Dog 1.2.3 ",
            "MILK SHAKE ₹120",
            "",
            "   ",
            "Crème Brûlée 9.",
            "12 34 56",
            "Ramen ８００",
            "चाय ५०.५",
            "¥１２.５０ Gyoza",
        ];
        for sample in samples {
            let once = normalize(sample);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "input: {sample:?}");
        }
    }

    #[test]
    fn title_case_capitalises_each_word() {
        assert_eq!(title_case("caesar salad"), "Caesar Salad");
        assert_eq!(title_case("mac-and-cheese"), "Mac-And-Cheese");
        assert_eq!(title_case(""), "");
    }
}
