//! Display helpers for customer-entered text

/// Lowercase everything, then capitalize the first letter of each
/// space-separated word
pub fn to_title_case(text: &str) -> String {
    text.to_lowercase()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(to_title_case("ANA maría PÉREZ"), "Ana María Pérez");
        assert_eq!(to_title_case("calle  10"), "Calle  10");
        assert_eq!(to_title_case(""), "");
    }
}
