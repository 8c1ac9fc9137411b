/// A selectable country for phone entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    pub name: &'static str,
    pub dial_code: &'static str,
    pub iso: &'static str,
    /// Exact number of digits a phone number needs, without the dial code.
    pub digits: usize,
}

pub const DEFAULT_DIAL_CODE: &str = "+34";

/// Sorted by name.
pub const COUNTRIES: &[Country] = &[
    Country { name: "Alemania", dial_code: "+49", iso: "de", digits: 11 },
    Country { name: "Argentina", dial_code: "+54", iso: "ar", digits: 10 },
    Country { name: "Bolivia", dial_code: "+591", iso: "bo", digits: 8 },
    Country { name: "Brasil", dial_code: "+55", iso: "br", digits: 11 },
    Country { name: "Canadá", dial_code: "+1", iso: "ca", digits: 10 },
    Country { name: "Chile", dial_code: "+56", iso: "cl", digits: 9 },
    Country { name: "China", dial_code: "+86", iso: "cn", digits: 11 },
    Country { name: "Colombia", dial_code: "+57", iso: "co", digits: 10 },
    Country { name: "Costa Rica", dial_code: "+506", iso: "cr", digits: 8 },
    Country { name: "Cuba", dial_code: "+53", iso: "cu", digits: 8 },
    Country { name: "Ecuador", dial_code: "+593", iso: "ec", digits: 9 },
    Country { name: "El Salvador", dial_code: "+503", iso: "sv", digits: 8 },
    Country { name: "España", dial_code: "+34", iso: "es", digits: 9 },
    Country { name: "Estados Unidos", dial_code: "+1", iso: "us", digits: 10 },
    Country { name: "Francia", dial_code: "+33", iso: "fr", digits: 9 },
    Country { name: "Guatemala", dial_code: "+502", iso: "gt", digits: 8 },
    Country { name: "Honduras", dial_code: "+504", iso: "hn", digits: 8 },
    Country { name: "India", dial_code: "+91", iso: "in", digits: 10 },
    Country { name: "Italia", dial_code: "+39", iso: "it", digits: 10 },
    Country { name: "Japón", dial_code: "+81", iso: "jp", digits: 10 },
    Country { name: "México", dial_code: "+52", iso: "mx", digits: 10 },
    Country { name: "Nicaragua", dial_code: "+505", iso: "ni", digits: 8 },
    Country { name: "Panamá", dial_code: "+507", iso: "pa", digits: 8 },
    Country { name: "Paraguay", dial_code: "+595", iso: "py", digits: 9 },
    Country { name: "Perú", dial_code: "+51", iso: "pe", digits: 9 },
    Country { name: "Portugal", dial_code: "+351", iso: "pt", digits: 9 },
    Country { name: "Reino Unido", dial_code: "+44", iso: "gb", digits: 10 },
    Country { name: "República Dominicana", dial_code: "+1-809", iso: "do", digits: 10 },
    Country { name: "Uruguay", dial_code: "+598", iso: "uy", digits: 8 },
    Country { name: "Venezuela", dial_code: "+58", iso: "ve", digits: 10 },
];

/// Index of the first country with this dial code, or of Spain.
pub fn index_by_dial_code(code: &str) -> usize {
    let code = code.trim();
    COUNTRIES
        .iter()
        .position(|c| c.dial_code == code)
        .or_else(|| COUNTRIES.iter().position(|c| c.dial_code == DEFAULT_DIAL_CODE))
        .unwrap_or(0)
}

/// Keep only ASCII digits, the way the phone input filters keystrokes.
pub fn digits_only(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

impl Country {
    pub fn accepts(&self, digits: &str) -> bool {
        digits.len() == self.digits && digits.chars().all(|c| c.is_ascii_digit())
    }

    /// Phone string as stored: `"{dial_code} {digits}"`.
    pub fn format_phone(&self, digits: &str) -> String {
        format!("{} {}", self.dial_code, digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_by_name() {
        let names: Vec<_> = COUNTRIES.iter().map(|c| c.name).collect();
        let mut sorted = names.clone();
        sorted.sort_by_key(|name| deaccent(name));
        assert_eq!(names, sorted);
    }

    fn deaccent(name: &str) -> String {
        name.chars()
            .map(|c| match c {
                'á' => 'a',
                'é' => 'e',
                'ó' => 'o',
                'ú' => 'u',
                'ñ' => 'n',
                other => other,
            })
            .collect::<String>()
            .to_lowercase()
    }

    #[test]
    fn test_default_is_spain() {
        let spain = COUNTRIES[index_by_dial_code("+34")];
        assert_eq!(spain.name, "España");
        assert_eq!(spain.digits, 9);
        assert_eq!(COUNTRIES[index_by_dial_code("+999")].dial_code, "+34");
    }

    #[test]
    fn test_accepts_exact_length_only() {
        let spain = COUNTRIES[index_by_dial_code("+34")];
        assert!(!spain.accepts("123"));
        assert!(!spain.accepts("1234567890"));
        assert!(spain.accepts("123456789"));
        assert!(!spain.accepts("12345678a"));
    }

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("600-11 22a2"), "60011222");
        assert_eq!(digits_only("abc"), "");
    }

    #[test]
    fn test_format_phone() {
        let spain = COUNTRIES[index_by_dial_code("+34")];
        assert_eq!(spain.format_phone("123456789"), "+34 123456789");
    }
}
