//! Classic four-character Soundex code: first letter kept, remainder
//! encoded 1-6, vowels and H/W dropped except as separators, adjacent
//! duplicates collapsed, padded/truncated to 4 characters.

fn code_for(c: char) -> Option<u8> {
    match c.to_ascii_uppercase() {
        'B' | 'F' | 'P' | 'V' => Some(1),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some(2),
        'D' | 'T' => Some(3),
        'L' => Some(4),
        'M' | 'N' => Some(5),
        'R' => Some(6),
        _ => None,
    }
}

/// Compute the Soundex code of `s`, upper-cased. Returns `"0000"` for an
/// empty or all-non-alphabetic input.
pub fn encode(s: &str) -> String {
    let letters: Vec<char> = s.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return "0000".to_string();
    }

    let first = letters[0].to_ascii_uppercase();
    let mut code = String::new();
    code.push(first);

    let mut last_code = code_for(first);
    for &c in &letters[1..] {
        let current = code_for(c);
        if let Some(digit) = current
            && Some(digit) != last_code
        {
            code.push((b'0' + digit) as char);
        }
        // H and W do not break a run of identical consonant codes;
        // vowels reset it so a following repeat of the same consonant
        // is encoded again.
        if !matches!(c.to_ascii_uppercase(), 'H' | 'W') {
            last_code = current;
        }
        if code.len() == 4 {
            break;
        }
    }

    while code.len() < 4 {
        code.push('0');
    }
    code
}

/// Exact comparison of Soundex codes: 1.0 if equal, else 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if encode(a) == encode(b) { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robert_and_rupert_match() {
        assert_eq!(encode("Robert"), "R163");
        assert_eq!(encode("Rupert"), "R163");
    }

    #[test]
    fn ashcraft_collapses_adjacent_duplicates() {
        assert_eq!(encode("Ashcraft"), "A261");
    }

    #[test]
    fn padding_short_words() {
        assert_eq!(encode("Lee"), "L000");
    }

    #[test]
    fn empty_input() {
        assert_eq!(encode(""), "0000");
    }

    #[test]
    fn similarity_matches_equal_codes() {
        assert_eq!(similarity("Robert", "Rupert"), 1.0);
        assert_eq!(similarity("Robert", "Smith"), 0.0);
    }
}
