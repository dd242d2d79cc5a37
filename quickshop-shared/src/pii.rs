//! Masking helpers for buyer data that is shown back on public order pages.
//!
//! Order lookups are unauthenticated (anyone holding the short order id can
//! open the page), so identifying fields are partially starred out before they
//! leave the API.

/// Keeps the head of `s` and stars out the rest.
///
/// If `delimiter` occurs in `s`, everything up to and including its first
/// occurrence is kept. Otherwise the first `keep` characters are kept. At most
/// `max_stars` asterisks are emitted.
pub fn censor_back(s: &str, keep: usize, max_stars: usize, delimiter: char) -> String {
    let chars: Vec<char> = s.chars().collect();
    if let Some(idx) = chars.iter().position(|c| *c == delimiter) {
        let head: String = chars[..=idx].iter().collect();
        return head + &"*".repeat((chars.len() - idx - 1).min(max_stars));
    }
    if chars.len() < keep {
        return s.to_string();
    }
    let head: String = chars[..keep].iter().collect();
    head + &"*".repeat((chars.len() - keep).min(max_stars))
}

/// Keeps the tail of `s` and stars out the front.
///
/// Mirror image of [`censor_back`]: the tail starting at the last `delimiter`
/// is kept, otherwise the last `keep` characters.
pub fn censor_front(s: &str, keep: usize, max_stars: usize, delimiter: char) -> String {
    let chars: Vec<char> = s.chars().collect();
    if let Some(idx) = chars.iter().rposition(|c| *c == delimiter) {
        let tail: String = chars[idx..].iter().collect();
        return "*".repeat(idx.min(max_stars)) + &tail;
    }
    if chars.len() < keep {
        return s.to_string();
    }
    let split = chars.len() - keep;
    let tail: String = chars[split..].iter().collect();
    "*".repeat(split.min(max_stars)) + &tail
}

/// Stars out the local part of an email address, leaving the domain readable.
pub fn censor_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{}@{}", censor_back(local, 3, 10, ' '), domain),
        None => censor_back(email, 3, 10, ' '),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_censor_back_keeps_first_word() {
        assert_eq!(censor_back("Tan Ah Kow", 4, 10, ' '), "Tan ******");
        assert_eq!(censor_back("Beatrice", 4, 10, ' '), "Beat****");
        assert_eq!(censor_back("Al", 4, 10, ' '), "Al");
    }

    #[test]
    fn test_censor_back_caps_stars() {
        let long = "a".repeat(40);
        assert_eq!(censor_back(&long, 4, 10, ' '), format!("aaaa{}", "*".repeat(10)));
    }

    #[test]
    fn test_censor_front_keeps_tail() {
        assert_eq!(censor_front("U2345678A", 4, 10, ' '), "*****678A");
        assert_eq!(censor_front("cs_test_abcdefghij", 8, 10, ' '), "**********cdefghij");
        assert_eq!(censor_front("abc", 4, 10, ' '), "abc");
    }

    #[test]
    fn test_censor_email() {
        assert_eq!(censor_email("johndoe@e.ntu.edu.sg"), "joh****@e.ntu.edu.sg");
        assert_eq!(censor_email("jo@ntu.edu.sg"), "jo@ntu.edu.sg");
    }
}
