/// Parses operator input lines into authorization codes
pub struct CodeParser;

impl CodeParser {
    /// Integer value of the leading `[+-]digits` of the trimmed line.
    ///
    /// Input without a leading number parses to 0 and is simply a wrong code;
    /// there is no format error. Overflow saturates.
    pub fn parse_code(input: &str) -> i64 {
        let trimmed = input.trim();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let mut value: i64 = 0;
        for ch in digits.bytes().take_while(u8::is_ascii_digit) {
            value = value
                .saturating_mul(10)
                .saturating_add(i64::from(ch - b'0'));
        }

        if negative {
            -value
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_codes() {
        assert_eq!(CodeParser::parse_code("1234"), 1234);
        assert_eq!(CodeParser::parse_code("  9999\r"), 9999);
        assert_eq!(CodeParser::parse_code("+42"), 42);
        assert_eq!(CodeParser::parse_code("-7"), -7);
    }

    #[test]
    fn stops_at_first_non_digit() {
        assert_eq!(CodeParser::parse_code("1234abc"), 1234);
        assert_eq!(CodeParser::parse_code("12 34"), 12);
    }

    #[test]
    fn non_numeric_input_is_zero() {
        assert_eq!(CodeParser::parse_code(""), 0);
        assert_eq!(CodeParser::parse_code("abc"), 0);
        assert_eq!(CodeParser::parse_code("-"), 0);
    }

    #[test]
    fn overflow_saturates() {
        assert_eq!(CodeParser::parse_code("99999999999999999999999"), i64::MAX);
    }
}
