use strum_macros::{AsRefStr, Display, EnumString};

/// Reserved words of the query language.
///
/// `not`, `and`, `or`, `true` and `false` match case-insensitively; `None`
/// and `in` only in the spelling shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Keyword {
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "true")]
    True,
    #[strum(serialize = "false")]
    False,
    #[strum(serialize = "None")]
    Null,
}

impl Keyword {
    pub fn lookup(word: &str) -> Option<Keyword> {
        match word {
            "None" => return Some(Keyword::Null),
            "in" => return Some(Keyword::In),
            _ => {}
        }
        match word.to_ascii_lowercase().as_str() {
            "not" => Some(Keyword::Not),
            "and" => Some(Keyword::And),
            "or" => Some(Keyword::Or),
            "true" => Some(Keyword::True),
            "false" => Some(Keyword::False),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caseless_keywords() {
        assert_eq!(Keyword::lookup("AND"), Some(Keyword::And));
        assert_eq!(Keyword::lookup("Not"), Some(Keyword::Not));
        assert_eq!(Keyword::lookup("TRUE"), Some(Keyword::True));
    }

    #[test]
    fn test_case_sensitive_keywords() {
        assert_eq!(Keyword::lookup("None"), Some(Keyword::Null));
        assert_eq!(Keyword::lookup("none"), None);
        assert_eq!(Keyword::lookup("IN"), None);
        assert_eq!(Keyword::lookup("question"), None);
    }
}
