pub mod csv;

pub use csv::{parse_portfolio_csv, parse_questionnaire_csv, PortfolioParse};

/// What an uploaded object is, derived from its logical folder prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Portfolio,
    Questionnaire,
}

impl UploadKind {
    /// Classifies an object key like `portfolio/2026-08-31.csv` or
    /// `profile/answers.csv`. Anything else is not ours to process.
    pub fn from_object_key(key: &str) -> Option<Self> {
        let key = key.trim_start_matches('/');
        if !key.to_ascii_lowercase().ends_with(".csv") {
            return None;
        }
        if key.starts_with("portfolio/") {
            Some(UploadKind::Portfolio)
        } else if key.starts_with("profile/") {
            Some(UploadKind::Questionnaire)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_prefix_and_suffix() {
        assert_eq!(
            UploadKind::from_object_key("portfolio/holdings.csv"),
            Some(UploadKind::Portfolio)
        );
        assert_eq!(
            UploadKind::from_object_key("/profile/answers.CSV"),
            Some(UploadKind::Questionnaire)
        );
        assert_eq!(UploadKind::from_object_key("portfolio/holdings.txt"), None);
        assert_eq!(UploadKind::from_object_key("misc/holdings.csv"), None);
    }
}
