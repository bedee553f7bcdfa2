//! Contact page input, checked and folded into a form submission.

use serde::{Deserialize, Serialize};

use crate::payload::{SubmitFormPayload, ValidationError};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactInquiry {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company: Option<String>,
    pub subject: String,
    pub message: String,
}

fn min_chars(
    field: &'static str,
    value: &str,
    min: usize,
    reason: &'static str,
) -> Option<ValidationError> {
    (value.chars().count() < min).then(|| ValidationError::new(field, reason))
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl ContactInquiry {
    /// Returns every failed check, in form order.
    pub fn check(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        errors.extend(min_chars(
            "firstName",
            &self.first_name,
            2,
            "must be at least 2 characters",
        ));
        errors.extend(min_chars(
            "lastName",
            &self.last_name,
            2,
            "must be at least 2 characters",
        ));
        if !looks_like_email(&self.email) {
            errors.push(ValidationError::new("email", "must be a valid email address"));
        }
        errors.extend(min_chars(
            "subject",
            &self.subject,
            5,
            "must be at least 5 characters",
        ));
        errors.extend(min_chars(
            "message",
            &self.message,
            10,
            "must be at least 10 characters",
        ));
        errors
    }

    /// `"<subject>: <message>"`, with `" (Company: <company>)"` appended
    /// when a company was given.
    pub fn compose_message(&self) -> String {
        match self.company.as_deref().filter(|c| !c.is_empty()) {
            Some(company) => format!("{}: {} (Company: {})", self.subject, self.message, company),
            None => format!("{}: {}", self.subject, self.message),
        }
    }

    pub fn into_payload(self) -> SubmitFormPayload {
        let message = self.compose_message();
        SubmitFormPayload {
            name: format!("{} {}", self.first_name, self.last_name),
            email: self.email,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inquiry() -> ContactInquiry {
        ContactInquiry {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@example.com".to_string(),
            company: Some("Acme".to_string()),
            subject: "Hello".to_string(),
            message: "test".to_string(),
        }
    }

    #[test]
    fn test_compose_with_company() {
        let payload = inquiry().into_payload();
        assert_eq!(payload.name, "Jane Doe");
        assert_eq!(payload.email, "jane@example.com");
        assert_eq!(payload.message, "Hello: test (Company: Acme)");
    }

    #[test]
    fn test_compose_without_company() {
        let mut i = inquiry();
        i.company = Some(String::new());
        assert_eq!(i.compose_message(), "Hello: test");
        i.company = None;
        assert_eq!(i.compose_message(), "Hello: test");
    }

    #[test]
    fn test_check_reports_all_failures() {
        let i = ContactInquiry {
            first_name: "J".to_string(),
            last_name: "Doe".to_string(),
            email: "jane.example.com".to_string(),
            company: None,
            subject: "Hi".to_string(),
            message: "Please call me back".to_string(),
        };
        let fields: Vec<&str> = i.check().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["firstName", "email", "subject"]);
    }

    #[test]
    fn test_check_passes() {
        let mut i = inquiry();
        i.message = "I would like a demo".to_string();
        assert!(i.check().is_empty());
    }

    #[test]
    fn test_email_shape() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a b@c.de"));
    }
}
