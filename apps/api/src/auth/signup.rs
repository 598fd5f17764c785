//! Field validation for password sign-up.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::auth::password::check_password_policy;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub nickname: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    /// Returns every failing field with its message, or `None` when all pass.
    pub fn validate(&self) -> Option<BTreeMap<String, String>> {
        let mut errors = BTreeMap::new();

        if self.nickname.trim().is_empty() {
            errors.insert("nickname".to_string(), "Nickname is required".to_string());
        }
        if !is_valid_email(self.email.trim()) {
            errors.insert("email".to_string(), "Invalid email format".to_string());
        }
        if let Err(msg) = check_password_policy(&self.password) {
            errors.insert("password".to_string(), msg.to_string());
        }
        if !is_valid_phone(self.phone.trim()) {
            errors.insert(
                "phone".to_string(),
                "Phone number must look like 010-1234-5678".to_string(),
            );
        }

        (!errors.is_empty()).then_some(errors)
    }
}

/// `local@domain.tld` with no whitespace and a dot inside the domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Digit groups of 2-3, 3-4 and 4 separated by hyphens.
pub fn is_valid_phone(phone: &str) -> bool {
    let groups: Vec<&str> = phone.split('-').collect();
    let [first, second, third] = groups.as_slice() else {
        return false;
    };
    let digits = |s: &str, min: usize, max: usize| {
        (min..=max).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
    };
    digits(*first, 2, 3) && digits(*second, 3, 4) && digits(*third, 4, 4)
}
