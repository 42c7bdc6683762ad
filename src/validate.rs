//! Declarative request validation.
//!
//! Each endpoint's payload contract is a [`Schema`] value — field name,
//! required/optional, length bounds and a format kind — evaluated by one
//! generic checker. The result is tagged: `Ok(())` or the full list of
//! field-level [`Violation`]s, never an exception-style early bail, so a
//! client sees every defect in one response.
//!
//! Validation here is purely structural. Uniqueness and other business rules
//! live in the handlers and the store.

use serde::Serialize;
use serde_json::Value;

/// One field-level defect, serialized into the `details` array of a
/// `Validation failed` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Format constraint applied after the length bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kind {
    /// Any string.
    Text,
    /// ASCII letters and digits only.
    Alphanumeric,
    /// Rough email shape: `local@domain` with a dotted domain.
    Email,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub min: usize,
    pub max: usize,
    pub kind: Kind,
}

impl FieldRule {
    pub const fn text(name: &'static str, min: usize, max: usize) -> Self {
        Self {
            name,
            required: true,
            min,
            max,
            kind: Kind::Text,
        }
    }

    pub const fn alphanum(name: &'static str, min: usize, max: usize) -> Self {
        Self {
            name,
            required: true,
            min,
            max,
            kind: Kind::Alphanumeric,
        }
    }

    pub const fn email(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            min: 3,
            max: 254,
            kind: Kind::Email,
        }
    }

    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A payload contract: the known fields, plus an optional "at least one of
/// these must be present" constraint (login accepts username *or* email).
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [FieldRule],
    pub one_of: Option<&'static [&'static str]>,
}

impl Schema {
    pub const fn new(fields: &'static [FieldRule]) -> Self {
        Self {
            fields,
            one_of: None,
        }
    }

    pub const fn with_one_of(mut self, names: &'static [&'static str]) -> Self {
        self.one_of = Some(names);
        self
    }

    /// Check a raw JSON payload against this schema.
    pub fn check(&self, payload: &Value) -> Result<(), Vec<Violation>> {
        let Some(object) = payload.as_object() else {
            return Err(vec![Violation::new("body", "must be a JSON object")]);
        };

        let mut violations = Vec::new();

        for rule in self.fields {
            match object.get(rule.name) {
                None | Some(Value::Null) => {
                    if rule.required {
                        violations.push(Violation::new(rule.name, "is required"));
                    }
                }
                Some(Value::String(s)) => check_string(rule, s, &mut violations),
                Some(_) => violations.push(Violation::new(rule.name, "must be a string")),
            }
        }

        // Unknown fields are rejected, matching strict schemas on the wire.
        for key in object.keys() {
            if !self.fields.iter().any(|rule| rule.name == key) {
                violations.push(Violation::new(key.clone(), "is not allowed"));
            }
        }

        if let Some(names) = self.one_of {
            let any_present = names
                .iter()
                .any(|name| matches!(object.get(*name), Some(Value::String(s)) if !s.is_empty()));
            if !any_present {
                violations.push(Violation::new(names.join("|"), "one of these is required"));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn check_string(rule: &FieldRule, value: &str, violations: &mut Vec<Violation>) {
    let len = value.chars().count();
    if len < rule.min {
        violations.push(Violation::new(
            rule.name,
            format!("must be at least {} characters", rule.min),
        ));
        return;
    }
    if len > rule.max {
        violations.push(Violation::new(
            rule.name,
            format!("must be at most {} characters", rule.max),
        ));
        return;
    }
    match rule.kind {
        Kind::Text => {}
        Kind::Alphanumeric => {
            if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                violations.push(Violation::new(rule.name, "must contain only letters and digits"));
            }
        }
        Kind::Email => {
            if !is_email_shape(value) {
                violations.push(Violation::new(rule.name, "must be a valid email address"));
            }
        }
    }
}

/// Structural email check: one `@`, non-empty local part, dotted domain,
/// no whitespace. Deliverability is not our problem.
fn is_email_shape(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    domain.split('.').count() >= 2 && domain.split('.').all(|label| !label.is_empty())
}

// ── Endpoint schemas ───────────────────────────────────────────────────

pub const REGISTER: Schema = Schema::new(&[
    FieldRule::text("firstName", 2, 50),
    FieldRule::text("lastName", 2, 50),
    FieldRule::alphanum("username", 3, 30),
    FieldRule::email("email"),
    FieldRule::text("password", 6, 100),
]);

pub const LOGIN: Schema = Schema::new(&[
    FieldRule::text("username", 1, 254).optional(),
    FieldRule::text("email", 1, 254).optional(),
    FieldRule::text("password", 1, 100),
])
.with_one_of(&["username", "email"]);

pub const UPDATE_ME: Schema = Schema::new(&[
    FieldRule::text("firstName", 2, 50),
    FieldRule::text("lastName", 2, 50),
    FieldRule::alphanum("username", 3, 30).optional(),
]);

pub const CHANGE_PASSWORD: Schema = Schema::new(&[
    FieldRule::text("oldPassword", 1, 100),
    FieldRule::text("newPassword", 6, 100),
]);

pub const NOTE: Schema = Schema::new(&[
    FieldRule::text("title", 1, 200),
    // Content may be empty but must be present.
    FieldRule::text("content", 0, 100_000),
]);

/// Schema for each item inside an import batch.
pub const NOTE_ITEM: Schema = NOTE;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_register_payload_passes() {
        let payload = json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "username": "ada1815",
            "email": "ada@example.com",
            "password": "difference-engine",
        });
        assert!(REGISTER.check(&payload).is_ok());
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let payload = json!({"firstName": "Ada"});
        let violations = REGISTER.check(&payload).unwrap_err();
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"lastName"));
        assert!(fields.contains(&"username"));
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
    }

    #[test]
    fn username_must_be_alphanumeric() {
        let payload = json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "username": "ada lovelace!",
            "email": "ada@example.com",
            "password": "difference-engine",
        });
        let violations = REGISTER.check(&payload).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.field == "username" && v.message.contains("letters and digits")));
    }

    #[test]
    fn email_shape_is_enforced() {
        for bad in ["plainaddress", "a@b", "a @b.com", "@b.com", "a@.com"] {
            assert!(!is_email_shape(bad), "{bad} should be rejected");
        }
        for good in ["a@b.com", "first.last@sub.domain.org"] {
            assert!(is_email_shape(good), "{good} should be accepted");
        }
    }

    #[test]
    fn length_bounds_are_enforced() {
        let payload = json!({
            "firstName": "A",
            "lastName": "Lovelace",
            "username": "ada",
            "email": "ada@example.com",
            "password": "short",
        });
        let violations = REGISTER.check(&payload).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.field == "firstName" && v.message.contains("at least 2")));
        assert!(violations
            .iter()
            .any(|v| v.field == "password" && v.message.contains("at least 6")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let payload = json!({
            "title": "hello",
            "content": "",
            "owner": "sneaky",
        });
        let violations = NOTE.check(&payload).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.field == "owner" && v.message == "is not allowed"));
    }

    #[test]
    fn login_requires_username_or_email() {
        let violations = LOGIN.check(&json!({"password": "hunter22"})).unwrap_err();
        assert!(violations.iter().any(|v| v.field == "username|email"));

        assert!(LOGIN
            .check(&json!({"username": "ada", "password": "hunter22"}))
            .is_ok());
        assert!(LOGIN
            .check(&json!({"email": "ada@example.com", "password": "hunter22"}))
            .is_ok());
    }

    #[test]
    fn note_content_may_be_empty_but_title_may_not() {
        assert!(NOTE.check(&json!({"title": "t", "content": ""})).is_ok());
        let violations = NOTE.check(&json!({"title": "", "content": "x"})).unwrap_err();
        assert!(violations.iter().any(|v| v.field == "title"));
    }

    #[test]
    fn non_string_values_are_rejected() {
        let violations = NOTE
            .check(&json!({"title": 42, "content": ["x"]}))
            .unwrap_err();
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.message == "must be a string"));
    }

    #[test]
    fn non_object_body_is_rejected() {
        let violations = NOTE.check(&json!(["not", "an", "object"])).unwrap_err();
        assert_eq!(violations[0].field, "body");
    }

    #[test]
    fn optional_username_in_profile_update() {
        assert!(UPDATE_ME
            .check(&json!({"firstName": "Ada", "lastName": "Lovelace"}))
            .is_ok());
        let violations = UPDATE_ME
            .check(&json!({"firstName": "Ada", "lastName": "Lovelace", "username": "a!"}))
            .unwrap_err();
        assert!(violations.iter().any(|v| v.field == "username"));
    }
}
