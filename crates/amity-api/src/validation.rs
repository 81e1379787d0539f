//! Field-level checks for request bodies. Errors are collected per field so
//! a client sees every problem at once.

use amity_types::api::{FieldErrors, LoginRequest, RegisterRequest, TargetUserRequest};

pub const USERNAME_MAX_CHARS: usize = 150;
pub const EMAIL_MAX_CHARS: usize = 254;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

#[derive(Debug)]
pub struct RegistrationFields {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn validate_registration(req: &RegisterRequest) -> Result<RegistrationFields, FieldErrors> {
    let mut errors = FieldErrors::new();

    let username = required(&mut errors, "username", req.username.as_deref(), true);
    if let Some(name) = &username {
        check_username(&mut errors, name);
    }

    let email = required(&mut errors, "email", req.email.as_deref(), true);
    if let Some(email) = &email {
        check_email(&mut errors, email);
    }

    let password = required(&mut errors, "password", req.password.as_deref(), false);

    match (username, email, password) {
        (Some(username), Some(email), Some(password)) if errors.is_empty() => {
            Ok(RegistrationFields {
                username,
                email,
                password,
            })
        }
        _ => Err(errors),
    }
}

/// Errors for fields that collided with an existing account.
pub fn uniqueness_errors(username_taken: bool, email_taken: bool) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if username_taken {
        push(&mut errors, "username", "Username is already taken");
    }
    if email_taken {
        push(&mut errors, "email", "Email is already in use");
    }
    errors
}

pub fn login_fields(req: &LoginRequest) -> Result<(String, String), FieldErrors> {
    let mut errors = FieldErrors::new();
    let username = required(&mut errors, "username", req.username.as_deref(), true);
    let password = required(&mut errors, "password", req.password.as_deref(), false);

    match (username, password) {
        (Some(username), Some(password)) => Ok((username, password)),
        _ => Err(errors),
    }
}

/// The `username` of a friendship endpoint body.
pub fn target_username(req: &TargetUserRequest) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::new();
    required(&mut errors, "username", req.username.as_deref(), true).ok_or(errors)
}

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

/// Present and non-blank, optionally trimmed.
fn required(errors: &mut FieldErrors, field: &str, value: Option<&str>, trim: bool) -> Option<String> {
    let Some(value) = value else {
        push(errors, field, REQUIRED);
        return None;
    };

    let value = if trim { value.trim() } else { value };
    if value.is_empty() {
        push(errors, field, BLANK);
        return None;
    }
    Some(value.to_string())
}

fn check_username(errors: &mut FieldErrors, username: &str) {
    if username.chars().count() > USERNAME_MAX_CHARS {
        push(
            errors,
            "username",
            format!("Ensure this field has no more than {} characters.", USERNAME_MAX_CHARS),
        );
    }
    if !username.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
        push(
            errors,
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.chars().count() > EMAIL_MAX_CHARS {
        push(
            errors,
            "email",
            format!("Ensure this field has no more than {} characters.", EMAIL_MAX_CHARS),
        );
    }
    if !is_valid_email(email) {
        push(errors, "email", "Enter a valid email address.");
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: Option<&str>, email: Option<&str>, password: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.map(String::from),
            email: email.map(String::from),
            password: password.map(String::from),
        }
    }

    #[test]
    fn accepts_well_formed_registration() {
        let fields = validate_registration(&request(
            Some("  testuser "),
            Some("test@mail.ru"),
            Some("password123"),
        ))
        .unwrap();
        assert_eq!(fields.username, "testuser");
        assert_eq!(fields.email, "test@mail.ru");
        assert_eq!(fields.password, "password123");
    }

    #[test]
    fn reports_every_missing_field() {
        let errors = validate_registration(&RegisterRequest::default()).unwrap_err();
        assert_eq!(errors.len(), 3);
        for field in ["username", "email", "password"] {
            assert_eq!(errors[field], vec![REQUIRED.to_string()]);
        }
    }

    #[test]
    fn blank_values_are_rejected() {
        let errors = validate_registration(&request(Some("   "), Some(""), Some(""))).unwrap_err();
        assert_eq!(errors["username"], vec![BLANK.to_string()]);
        assert_eq!(errors["email"], vec![BLANK.to_string()]);
        assert_eq!(errors["password"], vec![BLANK.to_string()]);
    }

    #[test]
    fn username_rules() {
        let errors =
            validate_registration(&request(Some("bad name!"), Some("a@b.io"), Some("pw"))).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors["username"][0].starts_with("Enter a valid username"));

        let long = "u".repeat(USERNAME_MAX_CHARS + 1);
        let errors = validate_registration(&request(Some(&long), Some("a@b.io"), Some("pw"))).unwrap_err();
        assert!(errors["username"][0].contains("150"));

        assert!(validate_registration(&request(Some("jo.doe+1@x-y_z"), Some("a@b.io"), Some("pw"))).is_ok());
    }

    #[test]
    fn email_rules() {
        for bad in ["plain", "@example.com", "a@", "a@b", "a@@b.com", "a b@c.com", "a@.com", "a@b..com"] {
            assert!(!is_valid_email(bad), "{} should be invalid", bad);
        }
        for good in ["a@b.io", "first.last+tag@sub.example.org", "newuser@example.com"] {
            assert!(is_valid_email(good), "{} should be valid", good);
        }
    }

    #[test]
    fn uniqueness_messages() {
        let errors = uniqueness_errors(true, true);
        assert_eq!(errors["username"], vec!["Username is already taken".to_string()]);
        assert_eq!(errors["email"], vec!["Email is already in use".to_string()]);
        assert!(uniqueness_errors(false, false).is_empty());
    }

    #[test]
    fn target_username_is_trimmed_and_required() {
        let req = TargetUserRequest {
            username: Some(" bob ".into()),
        };
        assert_eq!(target_username(&req).unwrap(), "bob");
        assert!(target_username(&TargetUserRequest::default()).is_err());
    }
}
