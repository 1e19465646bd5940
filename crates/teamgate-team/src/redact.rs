//! Log redaction helpers

/// Mask an email address for logging: `bob@example.com` becomes `b***@example.com`.
///
/// # Examples
///
/// ```
/// use teamgate_team::redact::redact_email;
///
/// assert_eq!(redact_email("bob@example.com"), "b***@example.com");
/// assert_eq!(redact_email("garbage"), "***");
/// ```
pub fn redact_email(email: &str) -> String {
    match email.trim().split_once('@') {
        Some((local, domain)) => match local.chars().next() {
            Some(first) => format!("{first}***@{domain}"),
            None => format!("***@{domain}"),
        },
        None => "***".to_string(),
    }
}
