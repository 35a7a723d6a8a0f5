/// Fixed mask substituted for the runrep password in loggable command text.
pub const PASSWORD_MASK: &str = "*********";

/// Replaces every occurrence of the secret in the value with the fixed mask.
/// An empty secret leaves the value untouched.
pub fn mask_secret(value: &str, secret: &str) -> String {
    if secret.is_empty() {
        return value.to_string();
    }
    value.replace(secret, PASSWORD_MASK)
}
