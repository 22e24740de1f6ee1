use validator::ValidateEmail;

#[derive(Debug, Clone)]
pub struct EmailObject(String);

impl EmailObject {
    pub fn parse(s: String) -> Result<EmailObject, String> {
        if s.validate_email() {
            Ok(Self(s))
        } else {
            Err(format!("{} is not a valid email.", s))
        }
    }
}

impl AsRef<str> for EmailObject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
