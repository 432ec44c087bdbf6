use std::fmt;

use crate::status_code::{self, status_code_t, StatusCode};

/// A status code with an optional message; the error type of every
/// fallible vtreefs operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Status {
    code: status_code_t,
    message: Option<String>,
}

impl Status {
    pub fn new(code: status_code_t) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(code: status_code_t, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(msg.into()),
        }
    }

    pub fn code(&self) -> status_code_t {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::OK
    }

    /// The errno a transport should reply with.
    pub fn errno(&self) -> i32 {
        status_code::to_errno(self.code)
    }

    /// `"Vtree::NotFound(3000) no entry 'x'"` style description.
    pub fn describe(&self) -> String {
        let name = status_code::to_string(self.code);
        match &self.message {
            Some(msg) => format!("{}({}) {}", name, self.code, msg),
            None => format!("{}({})", name, self.code),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl std::error::Error for Status {}

impl From<status_code_t> for Status {
    fn from(code: status_code_t) -> Self {
        Self::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_code::VtreeCode;

    #[test]
    fn test_status_describe() {
        let s = Status::with_message(VtreeCode::NOT_FOUND, "no entry 'x'");
        assert!(!s.is_ok());
        assert_eq!(s.message(), Some("no entry 'x'"));
        assert_eq!(s.describe(), "Vtree::NotFound(3000) no entry 'x'");
        assert_eq!(Status::new(StatusCode::OK).to_string(), "OK(0)");
    }

    #[test]
    fn test_status_errno() {
        let s: Status = VtreeCode::ACCESS_DENIED.into();
        assert_eq!(s.errno(), libc::EACCES);
    }
}
