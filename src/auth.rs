//! Admin token check for privileged gateway commands

/// Admin credentials for force-quit and settings commands
#[derive(Debug, Clone, Default)]
pub struct AdminAuth {
    /// Expected token (None = admin commands disabled)
    token: Option<String>,
}

impl AdminAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Whether a connection presenting `supplied` is an admin
    pub fn validate(&self, supplied: Option<&str>) -> bool {
        match (&self.token, supplied) {
            // Use constant-time comparison to prevent timing attacks
            (Some(expected), Some(given)) => constant_time_eq(expected.as_bytes(), given.as_bytes()),
            _ => false,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
