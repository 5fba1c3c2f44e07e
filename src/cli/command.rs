/// One CLI operation with its arguments resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register { email: String, password: String },
    Verify { email: String, password: String },
    Compact,
    Keygen,
}

impl Command {
    /// Name used in log lines; never includes arguments.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Verify { .. } => "verify",
            Self::Compact => "compact",
            Self::Keygen => "keygen",
        }
    }
}
