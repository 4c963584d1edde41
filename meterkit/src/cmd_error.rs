use crate::exit_codes::ExitCode;

/// A failed subcommand: the message chain to print and the exit code it maps to.
#[derive(Debug)]
pub struct CmdError {
    code: ExitCode,
    source: anyhow::Error,
}

impl CmdError {
    /// Bad flags or unreadable input. Used as a `map_err` adapter.
    pub fn invalid_input(source: anyhow::Error) -> Self {
        Self {
            code: ExitCode::InvalidInput,
            source,
        }
    }

    pub fn runtime(source: anyhow::Error) -> Self {
        Self {
            code: ExitCode::RuntimeError,
            source,
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        self.code
    }
}

impl std::fmt::Display for CmdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

impl std::error::Error for CmdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}
