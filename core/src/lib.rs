//! Bytecode compiler and stack virtual machine for the Monkey language.
//!
//! The pipeline is AST ([`ast`]) to bytecode ([`compiler`]) to execution
//! ([`vm`]). [`api`] wraps it for hosts that evaluate input incrementally.

pub mod api;
pub mod ast;
pub mod compiler;
pub mod object;
pub mod vm;

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level
    /// Call this at the start of tests where you want to see logging output
    ///
    /// # Example
    /// ```ignore
    /// #[test]
    /// fn test_fibonacci() {
    ///     test_utils::init_test_logging();
    ///     // ... your test code
    /// }
    /// ```
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}
