//! Configuration options for the Monkey virtual machine.

/// Resource limits of one VM.
///
/// # Example
///
/// ```
/// use monkey_core::api::VmOptions;
///
/// let options = VmOptions {
///     max_frames: 64,
///     ..VmOptions::default()
/// };
/// assert_eq!(options.stack_size, 2048);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// Operand stack slots shared by all frames.
    ///
    /// Default: 2048
    pub stack_size: usize,

    /// Global variable slots. `SetGlobal`/`GetGlobal` address at most 65536.
    ///
    /// Default: 65536
    pub globals_size: usize,

    /// Maximum call depth, the top-level program included.
    ///
    /// Default: 1024
    pub max_frames: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            stack_size: 2048,
            globals_size: 65536,
            max_frames: 1024,
        }
    }
}
