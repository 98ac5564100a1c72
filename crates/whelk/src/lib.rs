//! Whelk: an in-memory project filesystem with a bash-like shell.
//!
//! A coding agent gets a [`FileStore`] holding the project files and drives
//! it with ordinary shell command lines through [`execute_command`]. Nothing
//! touches the real filesystem and no process is ever spawned.
//!
//! ```
//! use whelk::{FileStore, execute_command};
//!
//! let mut store = FileStore::new();
//! execute_command("echo 'export const x = 1;' > src/x.ts", &mut store);
//!
//! let result = execute_command("grep -n export src/x.ts", &mut store);
//! assert_eq!(result.stdout, "1:export const x = 1;");
//! assert_eq!(result.exit_code, 0);
//!
//! assert!(store.rollback());
//! assert!(!store.exists("src/x.ts"));
//! ```

pub mod glob;
pub mod limits;
pub mod shell;
pub mod store;

pub use limits::ResourceLimits;
pub use shell::{Builtin, CommandError, CommandResult, execute_command};
pub use store::{
    DependencyChange, FileEntry, Language, Plan, PlanTask, SearchMatch, SearchOptions, StoreError,
    TaskStatus, VirtualFile, WriteOutcome,
};
pub use store::{FileStore, normalize_path};
