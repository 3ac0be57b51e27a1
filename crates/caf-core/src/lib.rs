//! Caffeine Core Library
//!
//! Platform-independent logic of the Caffeine browser extension, which keeps
//! the screen awake on the pages a user chooses.
//!
//! # Architecture
//!
//! The extension runs in two contexts. The background coordinator tracks one
//! wake-lock session per tab, applies the persistent auto-activation rules and
//! renders the toolbar badge. A content context inside each activated page
//! holds the actual screen wake lock and reports its state back.
//!
//! All browser access goes through the capability traits in [`host`] and the
//! [`storage::KeyValueStore`] trait, so everything here runs natively under
//! test and is bound to `chrome.*` by the `caf-wasm` crate.
//!
//! # Modules
//!
//! - `types`: Shared data model (lock status, sessions, rulesets)
//! - `message`: Cross-context message protocol
//! - `url`: Scheme and hostname extraction
//! - `psl`: Public Suffix List root-domain resolution
//! - `storage`: Key-value store abstraction and typed records
//! - `rules`: Persistent page and domain auto-activation rules
//! - `session`: Per-tab session status
//! - `badge`: Toolbar badge rendering
//! - `permission`: Host permission origin patterns
//! - `coordinator`: Background event and message handling
//! - `wake_lock`: Content-side wake-lock wrapper
//! - `config`: Extension configuration

pub mod badge;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod message;
pub mod permission;
pub mod psl;
pub mod rules;
pub mod session;
pub mod storage;
pub mod types;
pub mod url;
pub mod wake_lock;

// Re-export commonly used types
pub use config::ExtensionConfig;
pub use coordinator::BackgroundManager;
pub use error::{HostError, StorageError};
pub use host::Host;
pub use message::{ExtensionMessage, MessageResponse, MessageSender, PlatformInfo};
pub use psl::DomainResolver;
pub use rules::{Clock, RuleManager};
pub use session::SessionManager;
pub use storage::{KeyValueStore, MemoryStore};
pub use types::{ErrorCode, LockError, LockStatus, RuleState, RuleType, SessionState, TabId};
pub use wake_lock::{Messenger, ScreenWakeLock, WakeLockError, WakeLockManager};
