#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Resource mutex registry for upd
//!
//! Named exclusive locks keyed by resource identifier (e.g. a package
//! database lock several plugins share). A phase requests every resource it
//! needs in one batch; the registry acquires them in a fixed global order
//! (lexicographic over identifiers), which rules out the hold-a-prefix /
//! wait-on-the-rest deadlock by construction. A timeout inside a batch
//! releases everything the batch already took before the failure returns.

pub mod guard;
pub mod registry;

pub use guard::ResourceGuard;
pub use registry::ResourceRegistry;
