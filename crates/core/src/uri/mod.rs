//! Camera URI handling: template substitution and canonical comparison.
//!
//! - [`template`]: fills `{login}`, `{password}`, `{ip}`, `{port}` into an
//!   operator-entered template and produces password-masked display forms.
//! - [`normalize`]: reduces a URI to a canonical string so that two
//!   spellings of the same stream compare equal.

pub mod normalize;
pub mod template;

pub use normalize::{are_identical, normalize};
pub use template::{mask_password, resolve, resolve_all};
