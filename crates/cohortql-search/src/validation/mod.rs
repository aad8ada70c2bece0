//! Criteria tree validation.
//!
//! Rules are small named [`Predicate`](predicates::Predicate)s composed per
//! criterion family. A failing rule is reported by its composed name.

pub mod predicates;
pub mod validator;

pub use predicates::Predicate;
pub use validator::RequestValidator;
