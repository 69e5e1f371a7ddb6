// Entity Models - value types shared by every stage of the pipeline
//
// Each entity is an immutable value:
// - Category: competition bracket code
// - IdentityCode: registration code (or the unregistered sentinel)

pub mod category;
pub mod identity;

pub use category::Category;
pub use identity::{name_key, IdentityCode, UNREGISTERED};
