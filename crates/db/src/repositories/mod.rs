//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod character_repo;
pub mod character_set_repo;
pub mod user_repo;
pub mod work_repo;

pub use character_repo::CharacterRepo;
pub use character_set_repo::CharacterSetRepo;
pub use user_repo::UserRepo;
pub use work_repo::WorkRepo;
