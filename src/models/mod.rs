pub mod membership;
pub mod project;
pub mod tag;
pub mod user;
