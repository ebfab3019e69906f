pub mod content;
pub mod profiles;
