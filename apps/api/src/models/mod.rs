pub mod cover_letter;
pub mod member;
pub mod resume;
