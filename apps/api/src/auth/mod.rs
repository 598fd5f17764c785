pub mod cookies;
pub mod extractor;
pub mod handlers;
pub mod oauth;
pub mod password;
pub mod service;
pub mod signup;
pub mod store;
pub mod tokens;
