pub mod auth;
pub mod perms;
pub mod resource;
