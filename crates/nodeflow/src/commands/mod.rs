pub mod catalog;
pub mod create;
pub mod destroy;
