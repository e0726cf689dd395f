mod core;
mod index_admin;
mod ops;

pub use core::Collection;
