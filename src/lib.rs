//! `readshelf`: search and bulk actions over a read-it-later library.
//!
//! The core is the search-query compiler in [`search`], which turns query
//! text such as `coffee label:Favorites in:archive sort:saved-asc` into a
//! parameterized predicate. [`service`] runs compiled queries against any
//! [`store::ItemStore`], for reading pages or for bulk updates.

pub mod config;
pub mod error;
pub mod model;
pub mod search;
pub mod service;
pub mod store;
