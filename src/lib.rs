//! Exports one ChecklistBank release into three flat tables.
//!
//! A run crawls the merged name usages below a taxon page by page, resolves the
//! source datasets and bibliographic references those usages point at, and
//! writes name usage, dataset and reference tables ready for a relational
//! import. Every response is recorded in a replay store, so an interrupted
//! run can be repeated without refetching what it already has.

pub mod app;
pub mod checklist;
pub mod classification;
pub mod collect;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod import;
pub mod output;
pub mod resolve;
pub mod store;
pub mod table;
pub mod transform;
