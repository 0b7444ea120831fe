pub mod accounts;
pub mod catalog;
pub mod interactions;
pub mod providers;
pub mod recommendations;
pub mod sync;
