//! Keep a local, importance-ranked picture of the open pull requests a
//! GitHub user should look at.

pub mod cache;
pub mod github;
pub mod pr;
pub mod sync;
pub mod util;
