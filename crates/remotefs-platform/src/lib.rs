//! Shared filesystem vocabulary for remotefs: entry types, the closed error
//! taxonomy, and the provider trait that editor integrations consume.

pub mod filesystem;
