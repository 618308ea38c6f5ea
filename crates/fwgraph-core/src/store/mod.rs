// ── Policy data store ──
//
// Concurrent entity storage with a store-wide change version.

mod collection;
mod data_store;
pub(crate) mod mutate;
mod refresh;

pub use data_store::DataStore;
