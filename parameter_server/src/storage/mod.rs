mod entry;
mod store;

pub use entry::{EntrySnapshot, ParamEntry};
pub use store::EntryStore;
