mod durable_value;
mod error;
mod file;
mod log;
mod memory;
mod term;

pub use self::log::Log;
pub use self::log::LogEntry;
pub use durable_value::DurableValue;
pub use durable_value::Persist;
pub use error::PersistenceError;
pub use file::FileLog;
pub use file::FileValue;
pub use memory::MemoryDisk;
pub use memory::MemoryLog;
pub use memory::MemoryValue;
pub use term::Index;
pub use term::Term;

pub(crate) use self::log::LogEntries;
