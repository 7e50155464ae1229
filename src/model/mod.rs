// File: ./src/model/mod.rs
pub mod entry;
pub mod event;
pub mod matcher;
pub mod parser;

pub use entry::{ClassDetails, ClassEntry, ClassKey, TimeSource};
pub use event::{EventCache, EventRecord, RawEvent};
pub use parser::{ClassTimes, ParseOutcome, ScheduleParser, SkippedBlock};
