mod parsing;
mod settings;
mod types;

pub(crate) use types::{ExamSettings, Settings, StoreBackend};
