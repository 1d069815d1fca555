pub(crate) mod batches;
pub(crate) mod errors;
pub(crate) mod exams;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod papers;
pub(crate) mod router;
pub(crate) mod student;
pub(crate) mod students;
