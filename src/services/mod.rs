pub(crate) mod access_policy;
pub(crate) mod answer_register;
pub(crate) mod attempt_lifecycle;
pub(crate) mod catalog;
pub(crate) mod errors;
pub(crate) mod exam_admin;
pub(crate) mod expiry_reaper;
pub(crate) mod grading;
pub(crate) mod results;
