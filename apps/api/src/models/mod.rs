pub mod article;
pub mod import_run;
pub mod job;
pub mod recruiter;
