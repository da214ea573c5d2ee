pub mod analyze;
pub mod profiles;
pub mod run;
