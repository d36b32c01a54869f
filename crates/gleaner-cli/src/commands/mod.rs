pub mod clear;
pub mod export;
pub mod run;
pub mod status;
