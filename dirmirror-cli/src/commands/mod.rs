pub mod logs;
pub mod run;
pub mod sync;
