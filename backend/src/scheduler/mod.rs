//! Background campaign processing: assignment, dispatch, and daily resets.

pub mod assignment;
pub mod campaign;
pub mod dispatch;
pub mod gmail_client;

pub use campaign::{start_daily_reset_task, start_scheduler_task};
