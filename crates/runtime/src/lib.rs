pub mod bot;
pub mod commands;
pub mod gate;
mod library;
pub mod scheduler;

pub use bot::{ChatMessage, FactBot, render_result};
pub use commands::{ChatCommand, THEME_SHORTCUTS, parse_command};
pub use gate::{Decision, RateGate};
pub use library::FactLibrary;
pub use scheduler::{
    DeliverySink, PostError, SchedulePlan, SchedulerStats, run_scheduler, spawn_scheduler,
};
