pub mod events;
pub mod recompute;
pub mod states;
