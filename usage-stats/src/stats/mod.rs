pub mod periods;
pub mod sample_period;
pub mod single;
pub mod usage;
