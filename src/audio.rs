//! Audio side of the scope: shared filter controls, the lock-free block tap
//! and the demo tone generator feeding it.

pub mod controls;
pub mod tap;
pub mod tone;
