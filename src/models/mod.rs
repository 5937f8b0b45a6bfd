pub mod feedback;
pub mod hit;
pub mod tip;
pub mod vote;
