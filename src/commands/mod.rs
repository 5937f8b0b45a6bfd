pub mod counter;
pub mod db;
pub mod feedback;
pub mod scheduler;
pub mod settings;
pub mod votes;
