pub mod controller;
pub mod player;
pub mod sink;
pub mod state;
