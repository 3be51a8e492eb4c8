pub mod classes;
pub mod core;
pub mod lessons;
pub mod setup;
pub mod subjects;
pub mod teachers;

mod entities;
