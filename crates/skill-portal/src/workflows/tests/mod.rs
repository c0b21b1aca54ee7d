mod budget;
mod common;
mod enrollment;
