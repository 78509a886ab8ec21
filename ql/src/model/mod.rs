pub mod discretizer;
pub mod persistence;
pub mod q_table;
