pub mod ipbus;
pub mod simulated;
