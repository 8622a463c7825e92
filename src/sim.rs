//! Building physics on top of the plan model.

pub mod energy;
