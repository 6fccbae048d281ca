//! MCMC reconstruction of clone trees from mutation-cluster read counts.
pub mod input;
pub mod likelihood;
pub mod mutrel;
pub mod phi;
pub mod sampler;
pub mod supervars;
pub mod tree;
