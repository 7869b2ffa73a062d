//! Entry access resolution.

pub mod resolver;

pub use resolver::AccessResolver;
