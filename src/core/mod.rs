// Core data model, address grammar, write queue, and error modeling.
pub mod address;
pub mod error;
pub mod index;
pub mod queue;
