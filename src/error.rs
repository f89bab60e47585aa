//! Error taxonomy for the planning engine

use thiserror::Error;

use crate::models::TypeId;

/// Fatal planning errors. Missing prices, cost indices and structure
/// configs are not errors; they degrade to zero contributions.
#[derive(Debug, Error, PartialEq)]
pub enum PlannerError {
    /// The root product has no manufacturing or reaction recipe.
    #[error("no recipe produces type {product_id}")]
    MissingRecipe { product_id: TypeId },
    /// A requested product ID has no type metadata.
    #[error("unknown type id {0}")]
    UnknownType(TypeId),
    /// Expansion went deeper than the configured limit, which means the
    /// recipe graph contains a cycle.
    #[error("recursion depth {depth} exceeded at type {product_id}, recipes may be cyclic")]
    RecursionLimit { product_id: TypeId, depth: usize },
    /// The requested decryptor is not in the decryptor table.
    #[error("unknown decryptor type id {0}")]
    UnknownDecryptor(TypeId),
}
