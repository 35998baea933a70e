//! Method-body IR consumed by `vigil-flow`.
//!
//! Vigil does not parse or resolve source text itself: the compiler front end
//! lowers each method-like body (method, accessor, lambda) into the arena
//! structures in [`body`], with variable references already resolved to
//! [`body::LocalId`]s and call arguments annotated with their by-out/by-ref
//! modes. Each body is self-contained; nothing here refers across bodies.

pub mod body;
