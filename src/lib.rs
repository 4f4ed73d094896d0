//! fitflow — fitness-challenge state projected from on-chain history.
//!
//! The library is the ingestion pipeline under [`pipeline`]; the
//! `ingest_runtime` binary wires it to the environment.

pub mod pipeline;
