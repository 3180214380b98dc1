//! Backend implementations of the store contract.
//!
//! Each backend implements the traits from [`crate::graph`]:
//!
//! - [`CypherExecutor`](crate::graph::CypherExecutor) for the client and its transactions
//! - [`Transaction`](crate::graph::Transaction) for the transaction type
//! - [`GraphClient`](crate::graph::GraphClient) for the client
//!
//! | Backend | Module | Status |
//! |---------|--------|--------|
//! | In-memory journal | [`memory`] | Available |

pub mod memory;
