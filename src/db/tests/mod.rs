//! Shared database repository test infrastructure
//!
//! The same test logic runs against both SQLite and PostgreSQL:
//!
//! - **SQLite**: in-memory databases with real migrations, run with every `cargo test`
//! - **PostgreSQL**: testcontainers, run with `cargo test -- --ignored`
//!
//! ```bash
//! cargo test                       # Run fast SQLite tests only
//! cargo test -- --ignored          # Run PostgreSQL integration tests (requires Docker)
//! cargo test -- --include-ignored  # Run all tests
//! ```

pub mod harness;
