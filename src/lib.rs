pub use sieve_core::*;
