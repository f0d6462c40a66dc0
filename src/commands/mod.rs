//! Handlers behind the `cert-chain` subcommands.

pub mod create_csr;
pub mod create_key;
pub mod sign_cert;
