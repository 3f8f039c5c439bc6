//! Service layer: the user key/value core, independent of the web framework.
//! - Validates keys and request bodies before touching the store.
//! - Resolves the caller's identity through an injected resolver.
//! - Runs parameterized reads and transactional writes via sea-orm.

pub mod errors;
pub mod ukv;
#[cfg(test)]
pub mod test_support;
