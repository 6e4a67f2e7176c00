//! CLI command implementations.

pub mod logins;
pub mod maintenance;
pub mod status;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support {
    use loginstore_bridge::LoginStore;
    use loginstore_client::{Argon2Params, StoreConfig};

    pub(crate) fn fast_config() -> StoreConfig {
        StoreConfig::default().with_kdf(Argon2Params::new(1, 1, 1))
    }

    pub(crate) async fn memory_store() -> LoginStore {
        LoginStore::open_in_memory("test-key", &fast_config())
            .await
            .unwrap()
    }
}
