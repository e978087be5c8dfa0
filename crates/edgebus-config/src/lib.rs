//! Config KV adapter (spec §4.D): a thin `gg_config` core-bus client, and
//! (since the real store is an external black box) an in-memory reference
//! backend to serve it for tests and standalone runs.

pub mod client;
pub mod server;
pub mod store;

pub use client::ConfigClient;
pub use store::ConfigStore;

#[cfg(test)]
mod tests {
    use super::*;
    use edgebus_core::Value;
    use tempfile::tempdir;

    #[tokio::test]
    async fn client_write_then_read_round_trips_through_the_server() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("gg_config.sock");
        let store = ConfigStore::new();

        let socket_for_server = socket_path.clone();
        let store_for_server = store.clone();
        tokio::spawn(async move {
            let _ = server::serve(store_for_server, &socket_for_server).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = ConfigClient::connect(&socket_path).await.unwrap();
        client.write(&["system", "thingName"], Value::str("MyThing"), 1).await.unwrap();
        let name = client.read_str(&["system", "thingName"]).await.unwrap();
        assert_eq!(name, "MyThing");
    }

    #[tokio::test]
    async fn client_read_of_missing_key_surfaces_as_remote_no_entry() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("gg_config2.sock");
        let store = ConfigStore::new();
        let socket_for_server = socket_path.clone();
        tokio::spawn(async move {
            let _ = server::serve(store, &socket_for_server).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = ConfigClient::connect(&socket_path).await.unwrap();
        let err = client.read(&["nope"]).await.unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::Remote);
        assert!(err.message.contains("NOENTRY"));
    }
}
