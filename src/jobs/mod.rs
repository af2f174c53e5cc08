pub mod refresh_sync;
