use log::*;

/// Loads `.env.test` when present and initialises logging for a test run.
pub fn prepare_test_env() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
}

/// A unique throwaway SQLite URL. The connection layer creates the file on first use.
pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/mpe_test_{}.db", dir.display(), rand::random::<u64>())
}
