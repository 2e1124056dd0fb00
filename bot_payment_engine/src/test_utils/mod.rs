mod prepare_env;
mod seed;
mod stub_gateway;

pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations};
pub use seed::{seed_marketplace, Marketplace};
pub use stub_gateway::StubGateway;
