pub mod app_config;
pub mod database;
pub mod order_repo;
pub mod redis_repo;
pub mod settings;
pub mod stripe;

pub use database::DbClient;
pub use order_repo::StoreOrderRepository;
pub use redis_repo::RedisClient;
pub use settings::ConfigSettingsStore;
pub use stripe::StripeClient;
