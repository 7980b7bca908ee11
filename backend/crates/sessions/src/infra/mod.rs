pub mod memory;
pub mod postgres;

pub use memory::InMemorySessionRepository;
pub use postgres::PgSessionRecordRepository;
