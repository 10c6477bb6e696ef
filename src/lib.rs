pub mod clock;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod job;
pub mod key_generator;
pub mod middleware;
pub mod rules;
pub mod store;
pub mod tenant;

pub use clock::{Clock, ClockError, SystemClock};
pub use config::Config;
pub use error::{ThrottleError, ThrottleResult};
pub use job::{Job, JobTarget, JobType, JobTypeRegistry};
pub use middleware::{Routing, ThrottleMiddleware};
pub use rules::{assign_queue, ThrottleRule};
pub use store::{MemoryWindowStore, RedisWindowStore, WindowRange, WindowStore};
pub use tenant::TenantResolver;
