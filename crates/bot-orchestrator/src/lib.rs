pub mod bot_actor;
pub mod bot_database;
pub mod bot_handle;
pub mod events;
pub mod memory_store;
pub mod registry;
pub mod status;

pub use bot_actor::{BotActor, SharedStrategy, TickEngine, TickTimer};
pub use bot_database::SqliteBotStore;
pub use bot_handle::BotHandle;
pub use events::BotEvent;
pub use memory_store::MemoryBotStore;
pub use registry::BotRegistry;
pub use status::{BotStatus, ConfigUpdate, ShutdownReport, TickOutcome};
