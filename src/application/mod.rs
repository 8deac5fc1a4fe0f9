pub mod channel_rotation;
pub mod command_handler;
pub mod composer;
pub mod definition_cache;
pub mod orchestrator;
pub mod scheduler;
pub mod service_container;
pub mod subscriber_rotation;
pub mod traits;

pub use channel_rotation::{ChannelCoverage, ChannelRotationManager, PendingChannelSlice};
pub use command_handler::{BotCommand, CommandHandler};
pub use composer::{MessageComposer, RenderTier, Rendered};
pub use definition_cache::DefinitionCache;
pub use orchestrator::{ChannelDelivery, DistributionOrchestrator, SubscriberDelivery};
pub use scheduler::{DailySchedule, run_daily};
pub use service_container::{ServiceContainer, Stores};
pub use subscriber_rotation::{PendingSubscriberSlice, SubscriberRotationManager};
