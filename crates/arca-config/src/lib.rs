//! Config mirror
//!
//! Round-trips database state to and from YAML files on the media drive for
//! disaster recovery. Each configurable domain has one mirror; the shared
//! driver imports them in dependency order and tolerates per-config
//! failures. DB mutations never write YAML synchronously; they activate a
//! switch and the switch worker performs the dump.

pub mod channels;
pub mod domains;
pub mod downloads;
pub mod inventories;
pub mod mirror;
pub mod tags;

pub use channels::ChannelsConfig;
pub use domains::DomainsConfig;
pub use downloads::DownloadsConfig;
pub use inventories::InventoriesConfig;
pub use mirror::{register_config_switches, ConfigMirror, ConfigMirrors};
pub use tags::TagsConfig;
