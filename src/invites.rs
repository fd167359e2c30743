mod cache;
mod refresher;
mod source;

pub use cache::{InviteCache, InviteEntry, InviterRef, UNKNOWN_INVITER};
pub use refresher::spawn_refresher;
pub use source::{HttpInviteSource, InviteSource};
