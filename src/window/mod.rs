//! Window manager: tumbling/sliding/session windows, group-by keying, and
//! emission triggers (spec §4.5).

pub mod groupkey;
pub mod instance;
pub mod kind;
pub mod manager;

pub use groupkey::{compute_group_key, GroupKey};
pub use kind::{WindowId, WindowKind};
pub use manager::{FiredWindow, WindowManager};
