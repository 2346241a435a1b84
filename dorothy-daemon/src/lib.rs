//! Dorothy daemon library
//!
//! Plugin-based music playback server. Plugins contribute node types:
//! providers expose songs, listeners render a channel's playback and
//! controllers expose the [`Orchestrator`](orchestrator::Orchestrator) to the
//! outside world. The binary wires the compiled-in plugins through the node
//! factory and runs the [`Mainloop`](mainloop::Mainloop).

pub mod builtin;
pub mod channel;
pub mod error;
pub mod mainloop;
pub mod node;
pub mod orchestrator;
pub mod plugin;

pub use channel::{Channel, ChannelSnapshot, ChannelState, PlayPauseOutcome};
pub use error::{Error, Result};
pub use mainloop::Mainloop;
pub use orchestrator::Orchestrator;
