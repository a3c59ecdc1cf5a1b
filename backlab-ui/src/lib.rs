//! backlab-ui — the front-end bridge.
//!
//! Front-end agnostic plumbing for interactive callers: a channel-based
//! `RuntimeInteraction` variant, the background worker thread that hosts
//! engine runs, and the persisted settings store. Any event loop — a
//! terminal UI, a desktop shell — drains the `UiEvent` receiver on its own
//! thread; nothing in here renders.

pub mod events;
pub mod settings;
pub mod worker;

pub use events::{FrontendInteraction, UiEvent};
pub use settings::SettingsStore;
pub use worker::{spawn_worker, WorkerCommand};
