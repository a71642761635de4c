mod app;
mod config;
mod context;
mod element;
mod error;
mod flags;
mod reconciler;
pub mod renderer;
mod scheduler;
mod signal;
mod subscription;
mod vnode;

pub use app::*;
pub use config::*;
pub use context::{RenderCx, Updater};
pub use element::*;
pub use error::*;
pub use flags::*;
pub use reconciler::*;
pub use renderer::{Event, HostHandle, Renderer};
pub use scheduler::*;
pub use signal::*;
pub use subscription::*;
pub use vnode::*;

#[cfg(doctest)]
mod tests_readme;
