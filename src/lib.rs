//! Previz viewer core
//!
//! Orchestration for an embeddable glTF model viewer: asset loading and
//! preprocessing, the material parameter model, the animation timeline,
//! model lifecycle, progressive rendering with accumulation sessions and
//! pointer interaction. Drawing is delegated to a [`render::RenderBackend`].

pub mod animation;
pub mod app;
pub mod assets;
pub mod config;
pub mod events;
pub mod material;
pub mod render;
pub mod scene;

pub use app::{FrameReport, Viewer};
pub use assets::{LoadHandle, LoadOptions, ModelSource, UpAxis};
pub use config::ViewerConfig;
pub use events::{InteractionEvent, LoadEvent, ViewEvent, ViewerEvent};
pub use material::MaterialConfig;
pub use render::{HeadlessRenderer, RenderBackend};
