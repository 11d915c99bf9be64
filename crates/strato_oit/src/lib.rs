//! Strato order-independent transparency
//!
//! Renders many overlapping semi-transparent lines with per-pixel linked
//! lists on wgpu. Every transparent fragment is appended to a GPU-resident
//! list for its pixel during the gather pass; the resolve pass sorts each
//! list by depth and composites it over the opaque scene.
//!
//! [`OitRenderer`] is the swappable interface. [`DummyRenderer`] is the
//! order-dependent baseline, [`LinkedListRenderer`] the real thing.
//! [`ppll`] runs the same algorithm on the CPU.

pub mod buffers;
pub mod composite;
pub mod config;
pub mod context;
pub mod dummy;
pub mod error;
pub mod fragment;
pub mod layout;
pub mod linked_list;
pub mod ppll;
pub mod renderer;
pub mod shaders;
pub mod stats;

pub use buffers::LinkedListBuffers;
pub use config::{OitConfig, OitMode};
pub use context::{GpuContext, DEPTH_FORMAT};
pub use dummy::DummyRenderer;
pub use error::{OitError, Result};
pub use fragment::{CameraUniforms, FragmentNode, LineVertex, OitParams, Rgba, SENTINEL};
pub use layout::ArenaLayout;
pub use linked_list::LinkedListRenderer;
pub use ppll::{FragmentArena, GatherPhase, Insertion, ResolvePhase};
pub use renderer::{create_renderer, OitRenderer, SceneTargets};
pub use stats::OitStats;
