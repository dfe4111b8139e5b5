//! Dial action: state, rendering and the host-facing controller
//!
//! One `DialController` task exists per visible dial. Hosts talk to it through
//! a `DialHandle`; frames flow back out through a `DialSurface`.

pub mod controller;
pub mod events;
pub mod image;
pub mod settings;
pub mod state;
pub mod surface;
pub mod throttle;

pub use self::controller::{spawn, DialController, SmootherStep};
pub use self::events::{DialClosed, DialEvent, DialHandle};
pub use self::image::{Frame, FrameRenderer, RenderError};
pub use self::settings::{DialSettings, ResolvedSettings};
pub use self::state::VolumeState;
pub use self::surface::{push_frame, DialSurface, DirectorySurface, ImagePayload, PushStrategy, SurfaceError};
pub use self::throttle::RenderThrottle;
