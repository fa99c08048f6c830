//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `replay` | `Replay`         |
//! | `waves`  | `Waves`          |
//! | `config` | `Config`         |

pub mod config;
pub mod replay;
pub mod serve;
pub mod waves;

pub use config::cmd_config;
pub use replay::cmd_replay;
pub use serve::cmd_serve;
pub use waves::cmd_waves;
