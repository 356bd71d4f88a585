//! FoxLauncher authlib server: the authlib-injector session endpoints that let
//! third-party game servers verify FoxLauncher accounts.

/// Configuration file and command line overrides
pub mod config;
/// Game profiles and where they are stored
pub mod profile;
/// The HTTP server and its handlers
pub mod server;
/// Common utilities that can't live anywhere else
pub mod util;
