//! MetaMask Snap wallet plugin for Antelope session management.
//!
//! The plugin finds the host's injected provider, makes sure the Antelope
//! snap is installed, and relays `antelope_getPublicKey` and
//! `antelope_signTransaction` to it. Login can optionally look up the
//! accounts the snap's key controls and let the user pick or create one.

pub mod accounts;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod keys;
pub mod plugin;
pub mod provider;
pub mod session;
pub mod snap;
pub mod ui;

pub use cancel::{CancelHandle, Cancelable};
pub use config::{AccountPolicy, MissingSnapPolicy, SnapWalletConfig};
pub use error::{Error, Result};
pub use keys::{PublicKey, Signature};
pub use plugin::WalletPluginMetaMask;
pub use session::{
    ChainDefinition, ChainId, LoginContext, LoginResponse, PermissionLevel,
    ResolvedSigningRequest, SignResponse,
};
