// RSA padding probe
// Round trips a fixed input through an RSA key-exchange key and exposes the
// full padded block recovered by a no-padding-check decrypt.

pub mod cli;
pub mod config;
pub mod error;
pub mod keys;
pub mod probe;
pub mod provider;
pub mod rsa;
pub mod verify;

pub use config::{ConfigError, ProbeConfig, DEFAULT_STORE_NAME};
pub use error::ProbeError;
pub use keys::{KeyLifecycleManager, KeyPairHandle, Lookup, StoreHandle};
pub use probe::{run_probe, PaddingRoundTripProbe, RecoveredBuffer, REFERENCE_INPUT};
pub use provider::{CryptoProvider, ProviderError, SoftwareProvider, SOFTWARE_PROVIDER_NAME};
pub use verify::{format_hex_bytes, verify_layout, LayoutReport, LayoutViolation};
