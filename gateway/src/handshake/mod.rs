//! # Offline Handshake
//!
//! A client's detokenization request travels to the registry out of band as
//! a single line of text:
//!
//! ```text
//! detok1<bech32m data part>
//! ```
//!
//! The text is the bech32m encoding of the partially signed spend bundle's
//! canonical bytes. It is opaque to whatever carries it (file, e-mail,
//! form field). The registry decodes it, optionally inspects it with
//! [`parse_detokenization_request`], and counter-signs it.

pub mod codec;
pub mod request;

pub use codec::{decode, encode, ArtifactChecksum};
pub use request::{parse_detokenization_request, DetokenizationSummary, ParsedDetokenization};
