//! Text form of a spend bundle.
//!
//! ```text
//! bundle --streamable--> bytes --5-bit groups--> bech32m("detok", ...) --> detok1...
//! ```
//!
//! The checksum is bech32m's, but artifacts are far longer than the 90
//! characters the address variant allows, so the codec carries its own
//! [`Checksum`] with the same generator and residue and a code length sized
//! to [`MAX_ARTIFACT_BYTES`].
//!
//! The BCH code behind bech32m has length 1023. Within
//! [`BCH_GUARANTEED_CHARS`] characters its minimum distance guarantees that
//! a few substituted characters are detected. Past that only a single
//! substitution is still always caught; heavier corruption slips through
//! with probability about 2^-30. A
//! corrupted artifact that passes the checksum still has to parse as a
//! spend bundle, and its signature has to verify before it is pushed.

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Checksum, Hrp};

use crate::config::{DETOKENIZATION_HRP, MAX_ARTIFACT_BYTES};
use crate::error::{GatewayError, Result};
use crate::chain::{SpendBundle, Streamable};

/// Length of the BCH code bech32m is built on. Detection is probabilistic
/// for longer strings.
pub const BCH_GUARANTEED_CHARS: usize = 1023;

/// Longest artifact string: prefix, separator, data and checksum.
const MAX_ARTIFACT_CHARS: usize = DETOKENIZATION_HRP.len() + 1 + (MAX_ARTIFACT_BYTES as usize * 8 + 4) / 5 + 6;

/// Bech32m without the length limit of addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactChecksum {}

impl Checksum for ArtifactChecksum {
    type MidstateRepr = u32;
    const CODE_LENGTH: usize = MAX_ARTIFACT_CHARS;
    const CHECKSUM_LENGTH: usize = 6;
    const GENERATOR_SH: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];
    const TARGET_RESIDUE: u32 = 0x2bc8_30a3;
}

fn invalid(message: impl Into<String>) -> GatewayError {
    GatewayError::InvalidArtifact(message.into())
}

fn artifact_hrp() -> Result<Hrp> {
    Hrp::parse(DETOKENIZATION_HRP).map_err(|e| invalid(e.to_string()))
}

/// Encode a (possibly partially signed) bundle as a `detok1...` string.
pub fn encode(bundle: &SpendBundle) -> Result<String> {
    let bytes = bundle.to_bytes()?;
    if bytes.len() > MAX_ARTIFACT_BYTES as usize {
        return Err(invalid("bundle exceeds the size limit"));
    }
    bech32::encode::<ArtifactChecksum>(artifact_hrp()?, &bytes).map_err(|e| invalid(e.to_string()))
}

/// Decode a `detok1...` string. Fails with `InvalidArtifact` on a bad
/// checksum, a foreign prefix, or bytes that are not a bundle.
pub fn decode(content: &str) -> Result<SpendBundle> {
    let content = content.trim();
    if content.len() > MAX_ARTIFACT_CHARS {
        return Err(invalid("artifact exceeds the size limit"));
    }

    let checked = CheckedHrpstring::new::<ArtifactChecksum>(content).map_err(|e| invalid(e.to_string()))?;
    let expected = artifact_hrp()?;
    if checked.hrp() != expected {
        return Err(invalid(format!(
            "expected prefix `{expected}`, found `{}`",
            checked.hrp()
        )));
    }

    let bytes: Vec<u8> = checked.byte_iter().collect();
    SpendBundle::from_bytes(&bytes).map_err(|e| invalid(format!("not a spend bundle: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{nil, to_program, Bytes, Bytes32, Coin, CoinSpend, Program};
    use crate::crypto::{SecretKey, Signature};
    use chia::clvm_traits::clvm_list;

    fn bundle_with(puzzle: Program) -> SpendBundle {
        let spend = CoinSpend::new(
            Coin::new(Bytes32::new([1; 32]), Bytes32::new([2; 32]), 500),
            puzzle,
            to_program(&clvm_list!(500u64, nil())).unwrap(),
        );
        let signature = SecretKey::from_seed(&[3; 32]).sign(b"partial");
        SpendBundle::new(vec![spend], signature.into())
    }

    fn bundle() -> SpendBundle {
        bundle_with(to_program(&clvm_list!("gateway")).unwrap())
    }

    fn flip(content: &str, i: usize) -> String {
        let mut chars: Vec<char> = content.chars().collect();
        chars[i] = if chars[i] == 'q' { 'p' } else { 'q' };
        chars.into_iter().collect()
    }

    #[test]
    fn roundtrip_is_exact() {
        let original = bundle();
        let content = encode(&original).unwrap();
        assert!(content.starts_with("detok1"));
        assert_eq!(decode(&content).unwrap(), original);
    }

    #[test]
    fn identity_signature_survives_encoding() {
        let unsigned = SpendBundle::new(bundle().coin_spends, Signature::identity().into());
        let decoded = decode(&encode(&unsigned).unwrap()).unwrap();
        assert!(Signature::from(decoded.aggregated_signature).is_identity());
    }

    #[test]
    fn artifact_is_longer_than_an_address() {
        assert!(encode(&bundle()).unwrap().len() > 90);
    }

    #[test]
    fn flipped_character_fails_the_checksum() {
        let content = encode(&bundle()).unwrap();
        let tampered = flip(&content, content.len() / 2);
        assert!(matches!(decode(&tampered), Err(GatewayError::InvalidArtifact(_))));
    }

    #[test]
    fn single_substitution_is_caught_past_the_bch_length() {
        let long = bundle_with(to_program(&Bytes::new(vec![7; 2_000])).unwrap());
        let content = encode(&long).unwrap();
        assert!(content.len() > BCH_GUARANTEED_CHARS * 2);
        assert_eq!(decode(&content).unwrap(), long);
        for i in [BCH_GUARANTEED_CHARS + 10, content.len() / 2, content.len() - 3] {
            assert!(matches!(decode(&flip(&content, i)), Err(GatewayError::InvalidArtifact(_))));
        }
    }

    #[test]
    fn artifact_limit_covers_the_byte_limit() {
        assert!(MAX_ARTIFACT_CHARS > BCH_GUARANTEED_CHARS);
        assert_eq!(ArtifactChecksum::CODE_LENGTH, MAX_ARTIFACT_CHARS);
        let oversized = "q".repeat(MAX_ARTIFACT_CHARS + 1);
        assert!(matches!(decode(&oversized), Err(GatewayError::InvalidArtifact(_))));
    }

    #[test]
    fn foreign_prefix_is_rejected() {
        let bytes = bundle().to_bytes().unwrap();
        let other = bech32::encode::<ArtifactChecksum>(Hrp::parse("offer").unwrap(), &bytes).unwrap();
        assert!(matches!(decode(&other), Err(GatewayError::InvalidArtifact(_))));
    }

    #[test]
    fn bech32_variant_is_rejected() {
        let bytes = bundle().to_bytes().unwrap();
        let hrp = Hrp::parse(DETOKENIZATION_HRP).unwrap();
        // address-length payload under the original bech32 constant
        let content = bech32::encode::<bech32::Bech32>(hrp, &bytes[..40]).unwrap();
        assert!(matches!(decode(&content), Err(GatewayError::InvalidArtifact(_))));
    }

    #[test]
    fn valid_text_that_is_not_a_bundle_is_rejected() {
        let content = bech32::encode::<ArtifactChecksum>(artifact_hrp().unwrap(), b"hello").unwrap();
        assert!(matches!(decode(&content), Err(GatewayError::InvalidArtifact(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode("not an artifact"), Err(GatewayError::InvalidArtifact(_))));
        assert!(matches!(decode(""), Err(GatewayError::InvalidArtifact(_))));
    }
}
