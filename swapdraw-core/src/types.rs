use crate::error::{Result, SwapdrawError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Base units per whole token (18 decimals).
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Token amounts in base units.
pub type TokenAmount = u128;

/// 20-byte account identifier, rendered as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address whose low eight bytes hold `n`, for tests and simulations.
    pub const fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        let be = n.to_be_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[12 + i] = be[i];
            i += 1;
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = SwapdrawError;

    fn from_str(s: &str) -> Result<Self> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(stripped)
            .map_err(|e| SwapdrawError::InvalidAddress(format!("{}: {}", s, e)))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| SwapdrawError::InvalidAddress(format!("{}: expected 20 bytes", s)))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of an execution domain on the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId(pub u32);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain#{}", self.0)
    }
}

/// Origin-side request id, monotonic per coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request id allocated by the randomness oracle on the remote domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OracleRequestId(pub u64);

impl fmt::Display for OracleRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 256-bit unsigned random word, big-endian.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RandomValue([u8; 32]);

impl RandomValue {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `self mod modulus`, exact over the full 256 bits.
    pub fn reduce(&self, modulus: u64) -> u64 {
        if modulus == 0 {
            return 0;
        }
        let m = modulus as u128;
        self.0
            .iter()
            .fold(0u128, |rem, &byte| ((rem << 8) | byte as u128) % m) as u64
    }
}

impl fmt::Display for RandomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RandomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for RandomValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RandomValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| serde::de::Error::custom("random value must be 32 bytes"))?;
        Ok(Self(bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryOutcome {
    Won,
    Lost,
    /// Resolved by an operator without a random value; never pays out.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    Open,
    Resolved(EntryOutcome),
}

impl EntryState {
    pub fn is_open(&self) -> bool {
        matches!(self, EntryState::Open)
    }
}

/// Snapshot of a participant's loyalty score taken when the entry opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostSample {
    pub participant: Address,
    pub score: u128,
    pub sampled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRequest {
    pub request_id: RequestId,
    pub participant: Address,
    pub stake: TokenAmount,
    pub threshold: u64,
    pub boost: BoostSample,
    pub opened_at: DateTime<Utc>,
    pub state: EntryState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTicket {
    pub origin_request_id: RequestId,
    pub oracle_request_id: OracleRequestId,
    pub fulfilled: bool,
    pub random_value: Option<RandomValue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolId {
    Main,
    Secondary,
    Participation,
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolId::Main => "main",
            PoolId::Secondary => "secondary",
            PoolId::Participation => "participation",
        };
        f.write_str(name)
    }
}

/// Handed to the token-transfer collaborator for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    pub recipient: Address,
    pub amount: TokenAmount,
    pub pool: PoolId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrizeSplit {
    pub main: TokenAmount,
    pub secondary: TokenAmount,
    pub participation: TokenAmount,
}

impl PrizeSplit {
    pub fn total(&self) -> TokenAmount {
        self.main + self.secondary + self.participation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_display() {
        let addr = Address::from_low_u64(0xbeef);
        let text = addr.to_string();
        assert_eq!(text, "0x000000000000000000000000000000000000beef");
        assert_eq!(text.parse::<Address>().unwrap(), addr);
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn test_random_value_reduce() {
        assert_eq!(RandomValue::from_u128(123_456_789).reduce(1_000_000), 456_789);
        assert_eq!(RandomValue::from_u128(12_345).reduce(1_000_000), 12_345);

        let mut bytes = [0u8; 32];
        bytes[0] = 0x80;
        let high = RandomValue::from_bytes(bytes);
        let expected = (0..255).fold(1u64, |acc, _| (acc * 2) % 1_000_000);
        assert_eq!(high.reduce(1_000_000), expected);
    }
}
