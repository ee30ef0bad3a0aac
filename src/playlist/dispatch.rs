//! Query-string parsing and top-level request routing (§4.8, §7).

use crate::error::DispatchError;
use serde::Deserialize;

/// The `_HLS_msn`, `_HLS_part` and `_HLS_skip` query parameters a
/// `stream.m3u8` request can carry.
///
/// `_HLS_part` is only meaningful alongside `_HLS_msn` (§4.3); a request
/// carrying a part number with no sequence number is malformed and rejected
/// before it reaches the actor. `_HLS_msn` alone is valid — the part number
/// simply defaults to `0` (§4.3, §4.8).
#[derive(Debug, PartialEq, Eq)]
pub struct HlsQuery {
    pub msn_and_part: Option<(u64, u64)>,
    pub is_delta_update: bool,
}

impl HlsQuery {
    pub fn parse(raw: Option<&str>) -> Result<Self, DispatchError> {
        let mut msn = None;
        let mut part = None;
        let mut is_delta_update = false;

        for pair in raw.unwrap_or("").split('&').filter(|s| !s.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "_HLS_msn" => {
                    msn = Some(value.parse::<u64>().map_err(DispatchError::InvalidMsn)?);
                }
                "_HLS_part" => {
                    part = Some(value.parse::<u64>().map_err(DispatchError::InvalidPart)?);
                }
                "_HLS_skip" => {
                    is_delta_update = value == "YES" || value == "v2";
                }
                _ => {}
            }
        }

        let msn_and_part = match (msn, part) {
            (Some(msn), Some(part)) => Some((msn, part)),
            (Some(msn), None) => Some((msn, 0)),
            (None, Some(_)) => return Err(DispatchError::PartWithoutMsn),
            (None, None) => None,
        };

        Ok(Self {
            msn_and_part,
            is_delta_update,
        })
    }
}

impl<'de> Deserialize<'de> for HlsQuery {
    /// Accepts the raw query string as a plain string and defers to
    /// [`HlsQuery::parse`], so an embedder using `serde_urlencoded`-style
    /// extraction over the untouched query string gets the same validation
    /// either way.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(Some(&raw)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_msn_alone_defaults_part_to_zero() {
        let got = HlsQuery::parse(Some("_HLS_msn=5")).unwrap();
        assert_eq!(Some((5, 0)), got.msn_and_part);
    }

    #[test]
    fn test_msn_and_part() {
        let got = HlsQuery::parse(Some("_HLS_msn=5&_HLS_part=2")).unwrap();
        assert_eq!(Some((5, 2)), got.msn_and_part);
    }

    #[test]
    fn test_part_without_msn_is_rejected() {
        let got = HlsQuery::parse(Some("_HLS_part=2"));
        assert!(matches!(got, Err(DispatchError::PartWithoutMsn)));
    }

    #[test]
    fn test_no_query_is_a_plain_reload() {
        let got = HlsQuery::parse(None).unwrap();
        assert_eq!(None, got.msn_and_part);
        assert!(!got.is_delta_update);
    }

    #[test]
    fn test_skip_yes_is_delta_update() {
        let got = HlsQuery::parse(Some("_HLS_skip=YES")).unwrap();
        assert!(got.is_delta_update);
    }

    #[test]
    fn test_invalid_msn_is_rejected() {
        let got = HlsQuery::parse(Some("_HLS_msn=not-a-number"));
        assert!(matches!(got, Err(DispatchError::InvalidMsn(_))));
    }
}
