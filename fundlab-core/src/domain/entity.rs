//! Entity identity — exchange-qualified tickers.
//!
//! Entity ids use the `CODE.MARKET` form (`600519.SH`, `000001.SZ`), the
//! same convention the Tushare API uses on the wire. The Eastmoney adapter
//! derives its own `secid` prefix from the market suffix.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Exchange a ticker is listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Market {
    Shanghai,
    Shenzhen,
}

impl Market {
    pub fn suffix(&self) -> &'static str {
        match self {
            Market::Shanghai => "SH",
            Market::Shenzhen => "SZ",
        }
    }
}

#[derive(Debug, Error)]
pub enum EntityIdError {
    #[error("malformed entity id '{0}': expected CODE.SH or CODE.SZ")]
    Malformed(String),

    #[error("unknown market suffix '{suffix}' in entity id '{id}'")]
    UnknownMarket { id: String, suffix: String },
}

/// Exchange-qualified ticker, e.g. `600519.SH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Parse an id of the form `CODE.SH` / `CODE.SZ` (suffix case-insensitive).
    pub fn parse(raw: &str) -> Result<Self, EntityIdError> {
        let (code, suffix) = raw
            .rsplit_once('.')
            .ok_or_else(|| EntityIdError::Malformed(raw.to_string()))?;
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(EntityIdError::Malformed(raw.to_string()));
        }
        let market = match suffix.to_ascii_uppercase().as_str() {
            "SH" => Market::Shanghai,
            "SZ" => Market::Shenzhen,
            _ => {
                return Err(EntityIdError::UnknownMarket {
                    id: raw.to_string(),
                    suffix: suffix.to_string(),
                })
            }
        };
        Ok(Self(format!("{}.{}", code, market.suffix())))
    }

    /// The bare numeric ticker code (`600519`).
    pub fn code(&self) -> &str {
        self.0.rsplit_once('.').map(|(code, _)| code).unwrap_or(&self.0)
    }

    pub fn market(&self) -> Market {
        // The constructor only ever stores normalized SH/SZ suffixes.
        if self.0.ends_with("SH") {
            Market::Shanghai
        } else {
            Market::Shenzhen
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One tradable stock tracked by the pipeline. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    /// Industry classification; frequently unknown at universe load time and
    /// backfilled from provider responses.
    pub industry: Option<String>,
}

impl Entity {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            industry: None,
        }
    }
}
