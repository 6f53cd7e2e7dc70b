//! Resource references: a primary key or a reporter-scoped hcrn.

use std::fmt;
use std::str::FromStr;

use inventory_core::{HCRN_PREFIX, ReporterKey};
use inventory_state::ResourceId;

use crate::InventoryError;

/// How a caller names a resource in a path.
///
/// `42` addresses the primary key. `hcrn:<reporterType>:<reporterInstanceId>:<localResourceId>`
/// addresses the resource holding that reporter entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    Id(ResourceId),
    Reporter(ReporterKey),
}

impl FromStr for ResourceRef {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse()
                .map(ResourceRef::Id)
                .map_err(|_| InventoryError::InvalidRef(s.to_string()));
        }

        let segments: Vec<&str> = s.split(':').collect();
        match segments.as_slice() {
            [prefix, reporter_type, instance, local]
                if *prefix == HCRN_PREFIX
                    && !reporter_type.is_empty()
                    && !instance.is_empty()
                    && !local.is_empty() =>
            {
                Ok(ResourceRef::Reporter(ReporterKey::new(
                    *instance,
                    *reporter_type,
                    *local,
                )))
            }
            _ => Err(InventoryError::InvalidRef(s.to_string())),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Id(id) => write!(f, "{id}"),
            ResourceRef::Reporter(key) => write!(f, "{key}"),
        }
    }
}
