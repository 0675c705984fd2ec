//! CRS resolution
//!
//! Decides which coordinate reference system a raster is published in.
//! Every call is a single attempt: `NeedsUserInput` and `Invalid` are
//! final for that attempt and the caller re-drives resolution with
//! corrected input.

use log::{debug, info};

use crate::coordinate::crs::{Crs, CrsKind};
use crate::error::{CrsError, CrsResult};
use crate::tiff::geo_keys::DeclaredCrs;

/// Outcome of one resolution attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CrsResolution {
    /// A usable geographic or projected system
    Resolved(Crs),
    /// The raster declares nothing and no override was given
    NeedsUserInput,
    /// The declared CRS or the override cannot be used
    Invalid(CrsError),
}

impl CrsResolution {
    /// Collapses the outcome into a result, `NeedsUserInput` becoming
    /// `CrsError::Missing`
    pub fn into_result(self) -> CrsResult<Crs> {
        match self {
            CrsResolution::Resolved(crs) => Ok(crs),
            CrsResolution::NeedsUserInput => Err(CrsError::Missing),
            CrsResolution::Invalid(error) => Err(error),
        }
    }
}

/// Stateless resolver for declared CRS plus optional override
pub struct CrsResolver;

impl CrsResolver {
    /// Resolves the CRS for one attempt
    ///
    /// # Arguments
    /// * `declared` - CRS found in the raster, if any
    /// * `override_code` - EPSG code supplied by the caller; blank counts
    ///   as absent
    ///
    /// An override always wins over the declared CRS, so a caller can
    /// correct a wrong declaration.
    pub fn resolve(declared: Option<DeclaredCrs>, override_code: Option<&str>) -> CrsResolution {
        let override_code = override_code.map(str::trim).filter(|code| !code.is_empty());

        let candidate = match (override_code, declared) {
            (Some(code), _) => Self::parse_override(code),
            (None, Some(DeclaredCrs::Epsg(code))) => Crs::from_epsg(code),
            (None, Some(DeclaredCrs::UserDefined)) => Err(CrsError::UnsupportedCrs(
                "raster declares a user-defined system without an EPSG code".to_string(),
            )),
            (None, Some(DeclaredCrs::Geocentric(code))) => Err(CrsError::UnsupportedCrsKind {
                code,
                kind: CrsKind::Geocentric,
            }),
            (None, None) => {
                info!("Raster declares no CRS and no override was given");
                return CrsResolution::NeedsUserInput;
            }
        };

        match candidate.and_then(Self::check_kind) {
            Ok(crs) => {
                debug!("Resolved CRS {} ({})", crs, crs.kind());
                CrsResolution::Resolved(crs)
            }
            Err(error) => {
                info!("CRS resolution failed: {}", error);
                CrsResolution::Invalid(error)
            }
        }
    }

    /// Parses an override as a positive registered EPSG code
    fn parse_override(code: &str) -> CrsResult<Crs> {
        let number = code
            .parse::<u32>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| CrsError::BadEpsgCode(code.to_string()))?;
        Crs::from_epsg(number).map_err(|_| CrsError::BadEpsgCode(code.to_string()))
    }

    fn check_kind(crs: Crs) -> CrsResult<Crs> {
        if crs.is_supported_kind() {
            Ok(crs)
        } else {
            Err(CrsError::UnsupportedCrsKind {
                code: crs.epsg(),
                kind: crs.kind(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_crs_resolves() {
        let resolution = CrsResolver::resolve(Some(DeclaredCrs::Epsg(4326)), None);
        assert_eq!(resolution, CrsResolution::Resolved(Crs::from_epsg(4326).unwrap()));
    }

    #[test]
    fn test_missing_crs_needs_input() {
        assert_eq!(CrsResolver::resolve(None, None), CrsResolution::NeedsUserInput);
        assert_eq!(CrsResolver::resolve(None, Some("  ")), CrsResolution::NeedsUserInput);
        assert_eq!(
            CrsResolver::resolve(None, None).into_result(),
            Err(CrsError::Missing)
        );
    }

    #[test]
    fn test_override_resolves_missing_crs() {
        let resolution = CrsResolver::resolve(None, Some("3857"));
        assert_eq!(resolution, CrsResolution::Resolved(Crs::web_mercator()));
    }

    #[test]
    fn test_override_wins_over_declared() {
        let resolution = CrsResolver::resolve(Some(DeclaredCrs::Epsg(4326)), Some("2180"));
        match resolution {
            CrsResolution::Resolved(crs) => assert_eq!(crs.epsg(), 2180),
            other => panic!("expected resolved, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_override_codes() {
        for code in ["abc", "4326.5", "-4326", "0", "999999"] {
            assert_eq!(
                CrsResolver::resolve(None, Some(code)),
                CrsResolution::Invalid(CrsError::BadEpsgCode(code.to_string())),
                "code {}",
                code
            );
        }
    }

    #[test]
    fn test_user_defined_crs_is_invalid() {
        assert!(matches!(
            CrsResolver::resolve(Some(DeclaredCrs::UserDefined), None),
            CrsResolution::Invalid(CrsError::UnsupportedCrs(_))
        ));
    }

    #[test]
    fn test_geocentric_crs_is_unsupported_kind() {
        assert_eq!(
            CrsResolver::resolve(None, Some("4978")),
            CrsResolution::Invalid(CrsError::UnsupportedCrsKind {
                code: 4978,
                kind: CrsKind::Geocentric
            })
        );
    }

    #[test]
    fn test_declared_geocentric_model_is_unsupported_kind() {
        assert_eq!(
            CrsResolver::resolve(Some(DeclaredCrs::Geocentric(4978)), None),
            CrsResolution::Invalid(CrsError::UnsupportedCrsKind {
                code: 4978,
                kind: CrsKind::Geocentric
            })
        );
        // An override still rescues the raster
        assert!(matches!(
            CrsResolver::resolve(Some(DeclaredCrs::Geocentric(4978)), Some("4326")),
            CrsResolution::Resolved(_)
        ));
    }
}
