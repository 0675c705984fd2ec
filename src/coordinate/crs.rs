//! Coordinate Reference System handling
//!
//! A `Crs` is always backed by a registered EPSG code. Definitions come
//! from the `crs-definitions` database, which also tells us whether the
//! system is geographic, projected or geocentric.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use crate::error::{CrsError, CrsResult};

/// EPSG code of WGS 84 geographic coordinates
pub const WGS84: u32 = 4326;

/// EPSG code of the Web Mercator display projection
pub const WEB_MERCATOR: u32 = 3857;

const WEB_MERCATOR_PROJ4: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs";

/// Earth-centred systems missing from the `crs-definitions` database
const GEOCENTRIC_SYSTEMS: &[(u32, &str)] = &[
    (4328, "+proj=geocent +datum=WGS84 +units=m +no_defs"),
    (4346, "+proj=geocent +ellps=GRS80 +units=m +no_defs"),
    (4896, "+proj=geocent +ellps=GRS80 +units=m +no_defs"),
    (4919, "+proj=geocent +ellps=GRS80 +units=m +no_defs"),
    (4936, "+proj=geocent +ellps=GRS80 +units=m +no_defs"),
    (4978, "+proj=geocent +datum=WGS84 +units=m +no_defs"),
    (7789, "+proj=geocent +ellps=GRS80 +units=m +no_defs"),
    (9988, "+proj=geocent +ellps=GRS80 +units=m +no_defs"),
];

lazy_static! {
    static ref EPSG_REFERENCE: Regex = Regex::new(r#"(?i)EPSG[\s":,]*(\d+)"#).unwrap();
}

/// Broad family of a coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrsKind {
    Geographic,
    Projected,
    Geocentric,
}

impl CrsKind {
    fn from_proj4(definition: &str) -> Self {
        if definition.contains("+proj=longlat") || definition.contains("+proj=latlong") {
            CrsKind::Geographic
        } else if definition.contains("+proj=geocent") {
            CrsKind::Geocentric
        } else {
            CrsKind::Projected
        }
    }
}

impl fmt::Display for CrsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrsKind::Geographic => "geographic",
            CrsKind::Projected => "projected",
            CrsKind::Geocentric => "geocentric",
        };
        write!(f, "{}", name)
    }
}

/// A coordinate reference system identified by its EPSG code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs {
    epsg: u32,
    kind: CrsKind,
    proj4: &'static str,
}

impl Crs {
    /// Looks up a registered EPSG code
    ///
    /// # Errors
    /// `CrsError::UnsupportedCrs` if the code is not in the database
    pub fn from_epsg(code: u32) -> CrsResult<Self> {
        if code == WEB_MERCATOR {
            return Ok(Crs::web_mercator());
        }
        if let Some(&(epsg, proj4)) = GEOCENTRIC_SYSTEMS.iter().find(|(epsg, _)| *epsg == code) {
            return Ok(Crs {
                epsg,
                kind: CrsKind::Geocentric,
                proj4,
            });
        }

        let definition = u16::try_from(code)
            .ok()
            .and_then(crs_definitions::from_code)
            .ok_or_else(|| CrsError::UnsupportedCrs(format!("EPSG:{} is not a registered code", code)))?;

        Ok(Crs {
            epsg: code,
            kind: CrsKind::from_proj4(definition.proj4),
            proj4: definition.proj4,
        })
    }

    /// The Web Mercator display projection (EPSG:3857)
    pub fn web_mercator() -> Self {
        Crs {
            epsg: WEB_MERCATOR,
            kind: CrsKind::Projected,
            proj4: WEB_MERCATOR_PROJ4,
        }
    }

    /// Parses `EPSG:4326`, `4326`, or any text carrying an EPSG reference
    /// such as a WKT authority clause or an OGC URN
    pub fn parse(text: &str) -> CrsResult<Self> {
        let trimmed = text.trim();
        let upper = trimmed.to_uppercase();
        let bare = upper.strip_prefix("EPSG:").unwrap_or(&upper);
        if let Ok(code) = bare.parse::<u32>() {
            return Crs::from_epsg(code);
        }

        // WKT puts the authority of the CRS itself last
        let code = EPSG_REFERENCE
            .captures_iter(trimmed)
            .last()
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or_else(|| CrsError::UnsupportedCrs(format!("no EPSG code in '{}'", trimmed)))?;
        Crs::from_epsg(code)
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn kind(&self) -> CrsKind {
        self.kind
    }

    /// PROJ.4 definition string
    pub fn proj4(&self) -> &'static str {
        self.proj4
    }

    /// Coordinates are longitude/latitude in degrees
    pub fn is_geographic(&self) -> bool {
        self.kind == CrsKind::Geographic
    }

    /// Geographic or projected; geocentric systems cannot be rasterized
    pub fn is_supported_kind(&self) -> bool {
        matches!(self.kind, CrsKind::Geographic | CrsKind::Projected)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}
